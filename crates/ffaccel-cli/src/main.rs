// SPDX-License-Identifier: AGPL-3.0-only

//! `ffaccel`: command-line front end for the accelerator emulator.
//!
//! ```text
//! USAGE:
//!   ffaccel selftest                 Activation and 5×5 dense-layer checks
//!   ffaccel fc   --inputs N --outputs M      Random dense layer, tiled vs reference
//!   ffaccel conv --height H --width W ...    Random convolution, tiled vs reference
//!   ffaccel sweep --inputs N --outputs M     Pass and step counts across capacities
//! ```
//!
//! Every evaluating command takes the hardware flags `--input-capacity`,
//! `--weight-capacity`, `--output-capacity`, `--lanes`, `--multipliers` and
//! `--activation`, defaulting to the reference profile.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use ffaccel_emu::{
    select_backend, Activation, BackendSelection, Convolutional, Emulator, FullyConnected,
    HardwareConfig, HardwareProfile, Layer, LayerBackend, PassStats,
};
use ffaccel_hw::relu;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ffaccel", about = "Buffer-tiled neural-network accelerator emulator", version)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run the built-in activation and dense-layer checks.
    Selftest,
    /// Evaluate a random dense layer on the emulator and the reference.
    Fc {
        /// Input vector length.
        #[arg(long)]
        inputs: usize,
        /// Output vector length.
        #[arg(long)]
        outputs: usize,
        /// PRNG seed for weights, biases and inputs.
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[command(flatten)]
        hw: HardwareArgs,
    },
    /// Evaluate a random convolution on the emulator and the reference.
    Conv {
        /// Input map rows.
        #[arg(long)]
        height: usize,
        /// Input map columns.
        #[arg(long)]
        width: usize,
        /// Input map depth (channels).
        #[arg(long)]
        depth: usize,
        /// Number of kernels (output depth).
        #[arg(long)]
        filters: usize,
        /// Square kernel size.
        #[arg(long, default_value_t = 3)]
        kernel: usize,
        /// Stride in both directions.
        #[arg(long, default_value_t = 1)]
        stride: usize,
        /// PRNG seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[command(flatten)]
        hw: HardwareArgs,
    },
    /// Tabulate passes and compute steps over input/output capacities.
    Sweep {
        /// Input vector length.
        #[arg(long)]
        inputs: usize,
        /// Output vector length.
        #[arg(long)]
        outputs: usize,
        /// Largest capacity tried on each axis.
        #[arg(long, default_value_t = 8)]
        max_capacity: usize,
        /// Lanes (m_o).
        #[arg(long, default_value_t = HardwareProfile::REFERENCE.lanes)]
        lanes: usize,
        /// Multipliers per lane (m_i).
        #[arg(long, default_value_t = HardwareProfile::REFERENCE.multipliers_per_lane)]
        multipliers: usize,
    },
}

/// Buffer capacities, array geometry and activation
#[derive(Args, Debug, Clone)]
struct HardwareArgs {
    /// Input buffer capacity (elements).
    #[arg(long, default_value_t = HardwareProfile::REFERENCE.input_capacity)]
    input_capacity: usize,
    /// Weight buffer capacity (elements).
    #[arg(long, default_value_t = HardwareProfile::REFERENCE.weight_capacity)]
    weight_capacity: usize,
    /// Output buffer capacity (elements).
    #[arg(long, default_value_t = HardwareProfile::REFERENCE.output_capacity)]
    output_capacity: usize,
    /// Lanes (m_o).
    #[arg(long, default_value_t = HardwareProfile::REFERENCE.lanes)]
    lanes: usize,
    /// Multipliers per lane (m_i).
    #[arg(long, default_value_t = HardwareProfile::REFERENCE.multipliers_per_lane)]
    multipliers: usize,
    /// Activation unit: relu or identity.
    #[arg(long, default_value = "relu")]
    activation: Activation,
}

impl HardwareArgs {
    fn config(&self) -> HardwareConfig {
        HardwareConfig::new(
            self.input_capacity,
            self.weight_capacity,
            self.output_capacity,
            self.lanes,
            self.multipliers,
        )
        .with_activation(self.activation)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Cmd::Selftest => cmd_selftest()?,
        Cmd::Fc {
            inputs,
            outputs,
            seed,
            hw,
        } => cmd_fc(inputs, outputs, seed, &hw)?,
        Cmd::Conv {
            height,
            width,
            depth,
            filters,
            kernel,
            stride,
            seed,
            hw,
        } => cmd_conv([height, width, depth], filters, kernel, stride, seed, &hw)?,
        Cmd::Sweep {
            inputs,
            outputs,
            max_capacity,
            lanes,
            multipliers,
        } => cmd_sweep(inputs, outputs, max_capacity, lanes, multipliers)?,
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        1 => "info".into(),
        2 => "debug".into(),
        _ => "trace".into(),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// ── selftest ──────────────────────────────────────────────────────────────────

fn cmd_selftest() -> Result<()> {
    let mut passed = 0usize;
    let mut failed = 0usize;
    let mut check = |name: &str, ok: bool| {
        if ok {
            passed += 1;
            println!("  ✅ {name}");
        } else {
            failed += 1;
            println!("  ❌ {name}");
        }
    };

    println!("Activation");
    check("relu(-1.0) == 0.0", relu(-1.0) == 0.0);
    check("relu(0.0) == 0.0", relu(0.0) == 0.0);
    check("relu(2.5) == 2.5", (relu(2.5) - 2.5).abs() < f32::EPSILON);
    check("relu is idempotent", relu(relu(-0.3)) == relu(-0.3) && relu(relu(0.7)) == relu(0.7));

    println!("Dense layer 5→5 on the reference profile");
    let outputs = sample_dense_outputs()?;
    for (i, (got, want)) in outputs.iter().zip(SAMPLE_EXPECTED).enumerate() {
        check(
            &format!("output[{i}] = {got:.5} (expected {want:.2})"),
            (got - want).abs() < 1e-5,
        );
    }

    println!();
    println!("{passed} passed, {failed} failed");
    if failed > 0 {
        bail!("{failed} self-test check(s) failed");
    }
    Ok(())
}

const SAMPLE_INPUTS: [f32; 5] = [0.1, 0.2, 0.1, 0.5, 0.9];
const SAMPLE_BIASES: [f32; 5] = [0.5, 0.3, -0.1, -0.4, -0.1];
#[rustfmt::skip]
const SAMPLE_WEIGHTS: [f32; 25] = [
    0.0,  0.1,  0.1,  0.5, -0.3,
    0.9, -0.1, -0.1, -0.6,  0.8,
    0.0,  0.1,  0.1,  0.0,  0.1,
    0.9, -0.1, -0.1, -0.6, -0.2,
    0.9, -0.1, -0.1, -0.6,  0.8,
];
const SAMPLE_EXPECTED: [f32; 5] = [0.51, 0.78, 0.02, 0.0, 0.38];

fn sample_dense_outputs() -> Result<Vec<f32>> {
    let fc = FullyConnected::new(
        5,
        5,
        SAMPLE_INPUTS.to_vec(),
        SAMPLE_WEIGHTS.to_vec(),
        SAMPLE_BIASES.to_vec(),
    )?;
    let mut layer = Layer::from(fc);
    let mut emu = Emulator::new(HardwareConfig::from_profile(HardwareProfile::REFERENCE))?;
    emu.allocate_buffers()?;
    let stats = emu.evaluate(&mut layer)?;
    emu.release_buffers()?;
    info!("sample layer: {stats}");
    Ok(layer.outputs().as_slice().to_vec())
}

// ── fc / conv ─────────────────────────────────────────────────────────────────

fn cmd_fc(inputs: usize, outputs: usize, seed: u64, hw: &HardwareArgs) -> Result<()> {
    let mut rng = Xoshiro::new(seed);
    let fc = FullyConnected::new(
        inputs,
        outputs,
        rng.gen_f32(inputs),
        rng.gen_f32(element_count(&[inputs, outputs])?),
        rng.gen_f32(outputs),
    )?;
    println!("Dense layer {inputs}→{outputs}, seed {seed}");
    compare(&Layer::from(fc), hw.config())
}

fn cmd_conv(
    ifm_dims: [usize; 3],
    filters: usize,
    kernel: usize,
    stride: usize,
    seed: u64,
    hw: &HardwareArgs,
) -> Result<()> {
    let kernel_dims = [kernel, kernel];
    let ofm_dims = Convolutional::output_dims_for(ifm_dims, kernel_dims, stride, filters)
        .context("convolution geometry")?;
    let mut rng = Xoshiro::new(seed);
    let conv = Convolutional::new(
        ifm_dims,
        ofm_dims,
        kernel_dims,
        stride,
        rng.gen_f32(element_count(&ifm_dims)?),
        rng.gen_f32(element_count(&[filters, kernel, kernel, ifm_dims[2]])?),
        rng.gen_f32(filters),
    )?;
    let [h, w, d] = ifm_dims;
    let [ho, wo, _] = ofm_dims;
    println!("Convolution {h}×{w}×{d} → {ho}×{wo}×{filters}, kernel {kernel}×{kernel}, stride {stride}, seed {seed}");
    compare(&Layer::from(conv), hw.config())
}

/// Length of a random tensor with `dims`
fn element_count(dims: &[usize]) -> Result<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .with_context(|| format!("tensor {dims:?} is too large"))
}

/// Run `layer` on both backends and report the largest disagreement
fn compare(layer: &Layer, config: HardwareConfig) -> Result<()> {
    let mut emulated = select_backend(BackendSelection::Emulated, config)?;
    let mut reference = select_backend(BackendSelection::Reference, config)?;

    let mut tiled = layer.clone();
    let mut direct = layer.clone();
    let stats = emulated.evaluate(&mut tiled)?;
    reference.evaluate(&mut direct)?;

    let max_diff = tiled
        .outputs()
        .as_slice()
        .iter()
        .zip(direct.outputs().as_slice())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f32, f32::max);

    let p = config.profile;
    println!(
        "  hardware   in={} w={} out={}  m_o={} m_i={}  activation={}",
        p.input_capacity, p.weight_capacity, p.output_capacity, p.lanes, p.multipliers_per_lane, config.activation
    );
    println!("  {}: {stats}", emulated.backend_type());
    println!("  utilisation {:.1}%", stats.utilisation(config.total_multipliers()) * 100.0);
    println!("  max |{} - {}| = {max_diff:.3e}", emulated.backend_type(), reference.backend_type());
    Ok(())
}

// ── sweep ─────────────────────────────────────────────────────────────────────

fn cmd_sweep(inputs: usize, outputs: usize, max_capacity: usize, lanes: usize, multipliers: usize) -> Result<()> {
    let mut rng = Xoshiro::new(7);
    let template = Layer::from(FullyConnected::new(
        inputs,
        outputs,
        rng.gen_f32(inputs),
        rng.gen_f32(element_count(&[inputs, outputs])?),
        rng.gen_f32(outputs),
    )?);

    println!("Dense {inputs}→{outputs}, m_o={lanes} m_i={multipliers}, weight capacity = in × out capacity");
    println!(
        "  {:>6}  {:>6}  {:>8}  {:>8}  {:>8}  {:>7}",
        "in cap", "out cap", "passes", "steps", "MACs", "util"
    );
    println!("  {:-<6}  {:-<6}  {:-<8}  {:-<8}  {:-<8}  {:-<7}", "", "", "", "", "", "");

    for ic in 1..=max_capacity {
        for oc in 1..=max_capacity {
            let config = HardwareConfig::new(ic, ic * oc, oc, lanes, multipliers);
            let stats = run_once(&template, config)?;
            println!(
                "  {ic:>6}  {oc:>6}  {:>8}  {:>8}  {:>8}  {:>6.1}%",
                stats.passes,
                stats.compute_steps,
                stats.macs,
                stats.utilisation(config.total_multipliers()) * 100.0
            );
        }
    }
    Ok(())
}

fn run_once(template: &Layer, config: HardwareConfig) -> Result<PassStats> {
    let mut emu = Emulator::new(config)?;
    let mut layer = template.clone();
    let mut session = emu.session()?;
    let stats = ffaccel_emu::dispatch::evaluate(&mut session, &mut layer)?;
    Ok(stats)
}

// ── PRNG ──────────────────────────────────────────────────────────────────────

/// xoshiro256++ for reproducible random layers
struct Xoshiro {
    s: [u64; 4],
}

impl Xoshiro {
    fn new(seed: u64) -> Self {
        let s = [
            seed ^ 0x9e37_79b9_7f4a_7c15,
            seed.wrapping_add(0x6c62_272e_07bb_0142),
            seed.rotate_left(17),
            seed.rotate_right(5),
        ];
        let mut rng = Self { s };
        for _ in 0..20 {
            let _ = rng.next_u64();
        }
        rng
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);
        let t = self.s[1].wrapping_shl(17);
        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];
        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);
        result
    }

    fn next_f32(&mut self) -> f32 {
        #[allow(clippy::cast_possible_truncation)]
        let bits = (self.next_u64() >> 41) as u32 | 0x3f80_0000;
        f32::from_bits(bits) - 1.0
    }

    /// `len` values uniform in [-1, 1)
    fn gen_f32(&mut self, len: usize) -> Vec<f32> {
        (0..len).map(|_| self.next_f32() * 2.0 - 1.0).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_layer_matches_expected() {
        let outputs = sample_dense_outputs().unwrap();
        for (got, want) in outputs.iter().zip(SAMPLE_EXPECTED) {
            assert!((got - want).abs() < 1e-5, "{got} vs {want}");
        }
    }

    #[test]
    fn xoshiro_is_deterministic_and_bounded() {
        let a = Xoshiro::new(9).gen_f32(64);
        let b = Xoshiro::new(9).gen_f32(64);
        assert_eq!(a, b);
        assert!(a.iter().all(|v| (-1.0..1.0).contains(v)));
        assert_ne!(a, Xoshiro::new(10).gen_f32(64));
    }

    #[test]
    fn hardware_flags_default_to_reference_profile() {
        let cli = Cli::try_parse_from(["ffaccel", "fc", "--inputs", "4", "--outputs", "3"]).unwrap();
        let Cmd::Fc { hw, .. } = cli.command else {
            panic!("expected fc subcommand");
        };
        assert_eq!(hw.config(), HardwareConfig::default());
    }

    #[test]
    fn activation_flag_parsed() {
        let cli = Cli::try_parse_from([
            "ffaccel", "fc", "--inputs", "4", "--outputs", "3", "--activation", "identity",
        ])
        .unwrap();
        let Cmd::Fc { hw, .. } = cli.command else {
            panic!("expected fc subcommand");
        };
        assert_eq!(hw.activation, Activation::Identity);
    }

    #[test]
    fn oversized_layer_is_an_error() {
        assert_eq!(element_count(&[3, 4, 2]).unwrap(), 24);
        assert!(element_count(&[usize::MAX, 2]).is_err());

        let cli = Cli::try_parse_from(["ffaccel", "fc", "--inputs", "2", "--outputs", "1"]).unwrap();
        let Cmd::Fc { hw, .. } = cli.command else {
            panic!("expected fc subcommand");
        };
        assert!(cmd_fc(2, usize::MAX, 1, &hw).is_err());
    }

    #[test]
    fn sweep_cell_runs() {
        let template = Layer::from(FullyConnected::new(3, 2, vec![1.0; 3], vec![0.5; 6], vec![0.0; 2]).unwrap());
        let stats = run_once(&template, HardwareConfig::new(2, 4, 2, 1, 2)).unwrap();
        assert_eq!(stats.passes, 2);
    }
}
