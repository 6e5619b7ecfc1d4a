//! End-to-end dense-layer scenarios through the public API

use ffaccel_emu::prelude::*;
use ffaccel_emu::{dispatch, BufferModel, HardwareProfile};

const INPUTS: [f32; 5] = [0.1, 0.2, 0.1, 0.5, 0.9];
const BIASES: [f32; 5] = [0.5, 0.3, -0.1, -0.4, -0.1];
#[rustfmt::skip]
const WEIGHTS: [f32; 25] = [
    0.0,  0.1,  0.1,  0.5, -0.3,
    0.9, -0.1, -0.1, -0.6,  0.8,
    0.0,  0.1,  0.1,  0.0,  0.1,
    0.9, -0.1, -0.1, -0.6, -0.2,
    0.9, -0.1, -0.1, -0.6,  0.8,
];
const EXPECTED: [f32; 5] = [0.51, 0.78, 0.02, 0.0, 0.38];

fn sample_layer() -> Layer {
    FullyConnected::new(5, 5, INPUTS.to_vec(), WEIGHTS.to_vec(), BIASES.to_vec())
        .expect("sample layer")
        .into()
}

fn assert_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() < 1e-5, "output[{i}]: got {a}, expected {e} (tolerance 1e-5)");
    }
}

#[test]
fn reference_profile_scenario() {
    let mut emu = Emulator::new(HardwareConfig::from_profile(HardwareProfile::REFERENCE)).unwrap();
    emu.allocate_buffers().unwrap();
    let mut layer = sample_layer();
    let stats = emu.evaluate(&mut layer).unwrap();
    emu.release_buffers().unwrap();

    assert_close(layer.outputs().as_slice(), &EXPECTED);
    // ⌈5/2⌉ · ⌈5/3⌉
    assert_eq!(stats.passes, 6);
}

#[test]
fn single_pass_when_buffers_hold_everything() {
    let mut emu = Emulator::new(HardwareConfig::new(5, 25, 5, 1, 5)).unwrap();
    let mut layer = sample_layer();
    let stats = {
        let mut session = emu.session().unwrap();
        dispatch::evaluate(&mut session, &mut layer).unwrap()
    };
    assert_close(layer.outputs().as_slice(), &EXPECTED);
    assert_eq!(stats.passes, 1);
    assert!(!emu.model().is_allocated());
}

#[test]
fn every_capacity_agrees_with_reference() {
    let mut expected = sample_layer();
    ReferenceBackend::new(HardwareConfig::default())
        .evaluate(&mut expected)
        .unwrap();

    for ic in 1..=6 {
        for oc in 1..=6 {
            for (lanes, mults) in [(1, 1), (1, 2), (2, 3), (3, 1)] {
                let cfg = HardwareConfig::new(ic, ic * oc, oc, lanes, mults);
                let mut emu = Emulator::new(cfg).unwrap();
                emu.allocate_buffers().unwrap();
                let mut layer = sample_layer();
                let stats = emu.evaluate(&mut layer).unwrap();

                for (a, e) in layer.outputs().as_slice().iter().zip(expected.outputs().as_slice()) {
                    assert!((a - e).abs() < 1e-5, "ic={ic} oc={oc} m_o={lanes} m_i={mults}: {a} vs {e}");
                }
                let expected_passes = cfg.profile.dense_passes(5, 5);
                assert_eq!(stats.passes as usize, expected_passes, "ic={ic} oc={oc}");
                assert_eq!(stats.activations, 5, "one activation per output");
            }
        }
    }
}

#[test]
fn compute_steps_follow_block_grid() {
    let cfg = HardwareConfig::from_profile(HardwareProfile::REFERENCE);
    let mut emu = Emulator::new(cfg).unwrap();
    emu.allocate_buffers().unwrap();
    let stats = emu.evaluate(&mut sample_layer()).unwrap();

    // output tiles 2,2,1 × input tiles 3,2
    let expected: usize = [2, 2, 1]
        .iter()
        .flat_map(|&h| [3, 2].map(|w| cfg.profile.steps_per_pass(h, w)))
        .sum();
    assert_eq!(stats.compute_steps as usize, expected);
    assert_eq!(stats.macs, 25);
}

#[test]
fn zero_sized_layers_do_nothing() {
    let mut emu = Emulator::new(HardwareConfig::default()).unwrap();
    emu.allocate_buffers().unwrap();

    let mut no_inputs: Layer = FullyConnected::new(0, 2, vec![], vec![], vec![1.0, 1.0]).unwrap().into();
    let stats = emu.evaluate(&mut no_inputs).unwrap();
    assert_eq!(stats, PassStats::default());
    assert_eq!(no_inputs.outputs().as_slice(), &[0.0, 0.0]);

    let mut no_outputs: Layer = FullyConnected::new(3, 0, vec![1.0; 3], vec![], vec![]).unwrap().into();
    assert_eq!(emu.evaluate(&mut no_outputs).unwrap().passes, 0);
}

#[test]
fn release_without_allocate_is_lifecycle_error() {
    let mut emu = Emulator::new(HardwareConfig::default()).unwrap();
    let err = emu.release_buffers().unwrap_err();
    assert!(matches!(err, EmulatorError::BufferLifecycle { .. }), "{err}");
}

#[test]
fn unknown_tag_reported() {
    let mut emu = Emulator::new(HardwareConfig::default()).unwrap();
    emu.allocate_buffers().unwrap();
    let mut params = LayerParameters {
        layer_type: 0x05,
        ..Default::default()
    };
    let err = emu.evaluate_tagged(&mut params).unwrap_err();
    assert!(matches!(err, EmulatorError::UnrecognizedLayerType { tag: 0x05 }));
    assert_eq!(err.to_string(), "Unrecognized layer type tag 0x05");
}

#[test]
fn tagged_fc_matches_enum_dispatch() {
    let mut emu = Emulator::new(HardwareConfig::default()).unwrap();
    emu.allocate_buffers().unwrap();
    let Layer::FullyConnected(fc) = sample_layer() else {
        unreachable!()
    };
    let mut params = LayerParameters::fully_connected(fc);
    emu.evaluate_tagged(&mut params).unwrap();
    let fc = params.fully_connected.expect("FC kept in record");
    assert_close(fc.outputs().as_slice(), &EXPECTED);
}

#[test]
fn buffer_model_reusable_across_layers() {
    let mut model = BufferModel::new(HardwareConfig::default()).unwrap();
    model.allocate().unwrap();
    let mut first = sample_layer();
    let mut second = sample_layer();
    dispatch::evaluate(&mut model, &mut first).unwrap();
    dispatch::evaluate(&mut model, &mut second).unwrap();
    assert_eq!(first.outputs(), second.outputs());
    model.release().unwrap();
}
