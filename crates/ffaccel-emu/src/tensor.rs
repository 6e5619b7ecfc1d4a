//! Tensors and strided accessors
//!
//! Tensors are flat row-major `f32` data plus a [`Shape`]. Tile address
//! translation is done by composing accessors rather than by hand-written
//! offset arithmetic:
//!
//! - [`TensorView`] maps an index tuple to a flat offset
//!   (`Σ index[d] · stride[d]`), and can be [reshaped](TensorView::reshaped)
//!   over the same data;
//! - [`Window`] is a rectangular region (origin + extent) of a view, walked in
//!   its own row-major order by [`Window::gather`];
//! - [`Tensor::scatter`] is the inverse, used for write-back.
//!
//! Both walks copy whole contiguous runs of the innermost axis.

use crate::error::{EmulatorError, Result};

/// Tensor shape (dimensions, outermost first)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    /// Dimensions (e.g., [rows, cols, depth])
    pub dims: Vec<usize>,
}

impl Shape {
    /// Create new shape
    pub const fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    /// Get total number of elements, `None` if the count overflows `usize`
    #[must_use]
    pub fn total_elements(&self) -> Option<usize> {
        element_count(&self.dims)
    }

    /// Get number of dimensions
    #[must_use]
    pub const fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Row-major strides (innermost stride is 1)
    #[must_use]
    pub fn strides(&self) -> Vec<usize> {
        let mut strides: Vec<usize> = vec![1; self.dims.len()];
        for d in (0..self.dims.len().saturating_sub(1)).rev() {
            strides[d] = strides[d + 1].saturating_mul(self.dims[d + 1]);
        }
        strides
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, dim) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{dim}")?;
        }
        write!(f, "]")
    }
}

/// Owned row-major tensor
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Shape,
    data: Vec<f32>,
}

impl Tensor {
    /// Create a tensor from a shape and flat data
    ///
    /// # Errors
    ///
    /// Returns an invalid-layer error if the shape's element count overflows,
    /// or a shape mismatch if `data.len()` differs from it.
    pub fn new(shape: Shape, data: Vec<f32>) -> Result<Self> {
        let expected = checked_elements(&shape)?;
        if data.len() != expected {
            return Err(EmulatorError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// Zero-filled tensor
    ///
    /// # Errors
    ///
    /// Returns an invalid-layer error if the element count overflows.
    pub fn zeros(shape: Shape) -> Result<Self> {
        let data = vec![0.0; checked_elements(&shape)?];
        Ok(Self { shape, data })
    }

    /// Shape
    pub const fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Flat data
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Flat data, mutable
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Element count
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the tensor holds no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Element at `index`, `None` when out of range
    pub fn get(&self, index: &[usize]) -> Option<f32> {
        self.view().get(index)
    }

    /// Strided accessor over this tensor
    pub fn view(&self) -> TensorView<'_> {
        TensorView {
            strides: self.shape.strides(),
            shape: self.shape.clone(),
            data: &self.data,
        }
    }

    /// Write `src` into the window at `origin` with `extent`, in the
    /// window's row-major order
    ///
    /// # Errors
    ///
    /// Returns an invalid-layer error if the window leaves the shape, or a
    /// shape mismatch if `src` is not exactly the window's size.
    pub fn scatter(&mut self, origin: &[usize], extent: &[usize], src: &[f32]) -> Result<()> {
        let len = check_window(&self.shape, origin, extent)?;
        if src.len() != len {
            return Err(EmulatorError::ShapeMismatch {
                expected: len,
                actual: src.len(),
            });
        }
        let strides = self.shape.strides();
        let data = &mut self.data;
        walk_runs(&strides, origin, extent, 0, len, |offset, pos, run| {
            data[offset..offset + run].copy_from_slice(&src[pos..pos + run]);
        });
        Ok(())
    }
}

/// Borrowed strided accessor
#[derive(Debug, Clone)]
pub struct TensorView<'a> {
    shape: Shape,
    strides: Vec<usize>,
    data: &'a [f32],
}

impl<'a> TensorView<'a> {
    /// Shape of this view
    pub const fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Re-interpret the same data under another shape
    ///
    /// # Errors
    ///
    /// Returns a shape mismatch if the element counts differ.
    pub fn reshaped(&self, shape: Shape) -> Result<TensorView<'a>> {
        let expected = checked_elements(&shape)?;
        if expected != self.data.len() {
            return Err(EmulatorError::ShapeMismatch {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(TensorView {
            strides: shape.strides(),
            shape,
            data: self.data,
        })
    }

    /// Flat offset of `index`, `None` when out of range
    pub fn offset(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.shape.rank() {
            return None;
        }
        index
            .iter()
            .zip(&self.shape.dims)
            .zip(&self.strides)
            .try_fold(0, |acc, ((&i, &dim), &stride)| (i < dim).then_some(acc + i * stride))
    }

    /// Element at `index`, `None` when out of range
    pub fn get(&self, index: &[usize]) -> Option<f32> {
        self.offset(index).map(|o| self.data[o])
    }

    /// Rectangular region starting at `origin` with `extent`
    ///
    /// # Errors
    ///
    /// Returns an invalid-layer error if the rank differs or the window
    /// leaves the shape on any axis.
    pub fn window(&self, origin: &[usize], extent: &[usize]) -> Result<Window<'a>> {
        let len = check_window(&self.shape, origin, extent)?;
        Ok(Window {
            len,
            data: self.data,
            strides: self.strides.clone(),
            origin: origin.to_vec(),
            extent: extent.to_vec(),
        })
    }
}

/// Rectangular region of a tensor view
#[derive(Debug, Clone)]
pub struct Window<'a> {
    len: usize,
    data: &'a [f32],
    strides: Vec<usize>,
    origin: Vec<usize>,
    extent: Vec<usize>,
}

impl Window<'_> {
    /// Elements in the window
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the window is empty
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy `dst.len()` elements of the window, starting at flat position
    /// `start` of the window's row-major order, into `dst`
    ///
    /// # Errors
    ///
    /// Returns a shape mismatch if the range runs past the window.
    pub fn gather(&self, start: usize, dst: &mut [f32]) -> Result<()> {
        let len = self.len;
        let end = start.checked_add(dst.len()).unwrap_or(usize::MAX);
        if end > len {
            return Err(EmulatorError::ShapeMismatch {
                expected: len,
                actual: end,
            });
        }
        let data = self.data;
        walk_runs(&self.strides, &self.origin, &self.extent, start, dst.len(), |offset, pos, run| {
            dst[pos..pos + run].copy_from_slice(&data[offset..offset + run]);
        });
        Ok(())
    }
}

/// Product of `dims`, zero if any axis is empty, `None` on overflow
fn element_count(dims: &[usize]) -> Option<usize> {
    if dims.contains(&0) {
        return Some(0);
    }
    dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

fn checked_elements(shape: &Shape) -> Result<usize> {
    shape
        .total_elements()
        .ok_or_else(|| EmulatorError::invalid_layer(format!("shape {shape} has more elements than usize holds")))
}

/// Validate a window against `shape`, returning its element count
fn check_window(shape: &Shape, origin: &[usize], extent: &[usize]) -> Result<usize> {
    if origin.len() != shape.rank() || extent.len() != shape.rank() {
        return Err(EmulatorError::invalid_layer(format!(
            "window rank {} / {} does not match tensor rank {}",
            origin.len(),
            extent.len(),
            shape.rank()
        )));
    }
    for (axis, ((&o, &e), &dim)) in origin.iter().zip(extent).zip(&shape.dims).enumerate() {
        if o.checked_add(e).map_or(true, |end| end > dim) {
            return Err(EmulatorError::invalid_layer(format!(
                "window {origin:?}+{extent:?} leaves shape {shape} on axis {axis}"
            )));
        }
    }
    // every extent is within a dimension of a shape whose count fits
    Ok(element_count(extent).unwrap_or(0))
}

/// Walk flat positions `[start, start+len)` of a window in contiguous runs
/// of the innermost axis, calling `f(source_offset, position - start, run)`.
fn walk_runs(
    strides: &[usize],
    origin: &[usize],
    extent: &[usize],
    start: usize,
    len: usize,
    mut f: impl FnMut(usize, usize, usize),
) {
    let rank = extent.len();
    let inner = extent.last().copied().unwrap_or(1);
    let end = start + len;
    let mut index = vec![0usize; rank];
    let mut pos = start;

    while pos < end {
        let mut rem = pos;
        for d in (0..rank).rev() {
            index[d] = rem % extent[d];
            rem /= extent[d];
        }
        let inner_index = index.last().copied().unwrap_or(0);
        let run = (inner - inner_index).min(end - pos);
        let offset: usize = (0..rank).map(|d| (origin[d] + index[d]) * strides[d]).sum();
        f(offset, pos - start, run);
        pos += run;
    }
}
