//! Tiling orchestrator
//!
//! Splits a layer's tensors into buffer-sized tiles, loads each tile into
//! the [`BufferModel`](crate::BufferModel), runs one compute pass per tile,
//! and writes finished output tiles back.
//!
//! Every axis is cut the same way: consecutive spans of
//! `min(capacity, remaining)` elements. Spans never overlap, never exceed
//! capacity, and their extents sum to the axis length.

pub mod conv;
pub mod fc;

/// One tile along one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSpan {
    /// First element of the tile within the full axis
    pub offset: usize,
    /// Elements in the tile (`≤ capacity`)
    pub extent: usize,
    /// This tile covers the final elements of the axis
    pub is_last: bool,
}

impl TileSpan {
    /// One past the last element
    pub const fn end(&self) -> usize {
        self.offset + self.extent
    }
}

/// Iterator over the tiles of an axis
#[derive(Debug, Clone)]
pub struct TileSpans {
    total: usize,
    capacity: usize,
    next: usize,
}

impl TileSpans {
    /// Tiles of `capacity` over an axis of `total` elements
    ///
    /// A zero capacity yields no tiles.
    pub const fn new(total: usize, capacity: usize) -> Self {
        Self {
            total,
            capacity,
            next: 0,
        }
    }
}

impl Iterator for TileSpans {
    type Item = TileSpan;

    fn next(&mut self) -> Option<TileSpan> {
        if self.next >= self.total || self.capacity == 0 {
            return None;
        }
        let offset = self.next;
        let extent = self.capacity.min(self.total - offset);
        self.next += extent;
        Some(TileSpan {
            offset,
            extent,
            is_last: self.next == self.total,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = if self.capacity == 0 {
            0
        } else {
            (self.total - self.next.min(self.total)).div_ceil(self.capacity)
        };
        (n, Some(n))
    }
}

impl ExactSizeIterator for TileSpans {}
