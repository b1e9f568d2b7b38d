use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

/// One entry of a basic (view-producing) index expression.
///
/// `Int` removes its axis, `Slice` keeps it with a possibly negative step,
/// `NewAxis` inserts a length-1 axis and `Ellipsis` expands to as many full
/// slices as needed to cover the remaining axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Index {
    Int(isize),
    Slice {
        start: Option<isize>,
        stop: Option<isize>,
        step: isize,
    },
    NewAxis,
    Ellipsis,
}

impl Index {
    pub fn at(index: isize) -> Self {
        Self::Int(index)
    }

    pub fn slice(start: Option<isize>, stop: Option<isize>, step: isize) -> Self {
        Self::Slice { start, stop, step }
    }

    /// `:`
    pub fn full() -> Self {
        Self::slice(None, None, 1)
    }

    /// `::-1`
    pub fn rev() -> Self {
        Self::slice(None, None, -1)
    }

    /// Whether this entry consumes an axis of the indexed layout.
    pub fn consumes_axis(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Slice { .. })
    }
}

impl From<isize> for Index {
    fn from(index: isize) -> Self {
        Self::Int(index)
    }
}

impl From<Range<isize>> for Index {
    fn from(range: Range<isize>) -> Self {
        Self::slice(Some(range.start), Some(range.end), 1)
    }
}

impl From<RangeFrom<isize>> for Index {
    fn from(range: RangeFrom<isize>) -> Self {
        Self::slice(Some(range.start), None, 1)
    }
}

impl From<RangeTo<isize>> for Index {
    fn from(range: RangeTo<isize>) -> Self {
        Self::slice(None, Some(range.end), 1)
    }
}

impl From<RangeFull> for Index {
    fn from(_: RangeFull) -> Self {
        Self::full()
    }
}

/// Resolved `(start, len, step)` of a slice over an axis of length `size`,
/// following the usual clamping rules for out-of-range and negative bounds.
pub fn resolve_slice(start: Option<isize>, stop: Option<isize>, step: isize, size: usize) -> (isize, usize, isize) {
    let n = size as isize;
    if step > 0 {
        let clamp = |v: isize| if v < 0 { (v + n).max(0) } else { v.min(n) };
        let start = start.map(clamp).unwrap_or(0);
        let stop = stop.map(clamp).unwrap_or(n);
        let len = if stop > start { (stop - start + step - 1) / step } else { 0 };
        (start, len as usize, step)
    } else {
        let clamp = |v: isize| if v < 0 { (v + n).max(-1) } else { v.min(n - 1) };
        let start = start.map(clamp).unwrap_or(n - 1);
        let stop = stop.map(clamp).unwrap_or(-1);
        let neg = -step;
        let len = if start > stop { (start - stop + neg - 1) / neg } else { 0 };
        (start, len as usize, step)
    }
}
