use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Index of a node in the graph's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Stable identifier of an edge in the registry. Ids need not be contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Dimensions of the value carried on one port. Matrices are column-major.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shape(pub SmallVec<[usize; 2]>);

impl Shape {
    pub fn vector(len: usize) -> Self {
        Self(SmallVec::from_slice(&[len]))
    }

    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self(SmallVec::from_slice(&[rows, cols]))
    }

    pub fn dims(&self) -> &[usize] { &self.0 }

    /// Number of scalars held by a value of this shape.
    pub fn elem_len(&self) -> usize {
        self.0.iter().product()
    }

    pub fn rows(&self) -> usize { self.0.first().copied().unwrap_or(1) }

    /// Trailing dimensions folded together; `1` for vectors.
    pub fn cols(&self) -> usize {
        self.0.iter().skip(1).product()
    }

    /// `elem_len`, or `None` when it or the folded column count overflows.
    ///
    /// Shapes are checked with this once at graph construction; afterwards the
    /// unchecked accessors are safe to use.
    pub fn checked_elem_len(&self) -> Option<usize> {
        let cols = self.0.iter().skip(1).try_fold(1usize, |acc, &d| acc.checked_mul(d))?;
        self.rows().checked_mul(cols)
    }
}

impl From<usize> for Shape {
    fn from(len: usize) -> Self { Shape::vector(len) }
}

impl From<(usize, usize)> for Shape {
    fn from((rows, cols): (usize, usize)) -> Self { Shape::matrix(rows, cols) }
}

/// Which way a traversal walks the edges.
///
/// `Forward` runs root → terminal and evaluates the operator itself; `Adjoint`
/// runs terminal → root over the same edges and evaluates its transpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Adjoint,
}

impl Direction {
    pub fn is_forward(self) -> bool { matches!(self, Direction::Forward) }
}

impl From<bool> for Direction {
    fn from(forward: bool) -> Self {
        if forward { Direction::Forward } else { Direction::Adjoint }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => f.write_str("forward"),
            Direction::Adjoint => f.write_str("adjoint"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_lengths() {
        assert_eq!(Shape::vector(5).elem_len(), 5);
        assert_eq!(Shape::matrix(3, 4).elem_len(), 12);
        assert_eq!(Shape::matrix(3, 4).rows(), 3);
        assert_eq!(Shape::matrix(3, 4).cols(), 4);
        assert_eq!(Shape::vector(7).cols(), 1);
        // A scalar has no dimensions and holds exactly one value.
        assert_eq!(Shape::default().elem_len(), 1);
    }

    #[test]
    fn test_checked_elem_len_detects_overflow() {
        assert_eq!(Shape::matrix(3, 4).checked_elem_len(), Some(12));
        assert_eq!(Shape::matrix(usize::MAX / 2, 3).checked_elem_len(), None);
        // Zero rows would hide an overflowing column product from elem_len alone.
        let hidden = Shape(SmallVec::from_slice(&[0, usize::MAX, 2]));
        assert_eq!(hidden.checked_elem_len(), None);
    }

    #[test]
    fn test_shape_serializes_as_plain_list() {
        let json = serde_json::to_string(&Shape::matrix(2, 3)).unwrap();
        assert_eq!(json, "[2,3]");
        let back: Shape = serde_json::from_str("[4]").unwrap();
        assert_eq!(back, Shape::vector(4));
    }
}
