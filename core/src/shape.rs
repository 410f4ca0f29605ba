//! Partially known tensor shapes.
//!
//! The IR convention: a dimension of `-1` is dynamic, anything below `-1`
//! is invalid (rejected by the frontend). A shape may also have dynamic
//! rank, which is how fresh variables start out.

use crate::TVec;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartialShape(Option<TVec<i64>>);

impl PartialShape {
    pub fn new(dims: impl IntoIterator<Item = i64>) -> PartialShape {
        PartialShape(Some(dims.into_iter().collect()))
    }

    /// Shape of unknown rank.
    pub fn dynamic() -> PartialShape {
        PartialShape(None)
    }

    pub fn scalar() -> PartialShape {
        PartialShape(Some(TVec::new()))
    }

    pub fn dims(&self) -> Option<&[i64]> {
        self.0.as_deref()
    }

    pub fn rank(&self) -> Option<usize> {
        self.0.as_ref().map(|d| d.len())
    }

    pub fn is_static(&self) -> bool {
        self.0.as_ref().is_some_and(|d| d.iter().all(|&d| d >= 0))
    }

    /// Number of elements, when every dimension is known.
    pub fn volume(&self) -> Option<u64> {
        let dims = self.0.as_ref()?;
        dims.iter().try_fold(1u64, |v, &d| if d >= 0 { Some(v * d as u64) } else { None })
    }
}

impl Default for PartialShape {
    fn default() -> PartialShape {
        PartialShape::dynamic()
    }
}

impl From<&[i64]> for PartialShape {
    fn from(dims: &[i64]) -> PartialShape {
        PartialShape::new(dims.iter().copied())
    }
}

impl fmt::Display for PartialShape {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match &self.0 {
            None => write!(fmt, "[...]"),
            Some(dims) => {
                let dims: Vec<String> = dims
                    .iter()
                    .map(|&d| if d == -1 { "?".to_string() } else { d.to_string() })
                    .collect();
                write!(fmt, "[{}]", dims.join(","))
            }
        }
    }
}
