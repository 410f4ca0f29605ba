//! The weights blob and the buffers carved out of it.
//!
//! `Weights` is a single immutable byte region shared by reference
//! counting. Constant nodes hold `AlignedBuffer::Shared` views into it:
//! no bytes are copied, and the blob stays alive as long as any view
//! does. Inline attribute values get an `Owned` buffer instead.

use crate::errors::{IrError, XirResult};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct Weights(Arc<Vec<u8>>);

impl Weights {
    pub fn new(bytes: Vec<u8>) -> Weights {
        Weights(Arc::new(bytes))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Carve a zero-copy view out of the blob.
    pub fn slice(&self, offset: usize, size: usize) -> XirResult<AlignedBuffer> {
        if self.is_empty() {
            return Err(IrError::InsufficientWeights(
                "empty weights data in bin file or bin file cannot be found".to_string(),
            )
            .into());
        }
        if self.len() < offset + size {
            return Err(IrError::InsufficientWeights(format!(
                "slice [{};{}) outside of {} bytes blob",
                offset,
                offset + size,
                self.len()
            ))
            .into());
        }
        Ok(AlignedBuffer::Shared { owner: self.clone(), offset, len: size })
    }

    /// True when both handles share the same allocation.
    pub fn same_blob(&self, other: &Weights) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for Weights {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

#[derive(Clone)]
pub enum AlignedBuffer {
    Owned(Vec<u8>),
    Shared { owner: Weights, offset: usize, len: usize },
}

impl AlignedBuffer {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            AlignedBuffer::Owned(v) => v,
            AlignedBuffer::Shared { owner, offset, len } => &owner[*offset..*offset + *len],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AlignedBuffer::Owned(v) => v.len(),
            AlignedBuffer::Shared { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The blob this buffer borrows from, if it is a shared view.
    pub fn shared_owner(&self) -> Option<&Weights> {
        match self {
            AlignedBuffer::Owned(_) => None,
            AlignedBuffer::Shared { owner, .. } => Some(owner),
        }
    }
}

impl fmt::Debug for AlignedBuffer {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AlignedBuffer::Owned(v) => write!(fmt, "Owned({} bytes)", v.len()),
            AlignedBuffer::Shared { offset, len, .. } => {
                write!(fmt, "Shared({len} bytes at {offset})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_slice_does_not_copy() {
        let blob = Weights::new(vec![0, 1, 2, 3, 4, 5, 6, 7]);
        let buf = blob.slice(2, 4).unwrap();
        assert_eq!(buf.as_bytes(), &[2, 3, 4, 5]);
        assert!(buf.shared_owner().unwrap().same_blob(&blob));
        let base = blob.as_ptr() as usize;
        assert_eq!(buf.as_bytes().as_ptr() as usize, base + 2);
    }

    #[test]
    fn out_of_bounds_slice_is_rejected() {
        let blob = Weights::new(vec![0; 8]);
        let err = blob.slice(4, 8).unwrap_err();
        assert!(matches!(err.downcast_ref::<IrError>(), Some(IrError::InsufficientWeights(_))));
        let err = Weights::new(vec![]).slice(0, 0).unwrap_err();
        assert!(matches!(err.downcast_ref::<IrError>(), Some(IrError::InsufficientWeights(_))));
    }
}
