//! Constant, fed from the weights blob or from an inline attribute.

use super::{AttrKind, AttrValue, AttributeVisitor, Op};
use crate::buffer::AlignedBuffer;
use crate::element::ElementType;
use crate::errors::XirResult;
use crate::model::PortFact;
use crate::shape::PartialShape;
use crate::{tvec, TVec};
use anyhow::ensure;

#[derive(Debug, Clone)]
pub struct Constant {
    pub element_type: ElementType,
    pub shape: TVec<u64>,
    pub value: Option<AlignedBuffer>,
    alloc_on_visit: bool,
}

impl Default for Constant {
    fn default() -> Constant {
        Constant {
            element_type: ElementType::default(),
            shape: tvec!(),
            value: None,
            alloc_on_visit: true,
        }
    }
}

impl Constant {
    /// By default a visited buffer is copied into an owning allocation.
    /// The loader disables this so constants keep borrowing the weights
    /// blob instead.
    pub fn alloc_buffer_on_visit_attributes(&mut self, flag: bool) {
        self.alloc_on_visit = flag;
    }

    pub fn buffer(&self) -> Option<&AlignedBuffer> {
        self.value.as_ref()
    }
}

impl Op for Constant {
    fn name(&self) -> &'static str {
        "Constant"
    }

    fn visit_attributes(&mut self, visitor: &mut dyn AttributeVisitor) -> XirResult<bool> {
        if let Some(AttrValue::ElementType(t)) = visitor.fetch("element_type", AttrKind::ElementType)? {
            self.element_type = t;
        }
        if let Some(AttrValue::Shape(s)) = visitor.fetch("shape", AttrKind::Shape)? {
            self.shape = s;
        }
        if let Some(AttrValue::Buffer(b)) = visitor.fetch("value", AttrKind::Buffer)? {
            self.value = Some(if self.alloc_on_visit {
                AlignedBuffer::Owned(b.as_bytes().to_vec())
            } else {
                b
            });
        }
        Ok(true)
    }

    fn infer(&self, inputs: &[PortFact]) -> XirResult<TVec<PortFact>> {
        ensure!(inputs.is_empty(), "Constant takes no input");
        let shape = PartialShape::new(self.shape.iter().map(|&d| d as i64));
        Ok(tvec!(PortFact::new(self.element_type, shape)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Weights;

    /// Hands out a shared view into a blob, the way the loader does.
    struct BlobVisitor(Weights);

    impl AttributeVisitor for BlobVisitor {
        fn fetch(&mut self, name: &str, kind: AttrKind) -> XirResult<Option<AttrValue>> {
            Ok(match (name, kind) {
                ("element_type", AttrKind::ElementType) => {
                    Some(AttrValue::ElementType(ElementType::F32))
                }
                ("shape", AttrKind::Shape) => {
                    Some(AttrValue::Shape([2u64].into_iter().collect()))
                }
                ("value", AttrKind::Buffer) => Some(AttrValue::Buffer(self.0.slice(0, 8)?)),
                _ => None,
            })
        }
    }

    #[test]
    fn allocation_switch_decides_buffer_ownership() {
        let weights = Weights::new(vec![7u8; 8]);

        let mut copying = Constant::default();
        copying.visit_attributes(&mut BlobVisitor(weights.clone())).unwrap();
        let buffer = copying.buffer().unwrap();
        assert!(buffer.shared_owner().is_none());
        assert_eq!(buffer.as_bytes(), &[7u8; 8]);

        let mut sharing = Constant::default();
        sharing.alloc_buffer_on_visit_attributes(false);
        sharing.visit_attributes(&mut BlobVisitor(weights.clone())).unwrap();
        assert!(sharing.buffer().unwrap().shared_owner().unwrap().same_blob(&weights));
    }
}
