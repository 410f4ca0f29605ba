//! Neural-network operators exercised by the loader's fallback tables.

use super::{AttrKind, AttrValue, AttributeVisitor, Op};
use crate::element::ElementType;
use crate::errors::XirResult;
use crate::model::PortFact;
use crate::shape::PartialShape;
use crate::{tvec, TVec};
use anyhow::ensure;

fn dim(fact: &PortFact, axis: usize) -> i64 {
    fact.shape.dims().and_then(|d| d.get(axis).copied()).unwrap_or(-1)
}

#[derive(Debug, Clone)]
pub struct Mvn {
    pub across_channels: bool,
    pub normalize_variance: bool,
    pub eps: f64,
}

impl Default for Mvn {
    fn default() -> Mvn {
        Mvn { across_channels: false, normalize_variance: true, eps: 1e-9 }
    }
}

impl Op for Mvn {
    fn name(&self) -> &'static str {
        "MVN"
    }

    fn visit_attributes(&mut self, visitor: &mut dyn AttributeVisitor) -> XirResult<bool> {
        if let Some(AttrValue::Bool(b)) = visitor.fetch("across_channels", AttrKind::Bool)? {
            self.across_channels = b;
        }
        if let Some(AttrValue::Bool(b)) = visitor.fetch("normalize_variance", AttrKind::Bool)? {
            self.normalize_variance = b;
        }
        if let Some(AttrValue::F64(e)) = visitor.fetch("eps", AttrKind::F64)? {
            self.eps = e;
        }
        Ok(true)
    }

    fn infer(&self, inputs: &[PortFact]) -> XirResult<TVec<PortFact>> {
        ensure!(inputs.len() == 1, "MVN expects one input");
        Ok(tvec!(inputs[0].clone()))
    }
}

#[derive(Debug, Clone)]
pub struct RoiPooling {
    pub pooled_h: i64,
    pub pooled_w: i64,
    pub spatial_scale: f64,
    pub method: String,
}

impl Default for RoiPooling {
    fn default() -> RoiPooling {
        RoiPooling { pooled_h: 0, pooled_w: 0, spatial_scale: 1.0, method: "max".to_string() }
    }
}

impl Op for RoiPooling {
    fn name(&self) -> &'static str {
        "ROIPooling"
    }

    fn visit_attributes(&mut self, visitor: &mut dyn AttributeVisitor) -> XirResult<bool> {
        if let Some(AttrValue::I64(v)) = visitor.fetch("pooled_h", AttrKind::I64)? {
            self.pooled_h = v;
        }
        if let Some(AttrValue::I64(v)) = visitor.fetch("pooled_w", AttrKind::I64)? {
            self.pooled_w = v;
        }
        if let Some(AttrValue::F64(v)) = visitor.fetch("spatial_scale", AttrKind::F64)? {
            self.spatial_scale = v;
        }
        if let Some(AttrValue::Str(v)) = visitor.fetch("method", AttrKind::Str)? {
            self.method = v;
        }
        Ok(true)
    }

    fn infer(&self, inputs: &[PortFact]) -> XirResult<TVec<PortFact>> {
        ensure!(inputs.len() == 2, "ROIPooling expects feature map and rois");
        let shape =
            PartialShape::new([dim(&inputs[1], 0), dim(&inputs[0], 1), self.pooled_h, self.pooled_w]);
        Ok(tvec!(PortFact::new(inputs[0].element_type, shape)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReorgYolo {
    pub stride: i64,
}

impl Op for ReorgYolo {
    fn name(&self) -> &'static str {
        "ReorgYolo"
    }

    fn visit_attributes(&mut self, visitor: &mut dyn AttributeVisitor) -> XirResult<bool> {
        if let Some(AttrValue::I64(v)) = visitor.fetch("stride", AttrKind::I64)? {
            self.stride = v;
        }
        Ok(true)
    }

    fn infer(&self, inputs: &[PortFact]) -> XirResult<TVec<PortFact>> {
        ensure!(inputs.len() == 1, "ReorgYolo expects one input");
        ensure!(self.stride > 0, "ReorgYolo stride must be positive");
        let s = self.stride;
        let d = |ix: usize| dim(&inputs[0], ix);
        let fixed = |v: i64, f: &dyn Fn(i64) -> i64| if v < 0 { -1 } else { f(v) };
        let shape = PartialShape::new([
            d(0),
            fixed(d(1), &|c| c * s * s),
            fixed(d(2), &|h| h / s),
            fixed(d(3), &|w| w / s),
        ]);
        Ok(tvec!(PortFact::new(inputs[0].element_type, shape)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Concat {
    pub axis: i64,
}

impl Op for Concat {
    fn name(&self) -> &'static str {
        "Concat"
    }

    fn visit_attributes(&mut self, visitor: &mut dyn AttributeVisitor) -> XirResult<bool> {
        if let Some(AttrValue::I64(v)) = visitor.fetch("axis", AttrKind::I64)? {
            self.axis = v;
        }
        Ok(true)
    }

    fn infer(&self, inputs: &[PortFact]) -> XirResult<TVec<PortFact>> {
        ensure!(!inputs.is_empty(), "Concat expects at least one input");
        let first = &inputs[0];
        let Some(dims) = first.shape.dims() else {
            return Ok(tvec!(first.clone()));
        };
        let rank = dims.len() as i64;
        let axis = if self.axis < 0 { self.axis + rank } else { self.axis };
        ensure!((0..rank).contains(&axis), "Concat axis {} out of rank {}", self.axis, rank);
        let mut out: TVec<i64> = dims.into();
        out[axis as usize] = inputs
            .iter()
            .try_fold(0i64, |acc, f| {
                let d = dim(f, axis as usize);
                if d < 0 { None } else { Some(acc + d) }
            })
            .unwrap_or(-1);
        Ok(tvec!(PortFact::new(first.element_type, PartialShape::new(out))))
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum TopKMode {
    #[default]
    Max,
    Min,
}

impl TopKMode {
    pub fn parse(s: &str) -> Option<TopKMode> {
        match s {
            "max" => Some(TopKMode::Max),
            "min" => Some(TopKMode::Min),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum TopKSort {
    #[default]
    None,
    Index,
    Value,
}

impl TopKSort {
    pub fn parse(s: &str) -> Option<TopKSort> {
        match s {
            "none" => Some(TopKSort::None),
            "index" => Some(TopKSort::Index),
            "value" => Some(TopKSort::Value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TopK {
    pub axis: i64,
    pub mode: TopKMode,
    pub sort: TopKSort,
    pub index_element_type: ElementType,
}

impl Default for TopK {
    fn default() -> TopK {
        TopK {
            axis: 0,
            mode: TopKMode::default(),
            sort: TopKSort::default(),
            index_element_type: ElementType::I32,
        }
    }
}

impl Op for TopK {
    fn name(&self) -> &'static str {
        "TopK"
    }

    fn visit_attributes(&mut self, visitor: &mut dyn AttributeVisitor) -> XirResult<bool> {
        if let Some(AttrValue::I64(v)) = visitor.fetch("axis", AttrKind::I64)? {
            self.axis = v;
        }
        if let Some(AttrValue::TopKMode(v)) = visitor.fetch("mode", AttrKind::TopKMode)? {
            self.mode = v;
        }
        if let Some(AttrValue::TopKSort(v)) = visitor.fetch("sort", AttrKind::TopKSort)? {
            self.sort = v;
        }
        if let Some(AttrValue::ElementType(t)) =
            visitor.fetch("index_element_type", AttrKind::ElementType)?
        {
            self.index_element_type = t;
        }
        Ok(true)
    }

    fn infer(&self, inputs: &[PortFact]) -> XirResult<TVec<PortFact>> {
        ensure!(inputs.len() == 2, "TopK expects data and k");
        // k is a runtime input: the selected axis becomes dynamic.
        let shape = match inputs[0].shape.dims() {
            None => PartialShape::dynamic(),
            Some(dims) => {
                let rank = dims.len() as i64;
                let axis = if self.axis < 0 { self.axis + rank } else { self.axis };
                ensure!((0..rank).contains(&axis), "TopK axis {} out of rank {}", self.axis, rank);
                let mut out: TVec<i64> = dims.into();
                out[axis as usize] = -1;
                PartialShape::new(out)
            }
        };
        Ok(tvec!(
            PortFact::new(inputs[0].element_type, shape.clone()),
            PortFact::new(self.index_element_type, shape),
        ))
    }
}

#[derive(Debug, Clone, Default)]
pub struct GruCell {
    pub hidden_size: i64,
    pub activations: Vec<String>,
    pub activations_alpha: Vec<f32>,
    pub activations_beta: Vec<f32>,
    pub clip: f64,
    pub linear_before_reset: bool,
}

impl Op for GruCell {
    fn name(&self) -> &'static str {
        "GRUCell"
    }

    fn visit_attributes(&mut self, visitor: &mut dyn AttributeVisitor) -> XirResult<bool> {
        if let Some(AttrValue::I64(v)) = visitor.fetch("hidden_size", AttrKind::I64)? {
            self.hidden_size = v;
        }
        if let Some(AttrValue::VecStr(v)) = visitor.fetch("activations", AttrKind::VecStr)? {
            self.activations = v;
        }
        if let Some(AttrValue::VecF32(v)) = visitor.fetch("activations_alpha", AttrKind::VecF32)? {
            self.activations_alpha = v;
        }
        if let Some(AttrValue::VecF32(v)) = visitor.fetch("activations_beta", AttrKind::VecF32)? {
            self.activations_beta = v;
        }
        if let Some(AttrValue::F64(v)) = visitor.fetch("clip", AttrKind::F64)? {
            self.clip = v;
        }
        if let Some(AttrValue::Bool(v)) = visitor.fetch("linear_before_reset", AttrKind::Bool)? {
            self.linear_before_reset = v;
        }
        Ok(true)
    }

    fn infer(&self, inputs: &[PortFact]) -> XirResult<TVec<PortFact>> {
        ensure!(inputs.len() >= 4, "GRUCell expects X, H, W, R (and optional B)");
        let shape = PartialShape::new([dim(&inputs[0], 0), self.hidden_size]);
        Ok(tvec!(PortFact::new(inputs[0].element_type, shape)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct RnnCell {
    pub hidden_size: i64,
    pub activations: Vec<String>,
    pub activations_alpha: Vec<f32>,
    pub activations_beta: Vec<f32>,
    pub clip: f64,
}

impl Op for RnnCell {
    fn name(&self) -> &'static str {
        "RNNCell"
    }

    fn visit_attributes(&mut self, visitor: &mut dyn AttributeVisitor) -> XirResult<bool> {
        if let Some(AttrValue::I64(v)) = visitor.fetch("hidden_size", AttrKind::I64)? {
            self.hidden_size = v;
        }
        if let Some(AttrValue::VecStr(v)) = visitor.fetch("activations", AttrKind::VecStr)? {
            self.activations = v;
        }
        if let Some(AttrValue::VecF32(v)) = visitor.fetch("activations_alpha", AttrKind::VecF32)? {
            self.activations_alpha = v;
        }
        if let Some(AttrValue::VecF32(v)) = visitor.fetch("activations_beta", AttrKind::VecF32)? {
            self.activations_beta = v;
        }
        if let Some(AttrValue::F64(v)) = visitor.fetch("clip", AttrKind::F64)? {
            self.clip = v;
        }
        Ok(true)
    }

    fn infer(&self, inputs: &[PortFact]) -> XirResult<TVec<PortFact>> {
        ensure!(inputs.len() >= 4, "RNNCell expects X, H, W, R (and optional B)");
        let shape = PartialShape::new([dim(&inputs[0], 0), self.hidden_size]);
        Ok(tvec!(PortFact::new(inputs[0].element_type, shape)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Proposal {
    pub base_size: i64,
    pub pre_nms_topn: i64,
    pub post_nms_topn: i64,
    pub nms_thresh: f64,
    pub feat_stride: i64,
    pub min_size: i64,
    pub ratio: Vec<f32>,
    pub scale: Vec<f32>,
    pub clip_before_nms: bool,
    pub clip_after_nms: bool,
    pub normalize: bool,
    pub framework: String,
}

impl Op for Proposal {
    fn name(&self) -> &'static str {
        "Proposal"
    }

    fn visit_attributes(&mut self, visitor: &mut dyn AttributeVisitor) -> XirResult<bool> {
        if let Some(AttrValue::I64(v)) = visitor.fetch("base_size", AttrKind::I64)? {
            self.base_size = v;
        }
        if let Some(AttrValue::I64(v)) = visitor.fetch("pre_nms_topn", AttrKind::I64)? {
            self.pre_nms_topn = v;
        }
        if let Some(AttrValue::I64(v)) = visitor.fetch("post_nms_topn", AttrKind::I64)? {
            self.post_nms_topn = v;
        }
        if let Some(AttrValue::F64(v)) = visitor.fetch("nms_thresh", AttrKind::F64)? {
            self.nms_thresh = v;
        }
        if let Some(AttrValue::I64(v)) = visitor.fetch("feat_stride", AttrKind::I64)? {
            self.feat_stride = v;
        }
        if let Some(AttrValue::I64(v)) = visitor.fetch("min_size", AttrKind::I64)? {
            self.min_size = v;
        }
        if let Some(AttrValue::VecF32(v)) = visitor.fetch("ratio", AttrKind::VecF32)? {
            self.ratio = v;
        }
        if let Some(AttrValue::VecF32(v)) = visitor.fetch("scale", AttrKind::VecF32)? {
            self.scale = v;
        }
        if let Some(AttrValue::Bool(v)) = visitor.fetch("clip_before_nms", AttrKind::Bool)? {
            self.clip_before_nms = v;
        }
        if let Some(AttrValue::Bool(v)) = visitor.fetch("clip_after_nms", AttrKind::Bool)? {
            self.clip_after_nms = v;
        }
        if let Some(AttrValue::Bool(v)) = visitor.fetch("normalize", AttrKind::Bool)? {
            self.normalize = v;
        }
        if let Some(AttrValue::Str(v)) = visitor.fetch("framework", AttrKind::Str)? {
            self.framework = v;
        }
        Ok(true)
    }

    fn infer(&self, inputs: &[PortFact]) -> XirResult<TVec<PortFact>> {
        ensure!(inputs.len() == 3, "Proposal expects scores, deltas and image shape");
        let batch = dim(&inputs[0], 0);
        let rois = if batch < 0 { -1 } else { batch * self.post_nms_topn };
        Ok(tvec!(PortFact::new(inputs[0].element_type, PartialShape::new([rois, 5]))))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExperimentalDetectronDetectionOutput {
    pub score_threshold: f64,
    pub nms_threshold: f64,
    pub num_classes: i64,
    pub post_nms_count: i64,
    pub max_detections_per_image: i64,
    pub class_agnostic_box_regression: bool,
    pub max_delta_log_wh: f64,
    pub deltas_weights: Vec<f32>,
}

impl Op for ExperimentalDetectronDetectionOutput {
    fn name(&self) -> &'static str {
        "ExperimentalDetectronDetectionOutput"
    }

    fn visit_attributes(&mut self, visitor: &mut dyn AttributeVisitor) -> XirResult<bool> {
        if let Some(AttrValue::F64(v)) = visitor.fetch("score_threshold", AttrKind::F64)? {
            self.score_threshold = v;
        }
        if let Some(AttrValue::F64(v)) = visitor.fetch("nms_threshold", AttrKind::F64)? {
            self.nms_threshold = v;
        }
        if let Some(AttrValue::I64(v)) = visitor.fetch("num_classes", AttrKind::I64)? {
            self.num_classes = v;
        }
        if let Some(AttrValue::I64(v)) = visitor.fetch("post_nms_count", AttrKind::I64)? {
            self.post_nms_count = v;
        }
        if let Some(AttrValue::I64(v)) = visitor.fetch("max_detections_per_image", AttrKind::I64)? {
            self.max_detections_per_image = v;
        }
        if let Some(AttrValue::Bool(v)) =
            visitor.fetch("class_agnostic_box_regression", AttrKind::Bool)?
        {
            self.class_agnostic_box_regression = v;
        }
        if let Some(AttrValue::F64(v)) = visitor.fetch("max_delta_log_wh", AttrKind::F64)? {
            self.max_delta_log_wh = v;
        }
        if let Some(AttrValue::VecF32(v)) = visitor.fetch("deltas_weights", AttrKind::VecF32)? {
            self.deltas_weights = v;
        }
        Ok(true)
    }

    fn infer(&self, inputs: &[PortFact]) -> XirResult<TVec<PortFact>> {
        ensure!(inputs.len() == 4, "ExperimentalDetectronDetectionOutput expects four inputs");
        let n = self.max_detections_per_image;
        Ok(tvec!(
            PortFact::new(inputs[0].element_type, PartialShape::new([n, 4])),
            PortFact::new(ElementType::I32, PartialShape::new([n])),
            PortFact::new(inputs[0].element_type, PartialShape::new([n])),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::MapVisitor;

    fn map_of(pairs: &[(&str, &str)]) -> MapVisitor {
        MapVisitor(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn attributes_come_through_the_map_visitor() {
        let mut mvn = Mvn::default();
        let done = mvn
            .visit_attributes(&mut map_of(&[
                ("across_channels", "1"),
                ("normalize_variance", "false"),
                ("eps", "0.5"),
            ]))
            .unwrap();
        assert!(done);
        assert!(mvn.across_channels);
        assert!(!mvn.normalize_variance);
        assert_eq!(mvn.eps, 0.5);
    }

    #[test]
    fn absent_attributes_keep_the_defaults() {
        let mut mvn = Mvn::default();
        mvn.visit_attributes(&mut map_of(&[("across_channels", "banana")])).unwrap();
        assert!(!mvn.across_channels);
        assert!(mvn.normalize_variance);
        assert_eq!(mvn.eps, 1e-9);
    }
}
