//! Element-wise arithmetic, enough to wire realistic graphs.

use super::Op;
use crate::errors::XirResult;
use crate::model::PortFact;
use crate::{tvec, TVec};
use anyhow::ensure;

#[derive(Debug, Clone, Default)]
pub struct Add;

impl Op for Add {
    fn name(&self) -> &'static str {
        "Add"
    }

    fn infer(&self, inputs: &[PortFact]) -> XirResult<TVec<PortFact>> {
        ensure!(inputs.len() == 2, "Add expects two inputs");
        Ok(tvec!(inputs[0].clone()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Relu;

impl Op for Relu {
    fn name(&self) -> &'static str {
        "ReLU"
    }

    fn infer(&self, inputs: &[PortFact]) -> XirResult<TVec<PortFact>> {
        ensure!(inputs.len() == 1, "ReLU expects one input");
        Ok(tvec!(inputs[0].clone()))
    }
}
