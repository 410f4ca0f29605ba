//! Error kinds surfaced by the loader.
//!
//! All fallible APIs return [`XirResult`]; the loader fails fast and never
//! returns a partial `Function`. The precise failure taxonomy is kept as a
//! typed enum so callers can `downcast_ref::<IrError>()` an `anyhow::Error`
//! and match on the kind.

pub type XirResult<T> = anyhow::Result<T>;
pub use anyhow::Error as XirError;

#[derive(thiserror::Error, Debug)]
pub enum IrError {
    #[error("malformed IR: {0}")]
    MalformedXml(String),
    #[error("sub-graph operator has no body: {0}")]
    MissingBody(String),
    #[error("dangling edge: {0}")]
    DanglingEdge(String),
    #[error("invalid IR, name is not unique: {0}")]
    DuplicateName(String),
    #[error("invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("inconsistent layer ports: {0}")]
    InconsistentPortCount(String),
    #[error("unsupported opset: {0}")]
    UnknownOpset(String),
    #[error("opset does not contain operation: {0}")]
    UnknownOperator(String),
    #[error("no attribute adapter for: {0}")]
    UnknownAttribute(String),
    #[error("incorrect weights in bin file: {0}")]
    InsufficientWeights(String),
    #[error("attribute and shape size are inconsistent: {0}")]
    InconsistentWeightSize(String),
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),
}
