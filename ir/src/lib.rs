//! # xir
//!
//! XML frontend for the xir graph model. Feeds an IR document plus its
//! binary weights blob through the [`deser::XmlDeserializer`] and returns
//! a fully wired [`xir_core::model::Function`].
//!
//! ```rust
//! # fn main() -> xir_core::XirResult<()> {
//! let xml = r#"<net name="empty" version="10">
//!     <layers></layers><edges></edges></net>"#;
//! let function = xir::ir().convert(xml, xir::Weights::new(vec![]))?;
//! assert_eq!(function.name, "empty");
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod deser;
pub mod framework;
mod xml;

pub use framework::{ir, Ir, OpsetExtension};
pub use xir_core::buffer::Weights;
pub use xir_core::prelude;
