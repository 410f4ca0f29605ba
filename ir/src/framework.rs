//! The `Ir` framework value: opset registry configuration and the
//! conversion entry point.

use crate::deser::XmlDeserializer;
use xir_core::internal::*;

/// A caller-supplied opset extension: named opsets to add to the
/// registry, plus a free-form description. The description
/// `"framework_node_ext"` turns on the framework-node fallback for
/// conversions run with this extension.
#[derive(Clone, Default)]
pub struct OpsetExtension {
    pub description: String,
    pub opsets: HashMap<String, Opset>,
}

pub const FRAMEWORK_NODE_EXT: &str = "framework_node_ext";

/// The IR frontend. Carries the opset registry and the framework-node
/// toggle; immutable during `convert`, so one `Ir` can serve concurrent
/// conversions.
#[derive(Clone)]
pub struct Ir {
    registry: OpsetRegistry,
    use_framework_node: bool,
}

impl Default for Ir {
    fn default() -> Ir {
        Ir { registry: OpsetRegistry::with_builtins(), use_framework_node: false }
    }
}

impl Ir {
    /// Add an extension's opsets. A name colliding with a built-in or a
    /// previously registered extension is fatal.
    pub fn with_opset_extension(mut self, extension: OpsetExtension) -> XirResult<Ir> {
        if extension.description == FRAMEWORK_NODE_EXT {
            self.use_framework_node = true;
        }
        for (name, opset) in extension.opsets {
            self.registry.register(&name, opset)?;
        }
        Ok(self)
    }

    pub fn enable_framework_node(&mut self, enable: bool) {
        self.use_framework_node = enable;
    }

    pub fn registry(&self) -> &OpsetRegistry {
        &self.registry
    }

    /// Load a `<net>` document and its weights blob into a Function.
    pub fn convert(&self, xml: &str, weights: Weights) -> XirResult<Function> {
        let document = roxmltree::Document::parse(xml)
            .map_err(|e| IrError::MalformedXml(e.to_string()))?;
        let root = document.root_element();
        if !root.has_tag_name("net") {
            bail!(IrError::MalformedXml(format!(
                "expected top-level <net>, got <{}>",
                root.tag_name().name()
            )));
        }
        let mut variables = HashMap::new();
        let mut visitor = XmlDeserializer::new(
            root,
            weights,
            &self.registry,
            &mut variables,
            self.use_framework_node,
        );
        match visitor.fetch("net", AttrKind::Function)? {
            Some(AttrValue::Function(function)) => Ok(function),
            _ => bail!(IrError::MalformedXml("document did not yield a function".into())),
        }
    }
}

/// The frontend with the built-in opsets, ready to convert.
pub fn ir() -> Ir {
    Ir::default()
}
