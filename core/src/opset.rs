//! Versioned operator sets.
//!
//! An [`Opset`] maps type names to factories producing default-initialized
//! ops; an [`OpsetRegistry`] maps version names ("opset1"...) to opsets.
//! Lookups are case-insensitive on the type name: descriptors in the wild
//! carry spellings like "RELU" or "const".

use crate::errors::{IrError, XirResult};
use crate::ops::{io, konst, math, nn, scan, state, Op};
use anyhow::bail;
use std::collections::HashMap;

type OpFactory = fn() -> Box<dyn Op>;

fn factory<O: Op + Default>() -> Box<dyn Op> {
    Box::<O>::default()
}

/// One operator set: a name-to-factory table.
#[derive(Clone, Default)]
pub struct Opset {
    factories: HashMap<String, OpFactory>,
}

impl Opset {
    pub fn register(&mut self, name: &str, f: OpFactory) {
        trace!("registering factory for \"{name}\"");
        self.factories.insert(name.to_lowercase(), f);
    }

    /// Build a default instance of the named op, matching the type name
    /// case-insensitively.
    pub fn create(&self, name: &str) -> Option<Box<dyn Op>> {
        self.factories.get(&name.to_lowercase()).map(|f| f())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_lowercase())
    }
}

impl std::fmt::Debug for Opset {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        use itertools::Itertools;
        write!(fmt, "Opset {{ {} }}", self.factories.keys().sorted().join(", "))
    }
}

fn opset1() -> Opset {
    let mut s = Opset::default();
    s.register("Parameter", factory::<io::Parameter>);
    s.register("Result", factory::<io::Result_>);
    s.register("Constant", factory::<konst::Constant>);
    s.register("Add", factory::<math::Add>);
    s.register("ReLU", factory::<math::Relu>);
    s.register("Concat", factory::<nn::Concat>);
    s.register("TopK", factory::<nn::TopK>);
    s.register("TensorIterator", factory::<scan::TensorIterator>);
    s
}

fn opset2() -> Opset {
    let mut s = opset1();
    s.register("MVN", factory::<nn::Mvn>);
    s.register("ROIPooling", factory::<nn::RoiPooling>);
    s.register("ReorgYolo", factory::<nn::ReorgYolo>);
    s
}

fn opset3() -> Opset {
    let mut s = opset2();
    s.register("ReadValue", factory::<state::ReadValue>);
    s.register("Assign", factory::<state::Assign>);
    s
}

fn opset4() -> Opset {
    opset3()
}

fn opset5() -> Opset {
    let mut s = opset4();
    s.register("Loop", factory::<scan::Loop>);
    s
}

fn opset6() -> Opset {
    let mut s = opset5();
    s.register("GRUCell", factory::<nn::GruCell>);
    s.register("RNNCell", factory::<nn::RnnCell>);
    s.register("Proposal", factory::<nn::Proposal>);
    s.register(
        "ExperimentalDetectronDetectionOutput",
        factory::<nn::ExperimentalDetectronDetectionOutput>,
    );
    s
}

fn opset7() -> Opset {
    opset6()
}

fn opset8() -> Opset {
    opset7()
}

/// All known opsets, keyed by version name.
#[derive(Clone, Debug, Default)]
pub struct OpsetRegistry {
    opsets: HashMap<String, Opset>,
}

impl OpsetRegistry {
    /// The built-in opset1 through opset8 lineage.
    pub fn with_builtins() -> OpsetRegistry {
        let mut r = OpsetRegistry::default();
        for (name, builder) in [
            ("opset1", opset1 as fn() -> Opset),
            ("opset2", opset2),
            ("opset3", opset3),
            ("opset4", opset4),
            ("opset5", opset5),
            ("opset6", opset6),
            ("opset7", opset7),
            ("opset8", opset8),
        ] {
            r.opsets.insert(name.to_string(), builder());
        }
        r
    }

    /// Register an extension opset. Version names are unique: colliding
    /// with a built-in or a previous extension is an error.
    pub fn register(&mut self, name: &str, opset: Opset) -> XirResult<()> {
        if self.opsets.contains_key(name) {
            bail!(IrError::UnknownOpset(format!("opset \"{name}\" is already registered")));
        }
        debug!("registering extension opset \"{name}\" ({opset:?})");
        self.opsets.insert(name.to_string(), opset);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Opset> {
        self.opsets.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let r = OpsetRegistry::with_builtins();
        let s = r.get("opset1").unwrap();
        assert!(s.create("relu").is_some());
        assert!(s.create("RELU").is_some());
        assert_eq!(s.create("ReLU").unwrap().name(), "ReLU");
    }

    #[test]
    fn opsets_layer_up() {
        let r = OpsetRegistry::with_builtins();
        assert!(!r.get("opset1").unwrap().contains("MVN"));
        assert!(r.get("opset2").unwrap().contains("MVN"));
        assert!(!r.get("opset4").unwrap().contains("Loop"));
        assert!(r.get("opset5").unwrap().contains("Loop"));
        assert!(r.get("opset8").unwrap().contains("GRUCell"));
    }

    #[test]
    fn extension_opset_names_must_be_fresh() {
        let mut r = OpsetRegistry::with_builtins();
        let mut custom = Opset::default();
        custom.register("ReLU", || Box::<crate::ops::math::Relu>::default());
        assert!(r.register("extension1", custom.clone()).is_ok());
        assert!(r.register("extension1", custom.clone()).is_err());
        assert!(r.register("opset1", custom).is_err());
    }
}
