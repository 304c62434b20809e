//! Transformation registry.
//!
//! Maps transformation names to [`TransformationSpec`]s. Two tiers are kept:
//! built-ins, installed when the registry is created, and extensions
//! registered by user code. Lookup always consults extensions first, so an
//! extension with the same name as a built-in shadows it everywhere the
//! registry is used, both during config validation and during execution.
//!
//! ```no_run
//! use datamorph::registry::Registry;
//!
//! let registry = Registry::with_builtins();
//! assert!(registry.resolve("CreateColumn").is_some());
//! ```

use crate::transform::TransformationSpec;
use crate::transformations;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
pub struct Registry {
    builtins: HashMap<String, TransformationSpec>,
    extensions: HashMap<String, TransformationSpec>,
}

impl Registry {
    /// Registry with no transformations at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding every built-in transformation.
    pub fn with_builtins() -> Self {
        let builtins = transformations::builtins()
            .into_iter()
            .map(|spec| (spec.name().to_owned(), spec))
            .collect();
        Self {
            builtins,
            extensions: HashMap::new(),
        }
    }

    /// Register an extension, returning the extension it replaced, if any.
    pub fn register_extension(&mut self, spec: TransformationSpec) -> Option<TransformationSpec> {
        tracing::debug!("Registering extension transformation {}", spec.name());
        self.extensions.insert(spec.name().to_owned(), spec)
    }

    /// Register several extensions at once.
    pub fn extend_extensions(&mut self, specs: impl IntoIterator<Item = TransformationSpec>) {
        for spec in specs {
            self.register_extension(spec);
        }
    }

    /// Look up `name`, extensions first.
    pub fn resolve(&self, name: &str) -> Option<&TransformationSpec> {
        self.extensions
            .get(name)
            .or_else(|| self.builtins.get(name))
    }

    pub fn is_extension(&self, name: &str) -> bool {
        self.extensions.contains_key(name)
    }

    /// Every resolvable name, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.builtins
            .keys()
            .chain(self.extensions.keys())
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// The spec each name currently resolves to, sorted by name.
    pub fn specs(&self) -> Vec<&TransformationSpec> {
        self.names()
            .into_iter()
            .filter_map(|name| self.resolve(name))
            .collect()
    }
}
