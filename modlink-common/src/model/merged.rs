// modlink-common/src/model/merged.rs
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::descriptor::ModuleDescriptor;

/// The single synthetic module formed from every resolved entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedModule {
    /// Union of all entry declarations after exclusions.
    pub descriptor: ModuleDescriptor,
    /// Module names declared by the resolved entries.
    pub entry_modules: BTreeSet<String>,
    /// Platform modules still required after exclusions.
    pub platform_requires: BTreeSet<String>,
    /// For each remaining `requires` target, the entry modules that required it.
    pub required_by: BTreeMap<String, Vec<String>>,
}

impl MergedModule {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Modules the linker is asked to resolve from.
    pub fn root_modules(&self) -> BTreeSet<String> {
        self.entry_modules
            .iter()
            .chain(self.platform_requires.iter())
            .cloned()
            .collect()
    }

    pub fn contains_module(&self, module: &str) -> bool {
        self.entry_modules.contains(module) || self.platform_requires.contains(module)
    }
}
