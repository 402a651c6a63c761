// modlink-common/src/model/entry.rs
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::descriptor::ModuleDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    Jar,
    Directory,
}

/// Where an automatic module's name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NameSource {
    Manifest,
    FileName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DescriptorOrigin {
    /// Parsed from a `module-info.class`.
    Explicit,
    /// Synthesized for an entry without module metadata.
    Automatic(NameSource),
}

/// A module path element together with the descriptor resolved for it.
///
/// The entry only references `path`; the file itself is never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
    pub origin: DescriptorOrigin,
    pub descriptor: ModuleDescriptor,
}

impl ResolvedEntry {
    pub fn module_name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_automatic(&self) -> bool {
        matches!(self.origin, DescriptorOrigin::Automatic(_))
    }
}
