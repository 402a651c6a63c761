// modlink-core/src/module/mod.rs
pub mod classfile;
pub mod manifest;
pub mod platform;
pub mod reader;
pub mod synthesize;

use std::path::Path;

use modlink_aio::EntryArchive;
use modlink_common::error::{ModlinkError, Result};
use modlink_common::model::{DescriptorOrigin, ResolvedEntry};
use tracing::{debug, instrument};

pub use classfile::{encode_module_info, parse_module_info, ClassFormatError};
pub use manifest::Manifest;
pub use platform::PlatformModules;
pub use reader::read_descriptor;
pub use synthesize::{derive_module_name, synthesize};

/// Resolves one module path element: its explicit descriptor when it has one,
/// otherwise a synthesized automatic module.
#[instrument(skip_all, fields(entry = %path.display()))]
pub fn resolve_entry(path: &Path) -> Result<ResolvedEntry> {
    let mut archive = EntryArchive::open(path)?;
    let manifest = archive
        .read(manifest::MANIFEST_PATH)?
        .map(|bytes| Manifest::parse(&bytes))
        .unwrap_or_default();

    let (descriptor, origin) = match read_descriptor(&mut archive, &manifest) {
        Ok(descriptor) => (descriptor, DescriptorOrigin::Explicit),
        Err(ModlinkError::NotAModule(_)) => {
            let (descriptor, source) = synthesize(&mut archive, &manifest)?;
            (descriptor, DescriptorOrigin::Automatic(source))
        }
        Err(e) => return Err(e),
    };
    debug!("Resolved {} as {}", path.display(), descriptor);

    Ok(ResolvedEntry {
        path: path.to_path_buf(),
        kind: archive.kind(),
        origin,
        descriptor,
    })
}
