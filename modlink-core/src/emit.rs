// modlink-core/src/emit.rs
use std::path::{Path, PathBuf};

use modlink_aio::atomic_write_file;
use modlink_common::error::Result;
use modlink_common::model::MergedModule;
use tracing::debug;

use crate::module::encode_module_info;

/// Writes the merged module's `module-info.java` and `module-info.class` to `dir`.
pub fn emit_merged_module(dir: &Path, merged: &MergedModule) -> Result<Vec<PathBuf>> {
    let source = dir.join("module-info.java");
    atomic_write_file(&source, merged.descriptor.render_source().as_bytes())?;

    let class = dir.join("module-info.class");
    atomic_write_file(&class, &encode_module_info(&merged.descriptor))?;

    debug!("Emitted merged module '{}' to {}", merged.name(), dir.display());
    Ok(vec![source, class])
}
