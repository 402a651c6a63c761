// modlink-core/src/module/reader.rs
//! Module Descriptor Reader.

use modlink_aio::EntryArchive;
use modlink_common::error::{ModlinkError, Result};
use modlink_common::model::ModuleDescriptor;
use tracing::debug;

use super::classfile::parse_module_info;
use super::manifest::Manifest;

const MODULE_INFO: &str = "module-info.class";
const VERSIONS_PREFIX: &str = "META-INF/versions/";

/// Reads the explicit descriptor of a module path entry.
///
/// Returns `NotAModule` when the entry carries no `module-info.class`; callers
/// route that case to the synthesizer instead of reporting it.
pub fn read_descriptor(archive: &mut EntryArchive, manifest: &Manifest) -> Result<ModuleDescriptor> {
    let path = archive.path().to_path_buf();
    let Some((location, bytes)) = locate_module_info(archive, manifest)? else {
        debug!("No module-info.class in {}", path.display());
        return Err(ModlinkError::NotAModule(path));
    };
    debug!("Parsing {} from {}", location, path.display());

    let mut descriptor = parse_module_info(&bytes)
        .map_err(|e| ModlinkError::ClassFormat(path.clone(), format!("{location}: {e}")))?;
    if descriptor.main_class.is_none() {
        descriptor.main_class = manifest.main_class().map(str::to_string);
    }
    Ok(descriptor)
}

/// Root `module-info.class` first, then the highest versioned copy. Versioned
/// entries only count in a jar whose manifest says `Multi-Release: true`.
fn locate_module_info(
    archive: &mut EntryArchive,
    manifest: &Manifest,
) -> Result<Option<(String, Vec<u8>)>> {
    if let Some(bytes) = archive.read(MODULE_INFO)? {
        return Ok(Some((MODULE_INFO.to_string(), bytes)));
    }
    if !manifest.is_multi_release() {
        return Ok(None);
    }

    let mut versions: Vec<(u32, String)> = archive
        .file_names()?
        .into_iter()
        .filter_map(|name| {
            let rest = name.strip_prefix(VERSIONS_PREFIX)?;
            let (version, file) = rest.split_once('/')?;
            if file != MODULE_INFO {
                return None;
            }
            version.parse::<u32>().ok().map(|v| (v, name.clone()))
        })
        .collect();
    versions.sort_by(|a, b| b.0.cmp(&a.0));

    for (_, name) in versions {
        if let Some(bytes) = archive.read(&name)? {
            return Ok(Some((name, bytes)));
        }
    }
    Ok(None)
}
