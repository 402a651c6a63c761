// modlink-core/src/link/modules.rs
//! Explicit modules written for the linker in place of the automatic entries.
//!
//! jlink refuses automatic modules, so the contents of every automatic entry
//! are folded into one open module named after the merged module. Each
//! automatic name survives as a delegating module that only
//! `requires transitive` the merged one, so explicit modules requiring it
//! still resolve.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use modlink_aio::{create_dir_all, write_jar, EntryArchive};
use modlink_common::error::{CollisionKind, ModlinkError, Result};
use modlink_common::model::{MergedModule, ModuleDescriptor, RequiresModifiers, ResolvedEntry};
use tracing::{debug, instrument, warn};

use crate::module::encode_module_info;

const MODULE_INFO: &str = "module-info.class";
const SERVICES_DIR: &str = "META-INF/services/";

/// Jars written for one link, in module path order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkModules {
    pub merged_jar: Option<PathBuf>,
    pub delegates: Vec<PathBuf>,
    /// Automatic module names now served by the merged jar.
    pub automatic: BTreeSet<String>,
}

impl LinkModules {
    pub fn jars(&self) -> impl Iterator<Item = &PathBuf> {
        self.merged_jar.iter().chain(self.delegates.iter())
    }

    pub fn replaces(&self, module: &str) -> bool {
        self.automatic.contains(module)
    }
}

/// Jar metadata that only describes the original archive.
fn is_dropped(name: &str) -> bool {
    if name == MODULE_INFO || name.ends_with("/module-info.class") {
        return true;
    }
    let Some(meta) = name.strip_prefix("META-INF/") else {
        return false;
    };
    if meta.contains('/') {
        return false;
    }
    let upper = meta.to_ascii_uppercase();
    upper == "MANIFEST.MF"
        || upper == "INDEX.LIST"
        || [".SF", ".RSA", ".DSA", ".EC"]
            .iter()
            .any(|ext| upper.ends_with(ext))
}

fn package_of(class_name: &str) -> Option<&str> {
    class_name.rsplit_once('.').map(|(package, _)| package)
}

/// Descriptor of the jar holding the automatic entries: open, exporting every
/// package they contain, reading the platform modules the merge kept.
pub fn link_descriptor(merged: &MergedModule, automatic: &[&ResolvedEntry]) -> Result<ModuleDescriptor> {
    let mut descriptor = ModuleDescriptor::new(merged.name())?;
    descriptor.open = true;
    for entry in automatic {
        descriptor
            .packages
            .extend(entry.descriptor.packages.iter().cloned());
        descriptor
            .exports
            .extend(entry.descriptor.exports.iter().cloned());
    }
    for (module, modifiers) in &merged.descriptor.requires {
        if merged.platform_requires.contains(module) {
            descriptor.add_requires(module.clone(), *modifiers);
        }
    }
    descriptor.uses = merged.descriptor.uses.clone();
    for (service, providers) in &merged.descriptor.provides {
        for provider in providers {
            let local = package_of(provider).is_some_and(|p| descriptor.packages.contains(p));
            if local {
                descriptor.add_provider(service.clone(), provider.clone());
            }
        }
    }
    Ok(descriptor)
}

/// Writes the merged jar and one delegating jar per automatic entry into
/// `dir`. Nothing is written when every entry is explicit.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn write_link_modules(
    dir: &Path,
    entries: &[ResolvedEntry],
    merged: &MergedModule,
) -> Result<LinkModules> {
    let mut automatic: Vec<&ResolvedEntry> = entries.iter().filter(|e| e.is_automatic()).collect();
    if automatic.is_empty() {
        debug!("No automatic entries, linking the module path as given");
        return Ok(LinkModules::default());
    }
    automatic.sort_by(|a, b| a.module_name().cmp(b.module_name()));
    if let Some(clash) = automatic.iter().find(|e| e.module_name() == merged.name()) {
        return Err(ModlinkError::NameCollision {
            kind: CollisionKind::Module,
            name: merged.name().to_string(),
            sources: vec![
                clash.path.display().to_string(),
                "merged_module_name".to_string(),
            ],
        });
    }
    create_dir_all(dir)?;

    let descriptor = link_descriptor(merged, &automatic)?;
    let mut files = BTreeMap::new();
    files.insert(MODULE_INFO.to_string(), encode_module_info(&descriptor));
    for entry in &automatic {
        let mut archive = EntryArchive::open(&entry.path)?;
        for name in archive.file_names()? {
            if is_dropped(&name) {
                continue;
            }
            let Some(bytes) = archive.read(&name)? else {
                continue;
            };
            if name.starts_with(SERVICES_DIR) {
                let merged_file: &mut Vec<u8> = files.entry(name).or_default();
                if !merged_file.is_empty() && !merged_file.ends_with(b"\n") {
                    merged_file.push(b'\n');
                }
                merged_file.extend_from_slice(&bytes);
                continue;
            }
            match files.entry(name) {
                Entry::Vacant(slot) => {
                    slot.insert(bytes);
                }
                Entry::Occupied(slot) => warn!(
                    "{} is in more than one automatic module; keeping the copy from an earlier one",
                    slot.key()
                ),
            }
        }
    }
    let merged_jar = dir.join(format!("{}.jar", merged.name()));
    write_jar(&merged_jar, &files)?;
    debug!(
        "Wrote {} with {} files from {} automatic entries",
        merged_jar.display(),
        files.len(),
        automatic.len()
    );

    let mut delegates = Vec::with_capacity(automatic.len());
    for entry in &automatic {
        let delegate = ModuleDescriptor::new(entry.module_name())?
            .with_requires(merged.name(), RequiresModifiers::TRANSITIVE);
        let path = dir.join(format!("{}.jar", entry.module_name()));
        let files = BTreeMap::from([(MODULE_INFO.to_string(), encode_module_info(&delegate))]);
        write_jar(&path, &files)?;
        delegates.push(path);
    }

    Ok(LinkModules {
        merged_jar: Some(merged_jar),
        delegates,
        automatic: automatic
            .iter()
            .map(|e| e.module_name().to_string())
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Write;

    use modlink_common::model::{DescriptorOrigin, EntryKind, NameSource};
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use super::*;
    use crate::module::parse_module_info;

    fn jar(path: &Path, files: &[(&str, &[u8])]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for (name, bytes) in files {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
    }

    fn automatic(path: PathBuf, name: &str, packages: &[&str]) -> ResolvedEntry {
        let mut descriptor = ModuleDescriptor::new(name).unwrap();
        for package in packages {
            descriptor = descriptor.with_exports(*package);
        }
        ResolvedEntry {
            path,
            kind: EntryKind::Jar,
            origin: DescriptorOrigin::Automatic(NameSource::FileName),
            descriptor,
        }
    }

    fn merged() -> MergedModule {
        MergedModule {
            descriptor: ModuleDescriptor::new("app.merged.module")
                .unwrap()
                .with_requires("b", RequiresModifiers::empty())
                .with_requires("java.sql", RequiresModifiers::TRANSITIVE)
                .with_uses("org.b.Spi")
                .with_provides("org.b.Spi", ["org.b.Impl", "org.example.app.AppSpi"]),
            entry_modules: BTreeSet::from(["app".to_string(), "b".to_string(), "c".to_string()]),
            platform_requires: BTreeSet::from(["java.sql".to_string()]),
            required_by: BTreeMap::new(),
        }
    }

    fn read(path: &Path) -> (Vec<String>, ModuleDescriptor) {
        let mut archive = EntryArchive::open(path).unwrap();
        let names = archive.file_names().unwrap();
        let info = archive.read(MODULE_INFO).unwrap().unwrap();
        (names, parse_module_info(&info).unwrap())
    }

    #[test]
    fn automatic_entries_fold_into_one_open_module() {
        let dir = TempDir::new().unwrap();
        let b = dir.path().join("b-1.0.jar");
        jar(
            &b,
            &[
                ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\r\n"),
                ("META-INF/SIGNER.SF", b"x"),
                ("META-INF/services/org.b.Spi", b"org.b.Impl"),
                ("org/b/Impl.class", b"\xCA\xFE\x00\x01"),
            ],
        );
        let c = dir.path().join("c-2.0.jar");
        jar(
            &c,
            &[
                ("META-INF/services/org.b.Spi", b"org.c.Other\n"),
                ("org/b/Impl.class", b"\xCA\xFE\x00\x02"),
                ("org/c/C.class", b"\xCA\xFE"),
            ],
        );
        let entries = vec![
            automatic(c, "c", &["org.b", "org.c"]),
            automatic(b, "b", &["org.b"]),
        ];

        let out = dir.path().join("modules");
        let modules = write_link_modules(&out, &entries, &merged()).unwrap();
        assert_eq!(modules.merged_jar, Some(out.join("app.merged.module.jar")));
        assert_eq!(modules.delegates, [out.join("b.jar"), out.join("c.jar")]);
        assert!(modules.replaces("b") && !modules.replaces("app"));

        let merged_jar = modules.merged_jar.as_deref().unwrap();
        let (names, descriptor) = read(merged_jar);
        assert_eq!(
            names,
            [
                "META-INF/services/org.b.Spi",
                "module-info.class",
                "org/b/Impl.class",
                "org/c/C.class"
            ]
        );
        assert!(descriptor.open);
        assert_eq!(
            descriptor.exports.iter().collect::<Vec<_>>(),
            ["org.b", "org.c"]
        );
        assert_eq!(
            descriptor.requires.get("java.sql"),
            Some(&RequiresModifiers::TRANSITIVE)
        );
        assert!(!descriptor.requires.contains_key("b"));
        assert_eq!(descriptor.provides["org.b.Spi"], ["org.b.Impl"]);

        let mut archive = EntryArchive::open(merged_jar).unwrap();
        // Entries are taken in module name order, so b's copy wins.
        assert_eq!(
            archive.read("org/b/Impl.class").unwrap().unwrap(),
            b"\xCA\xFE\x00\x01"
        );
        assert_eq!(
            archive.read("META-INF/services/org.b.Spi").unwrap().unwrap(),
            b"org.b.Impl\norg.c.Other\n"
        );

        let (names, delegate) = read(&out.join("b.jar"));
        assert_eq!(names, ["module-info.class"]);
        assert_eq!(delegate.name, "b");
        assert_eq!(
            delegate.requires.get("app.merged.module"),
            Some(&RequiresModifiers::TRANSITIVE)
        );
        assert!(delegate.packages.is_empty());
    }

    #[test]
    fn explicit_only_module_path_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let entry = ResolvedEntry {
            path: dir.path().join("app.jar"),
            kind: EntryKind::Jar,
            origin: DescriptorOrigin::Explicit,
            descriptor: ModuleDescriptor::new("app").unwrap(),
        };
        let out = dir.path().join("modules");
        let modules = write_link_modules(&out, &[entry], &merged()).unwrap();
        assert_eq!(modules, LinkModules::default());
        assert!(!out.exists());
    }

    #[test]
    fn automatic_name_equal_to_merged_name_collides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.merged.module.jar");
        jar(&path, &[("org/x/X.class", b"\xCA\xFE")]);
        let entries = [automatic(path, "app.merged.module", &["org.x"])];
        let err = write_link_modules(&dir.path().join("modules"), &entries, &merged()).unwrap_err();
        assert!(matches!(
            err,
            ModlinkError::NameCollision {
                kind: CollisionKind::Module,
                ..
            }
        ));
    }
}
