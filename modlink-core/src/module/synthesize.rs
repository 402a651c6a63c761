// modlink-core/src/module/synthesize.rs
//! Automatic Module Synthesizer: descriptors for entries without `module-info.class`.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use modlink_aio::EntryArchive;
use modlink_common::error::{ModlinkError, Result};
use modlink_common::model::descriptor::{is_valid_module_name, JAVA_KEYWORDS};
use modlink_common::model::{ModuleDescriptor, NameSource};
use regex::Regex;
use tracing::debug;

use super::manifest::Manifest;

lazy_static! {
    static ref VERSION_SUFFIX_RE: Regex = Regex::new(r"-(\d+(\.|$))").unwrap();
    static ref NON_ALNUM_RE: Regex = Regex::new(r"[^A-Za-z0-9]").unwrap();
    static ref REPEATED_DOTS_RE: Regex = Regex::new(r"\.{2,}").unwrap();
}

/// Name and version derived from a jar file name, e.g. `b-1.0.jar` gives
/// `("b", Some("1.0"))`. `None` when nothing usable is left.
pub fn derive_module_name(file_name: &str) -> Option<(String, Option<String>)> {
    let stem = file_name
        .strip_suffix(".jar")
        .or_else(|| file_name.strip_suffix(".JAR"))
        .unwrap_or(file_name);

    let (base, version) = match VERSION_SUFFIX_RE.find(stem) {
        Some(m) => (
            &stem[..m.start()],
            Some(stem[m.start() + 1..].to_string()).filter(|v| !v.is_empty()),
        ),
        None => (stem, None),
    };

    let dotted = NON_ALNUM_RE.replace_all(base, ".");
    let collapsed = REPEATED_DOTS_RE.replace_all(&dotted, ".");
    let trimmed = collapsed.trim_matches('.');
    if trimmed.is_empty() {
        return None;
    }

    let name = trimmed
        .split('.')
        .map(legal_segment)
        .collect::<Vec<_>>()
        .join(".");
    Some((name, version))
}

fn legal_segment(segment: &str) -> String {
    if segment.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{segment}")
    } else if JAVA_KEYWORDS.contains(&segment) || matches!(segment, "true" | "false" | "null") {
        format!("{segment}_")
    } else {
        segment.to_string()
    }
}

/// Builds the descriptor of an automatic module.
///
/// The name comes from `Automatic-Module-Name` when the manifest has one,
/// otherwise from the file name. Every package holding a class is exported;
/// no requires, uses or provides are declared.
pub fn synthesize(archive: &mut EntryArchive, manifest: &Manifest) -> Result<(ModuleDescriptor, NameSource)> {
    let path = archive.path().to_path_buf();

    let (name, version, source) = match manifest.automatic_module_name() {
        Some(name) => {
            if !is_valid_module_name(name) {
                return Err(ModlinkError::Archive(
                    path,
                    format!("Automatic-Module-Name '{name}' is not a legal module name"),
                ));
            }
            let version = path
                .file_name()
                .and_then(|n| derive_module_name(&n.to_string_lossy()))
                .and_then(|(_, v)| v);
            (name.to_string(), version, NameSource::Manifest)
        }
        None => {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let (name, version) = derive_module_name(&file_name).ok_or_else(|| {
                ModlinkError::Archive(
                    path.clone(),
                    "cannot derive an automatic module name from the file name".to_string(),
                )
            })?;
            (name, version, NameSource::FileName)
        }
    };

    let packages = class_packages(&archive.file_names()?);
    debug!(
        "Synthesized automatic module '{}' for {} ({} packages, name from {:?})",
        name,
        path.display(),
        packages.len(),
        source
    );

    let mut descriptor = ModuleDescriptor::new(name)?;
    descriptor.version = version;
    for package in packages {
        descriptor = descriptor.with_exports(package);
    }
    descriptor.main_class = manifest.main_class().map(str::to_string);
    Ok((descriptor, source))
}

fn class_packages(file_names: &[String]) -> BTreeSet<String> {
    file_names
        .iter()
        .filter(|name| name.ends_with(".class") && !name.starts_with("META-INF/"))
        .filter_map(|name| name.rsplit_once('/').map(|(dir, _)| dir.replace('/', ".")))
        .filter(|package| is_valid_module_name(package))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_version_and_extension() {
        assert_eq!(
            derive_module_name("b-1.0.jar"),
            Some(("b".to_string(), Some("1.0".to_string())))
        );
        assert_eq!(
            derive_module_name("commons-lang3-3.12.0.jar"),
            Some(("commons.lang3".to_string(), Some("3.12.0".to_string())))
        );
        assert_eq!(derive_module_name("guava.jar"), Some(("guava".to_string(), None)));
    }

    #[test]
    fn replaces_illegal_characters_and_collapses_dots() {
        let (name, version) = derive_module_name("foo_bar--baz..qux-2.jar").unwrap();
        assert_eq!(name, "foo.bar.baz.qux");
        assert_eq!(version.as_deref(), Some("2"));
    }

    #[test]
    fn digit_and_keyword_segments_are_made_legal() {
        let (name, _) = derive_module_name("java-native-2d.jar").unwrap();
        // `-2d` is not a version: the digit run is not followed by a dot or the end.
        assert_eq!(name, "java.native_._2d");
        assert!(is_valid_module_name(&name));
    }

    #[test]
    fn nothing_left_is_none() {
        assert_eq!(derive_module_name("-1.0.jar"), None);
        assert_eq!(derive_module_name("___.jar"), None);
    }

    #[test]
    fn packages_skip_metadata_and_default_package() {
        let names = vec![
            "META-INF/MANIFEST.MF".to_string(),
            "META-INF/versions/11/org/x/Y.class".to_string(),
            "Root.class".to_string(),
            "org/b/B.class".to_string(),
            "org/b/B$Inner.class".to_string(),
            "org/b/impl/C.class".to_string(),
            "org/b/res/logo.png".to_string(),
        ];
        let packages = class_packages(&names);
        assert_eq!(
            packages.into_iter().collect::<Vec<_>>(),
            ["org.b", "org.b.impl"]
        );
    }
}
