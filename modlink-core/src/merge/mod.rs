// modlink-core/src/merge/mod.rs
//! Module Graph Merger.
//!
//! Folds every resolved entry into one synthetic descriptor, applies the
//! exclusion rules once over the finished union, then checks that every
//! remaining `requires` can be satisfied.

use std::collections::{BTreeMap, BTreeSet};

use modlink_common::error::{Contributor, ModlinkError, Result};
use modlink_common::model::descriptor::source_name;
use modlink_common::model::{
    ExclusionRuleSet, MergedModule, ModuleDescriptor, RequiresModifiers, ResolvedEntry,
};
use tracing::{debug, error, instrument, warn};

use crate::module::PlatformModules;

/// Per-target bookkeeping while requires clauses are unioned.
#[derive(Debug, Default)]
struct RequiresAccumulator {
    transitive: bool,
    all_static: bool,
    contributors: BTreeSet<String>,
}

#[instrument(skip_all, fields(merged = merged_name, entries = entries.len()))]
pub fn merge_entries(
    entries: &[ResolvedEntry],
    exclusions: &ExclusionRuleSet,
    merged_name: &str,
    platform: &PlatformModules,
) -> Result<MergedModule> {
    let mut canonical: Vec<&ResolvedEntry> = entries.iter().collect();
    canonical.sort_by(|a, b| {
        a.module_name()
            .cmp(b.module_name())
            .then_with(|| a.path.cmp(&b.path))
    });

    let mut descriptor = ModuleDescriptor::new(merged_name)?;
    let entry_modules: BTreeSet<String> = canonical
        .iter()
        .map(|e| e.module_name().to_string())
        .collect();

    let mut requires: BTreeMap<String, RequiresAccumulator> = BTreeMap::new();
    for entry in &canonical {
        let d = &entry.descriptor;
        for (target, modifiers) in &d.requires {
            if modifiers.contains(RequiresModifiers::MANDATED) || target == merged_name {
                continue;
            }
            let acc = requires.entry(target.clone()).or_insert_with(|| RequiresAccumulator {
                all_static: true,
                ..Default::default()
            });
            acc.transitive |= modifiers.contains(RequiresModifiers::TRANSITIVE);
            acc.all_static &= modifiers.contains(RequiresModifiers::STATIC);
            acc.contributors.insert(d.name.clone());
        }
        descriptor.exports.extend(d.exports.iter().cloned());
        descriptor.opens.extend(d.opens.iter().cloned());
        descriptor.packages.extend(d.packages.iter().cloned());
        descriptor.uses.extend(d.uses.iter().cloned());
        for (service, providers) in &d.provides {
            for provider in providers {
                descriptor.add_provider(service.clone(), provider.clone());
            }
        }
    }

    apply_exclusions(&mut requires, &mut descriptor, exclusions);

    let mut platform_requires = BTreeSet::new();
    let mut required_by = BTreeMap::new();
    for (target, acc) in requires {
        let resolvable = entry_modules.contains(&target) || platform.contains(&target);
        if !resolvable {
            if acc.all_static {
                debug!(
                    "Dropping optional requires '{}' (static in {:?}, not on the module path)",
                    target, acc.contributors
                );
                continue;
            }
            let chain = contributor_chain(&target, &canonical);
            error!("Module '{}' is required but cannot be resolved", target);
            return Err(ModlinkError::UnresolvedDependency {
                module: target,
                required_by: chain,
            });
        }

        if !entry_modules.contains(&target) {
            platform_requires.insert(target.clone());
        }
        let mut modifiers = RequiresModifiers::empty();
        if acc.transitive {
            modifiers |= RequiresModifiers::TRANSITIVE;
        }
        if acc.all_static {
            modifiers |= RequiresModifiers::STATIC;
        }
        descriptor.add_requires(target.clone(), modifiers);
        required_by.insert(target, acc.contributors.into_iter().collect());
    }

    debug!("Merged module: {}", descriptor);
    Ok(MergedModule {
        descriptor,
        entry_modules,
        platform_requires,
        required_by,
    })
}

fn apply_exclusions(
    requires: &mut BTreeMap<String, RequiresAccumulator>,
    descriptor: &mut ModuleDescriptor,
    exclusions: &ExclusionRuleSet,
) {
    for module in exclusions.excluded_requires() {
        if requires.remove(module).is_some() {
            debug!("Excluded requires '{}'", module);
        } else {
            warn!("exclude_requires '{}' matches no requires clause; ignored", module);
        }
    }

    let (excluded_uses, kept_uses): (BTreeSet<String>, BTreeSet<String>) =
        std::mem::take(&mut descriptor.uses)
            .into_iter()
            .partition(|service| exclusions.excludes_uses(service));
    descriptor.uses = kept_uses;
    for service in &excluded_uses {
        debug!("Excluded uses '{}'", service);
    }
    for rule in exclusions.excluded_uses() {
        let matched = excluded_uses
            .iter()
            .any(|s| s == rule || source_name(s) == *rule);
        if !matched {
            warn!("exclude_uses '{}' matches no uses clause; ignored", rule);
        }
    }

    let dropped: Vec<String> = descriptor
        .provides
        .keys()
        .filter(|service| exclusions.excludes_provides(service))
        .cloned()
        .collect();
    for service in &dropped {
        debug!("Excluded provides of '{}'", service);
        descriptor.provides.remove(service);
    }
    for pattern in exclusions.excluded_provides() {
        if !dropped
            .iter()
            .any(|s| pattern.matches(s) || pattern.matches(&source_name(s)))
        {
            warn!("exclude_provides pattern '{}' matches no provided service; ignored", pattern);
        }
    }
}

/// Follows `requires` edges backwards from the missing module, one
/// contributor per step, until an entry nothing else requires.
fn contributor_chain(missing: &str, entries: &[&ResolvedEntry]) -> Vec<Contributor> {
    let requirer_of = |module: &str| {
        entries
            .iter()
            .find(|e| e.descriptor.requires.contains_key(module))
            .copied()
    };

    let mut chain = Vec::new();
    let mut visited = BTreeSet::new();
    let mut current = missing.to_string();
    while let Some(entry) = requirer_of(&current) {
        if !visited.insert(entry.module_name().to_string()) {
            break;
        }
        chain.push(Contributor {
            module: entry.module_name().to_string(),
            source: entry.path.clone(),
        });
        current = entry.module_name().to_string();
    }
    chain
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use modlink_common::model::{DescriptorOrigin, EntryKind, NameSource};

    use super::*;

    fn entry(descriptor: ModuleDescriptor) -> ResolvedEntry {
        ResolvedEntry {
            path: PathBuf::from(format!("/libs/{}.jar", descriptor.name)),
            kind: EntryKind::Jar,
            origin: DescriptorOrigin::Explicit,
            descriptor,
        }
    }

    fn automatic(descriptor: ModuleDescriptor) -> ResolvedEntry {
        ResolvedEntry {
            origin: DescriptorOrigin::Automatic(NameSource::FileName),
            ..entry(descriptor)
        }
    }

    fn platform() -> PlatformModules {
        ["java.base", "java.sql", "java.logging", "java.compiler"]
            .into_iter()
            .collect()
    }

    fn merge(entries: &[ResolvedEntry], exclusions: &ExclusionRuleSet) -> Result<MergedModule> {
        merge_entries(entries, exclusions, "app.merged.module", &platform())
    }

    #[test]
    fn explicit_module_requiring_automatic_one() {
        let a = entry(
            ModuleDescriptor::new("a")
                .unwrap()
                .with_requires("b", RequiresModifiers::empty())
                .with_requires("java.base", RequiresModifiers::MANDATED),
        );
        let b = automatic(ModuleDescriptor::new("b").unwrap().with_exports("org.b"));

        let merged = merge(&[a, b], &ExclusionRuleSet::default()).unwrap();
        assert_eq!(merged.descriptor.requires.keys().collect::<Vec<_>>(), ["b"]);
        assert_eq!(
            merged.root_modules().into_iter().collect::<Vec<_>>(),
            ["a", "b"]
        );
        assert_eq!(merged.required_by["b"], ["a"]);
        assert!(merged.descriptor.exports.contains("org.b"));
    }

    #[test]
    fn modifiers_union_transitive_and_intersect_static() {
        let a = entry(
            ModuleDescriptor::new("a")
                .unwrap()
                .with_requires("java.sql", RequiresModifiers::STATIC)
                .with_requires("java.logging", RequiresModifiers::STATIC),
        );
        let c = entry(
            ModuleDescriptor::new("c")
                .unwrap()
                .with_requires("java.sql", RequiresModifiers::TRANSITIVE)
                .with_requires("java.logging", RequiresModifiers::STATIC),
        );
        let merged = merge(&[a, c], &ExclusionRuleSet::default()).unwrap();
        assert_eq!(
            merged.descriptor.requires["java.sql"],
            RequiresModifiers::TRANSITIVE
        );
        assert_eq!(
            merged.descriptor.requires["java.logging"],
            RequiresModifiers::STATIC
        );
    }

    #[test]
    fn excluded_provides_pattern_drops_whole_mapping() {
        let a = entry(
            ModuleDescriptor::new("a")
                .unwrap()
                .with_provides("com.example.Plugin", ["a.PluginImpl"])
                .with_provides("org.other.Codec", ["a.CodecImpl"]),
        );
        let exclusions = ExclusionRuleSet::builder()
            .exclude_provides("com.example.*")
            .build()
            .unwrap();
        let merged = merge(&[a], &exclusions).unwrap();
        assert!(!merged.descriptor.provides.contains_key("com.example.Plugin"));
        assert_eq!(merged.descriptor.provides["org.other.Codec"], ["a.CodecImpl"]);
    }

    #[test]
    fn excluded_uses_match_binary_or_source_form() {
        let a = entry(
            ModuleDescriptor::new("a")
                .unwrap()
                .with_uses("org.log.ThreadDumpMessage$ThreadInfoFactory")
                .with_uses("org.log.Other"),
        );
        let exclusions = ExclusionRuleSet::builder()
            .exclude_uses(["org.log.ThreadDumpMessage.ThreadInfoFactory"])
            .build()
            .unwrap();
        let merged = merge(&[a], &exclusions).unwrap();
        assert_eq!(
            merged.descriptor.uses.iter().collect::<Vec<_>>(),
            ["org.log.Other"]
        );
    }

    #[test]
    fn unknown_exclusions_are_ignored() {
        let a = entry(
            ModuleDescriptor::new("a")
                .unwrap()
                .with_requires("java.sql", RequiresModifiers::empty()),
        );
        let baseline = merge(&[a.clone()], &ExclusionRuleSet::default()).unwrap();
        let exclusions = ExclusionRuleSet::builder()
            .exclude_requires(["java.rmi"])
            .build()
            .unwrap();
        let merged = merge(&[a], &exclusions).unwrap();
        assert_eq!(merged, baseline);
    }

    #[test]
    fn excluding_a_requires_removes_only_that_edge() {
        let a = entry(
            ModuleDescriptor::new("a")
                .unwrap()
                .with_requires("java.sql", RequiresModifiers::empty())
                .with_requires("java.compiler", RequiresModifiers::empty())
                .with_requires("b", RequiresModifiers::empty()),
        );
        let b = automatic(ModuleDescriptor::new("b").unwrap());
        let exclusions = ExclusionRuleSet::builder()
            .exclude_requires(["java.compiler"])
            .build()
            .unwrap();
        let merged = merge(&[a, b], &exclusions).unwrap();
        assert_eq!(
            merged.descriptor.requires.keys().collect::<Vec<_>>(),
            ["b", "java.sql"]
        );
        assert!(!merged.platform_requires.contains("java.compiler"));
    }

    #[test]
    fn unresolvable_requires_reports_the_chain() {
        let a = entry(
            ModuleDescriptor::new("a")
                .unwrap()
                .with_requires("lib", RequiresModifiers::empty()),
        );
        let lib = entry(
            ModuleDescriptor::new("lib")
                .unwrap()
                .with_requires("org.missing", RequiresModifiers::empty()),
        );
        let err = merge(&[a, lib], &ExclusionRuleSet::default()).unwrap_err();
        match err {
            ModlinkError::UnresolvedDependency {
                module,
                required_by,
            } => {
                assert_eq!(module, "org.missing");
                let chain: Vec<_> = required_by.iter().map(|c| c.module.as_str()).collect();
                assert_eq!(chain, ["lib", "a"]);
                assert_eq!(required_by[0].source, PathBuf::from("/libs/lib.jar"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn static_only_unresolvable_requires_is_dropped() {
        let a = entry(
            ModuleDescriptor::new("a")
                .unwrap()
                .with_requires("org.optional", RequiresModifiers::STATIC),
        );
        let merged = merge(&[a], &ExclusionRuleSet::default()).unwrap();
        assert!(merged.descriptor.requires.is_empty());
    }

    #[test]
    fn excluded_unresolvable_requires_is_not_validated() {
        let a = entry(
            ModuleDescriptor::new("a")
                .unwrap()
                .with_requires("org.missing", RequiresModifiers::empty()),
        );
        let exclusions = ExclusionRuleSet::builder()
            .exclude_requires(["org.missing"])
            .build()
            .unwrap();
        assert!(merge(&[a], &exclusions).is_ok());
    }

    #[test]
    fn merge_is_order_independent() {
        let a = entry(
            ModuleDescriptor::new("a")
                .unwrap()
                .with_requires("java.sql", RequiresModifiers::empty())
                .with_exports("a.api")
                .with_uses("s.Service")
                .with_provides("s.Service", ["a.Impl"]),
        );
        let b = automatic(ModuleDescriptor::new("b").unwrap().with_exports("b"));
        let c = entry(
            ModuleDescriptor::new("c")
                .unwrap()
                .with_requires("b", RequiresModifiers::TRANSITIVE)
                .with_provides("s.Service", ["c.Impl"]),
        );

        let forward = merge(&[a.clone(), b.clone(), c.clone()], &ExclusionRuleSet::default()).unwrap();
        let backward = merge(&[c, a, b], &ExclusionRuleSet::default()).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward.descriptor.provides["s.Service"], ["a.Impl", "c.Impl"]);
    }
}
