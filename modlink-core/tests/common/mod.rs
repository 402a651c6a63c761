#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use modlink_aio::EntryArchive;
use modlink_common::error::{LinkFailureKind, ModlinkError, Result};
use modlink_common::model::ModuleDescriptor;
use modlink_core::link::{LinkPlan, Linker};
use modlink_core::module::encode_module_info;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{DateTime, ZipWriter};

/// Writes a jar with the given files. Timestamps are fixed.
pub fn write_jar(path: &Path, files: &[(&str, &[u8])]) -> PathBuf {
    let options = SimpleFileOptions::default().last_modified_time(DateTime::default());
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    for (name, bytes) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap();
    path.to_path_buf()
}

/// A modular jar holding `descriptor` and one class per exported package.
pub fn modular_jar(dir: &Path, file_name: &str, descriptor: &ModuleDescriptor) -> PathBuf {
    let info = encode_module_info(descriptor);
    let classes: Vec<String> = descriptor
        .exports
        .iter()
        .map(|p| format!("{}/Api.class", p.replace('.', "/")))
        .collect();
    let mut files: Vec<(&str, &[u8])> = vec![("module-info.class", info.as_slice())];
    for class in &classes {
        files.push((class.as_str(), &b"\xCA\xFE\xBA\xBE"[..]));
    }
    write_jar(&dir.join(file_name), &files)
}

/// A plain jar with one class in each package.
pub fn plain_jar(dir: &Path, file_name: &str, packages: &[&str]) -> PathBuf {
    let classes: Vec<String> = packages
        .iter()
        .map(|p| format!("{}/Impl.class", p.replace('.', "/")))
        .collect();
    let files: Vec<(&str, &[u8])> = classes
        .iter()
        .map(|c| (c.as_str(), &b"\xCA\xFE\xBA\xBE"[..]))
        .collect();
    write_jar(&dir.join(file_name), &files)
}

/// Every regular file below `root`, keyed by relative path.
pub fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            (rel, std::fs::read(e.path()).unwrap())
        })
        .collect()
}

/// Names in `dir` that look like leftover staging or backup directories.
pub fn leftovers(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.contains(".staging-") || n.starts_with(".modlink-previous-"))
        .collect()
}

/// Stands in for jlink: records the plan and writes a tiny runtime.
#[derive(Default)]
pub struct RecordingLinker {
    pub plans: Mutex<Vec<LinkPlan>>,
    /// Files of every module path jar written inside the staging directory,
    /// keyed by jar file name.
    pub generated: Mutex<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
    pub fail_with: Option<String>,
}

impl RecordingLinker {
    pub fn failing(diagnostic: &str) -> Self {
        Self {
            fail_with: Some(diagnostic.to_string()),
            ..Self::default()
        }
    }

    pub fn generated_jar(&self, file_name: &str) -> BTreeMap<String, Vec<u8>> {
        self.generated.lock().unwrap()[file_name].clone()
    }

    pub fn last_plan(&self) -> LinkPlan {
        self.plans.lock().unwrap().last().cloned().unwrap()
    }

    pub fn calls(&self) -> usize {
        self.plans.lock().unwrap().len()
    }
}

impl Linker for RecordingLinker {
    fn name(&self) -> &str {
        "recording"
    }

    fn link(&self, plan: &LinkPlan, image_dir: &Path) -> Result<()> {
        self.plans.lock().unwrap().push(plan.clone());
        let staging = image_dir.parent().unwrap();
        for jar in plan.module_path.iter().filter(|p| p.starts_with(staging)) {
            let mut archive = EntryArchive::open(jar).unwrap();
            let files = archive
                .file_names()
                .unwrap()
                .into_iter()
                .map(|name| {
                    let bytes = archive.read(&name).unwrap().unwrap();
                    (name, bytes)
                })
                .collect();
            let name = jar.file_name().unwrap().to_string_lossy().into_owned();
            self.generated.lock().unwrap().insert(name, files);
        }
        if let Some(diagnostic) = &self.fail_with {
            return Err(ModlinkError::LinkFailure {
                kind: LinkFailureKind::Other,
                diagnostic: diagnostic.clone(),
            });
        }
        std::fs::create_dir_all(image_dir.join("bin")).unwrap();
        std::fs::create_dir_all(image_dir.join("lib")).unwrap();
        std::fs::write(image_dir.join("bin/java"), b"#!/bin/sh\n").unwrap();
        std::fs::write(
            image_dir.join("lib/modules"),
            plan.root_modules.join("\n").as_bytes(),
        )
        .unwrap();
        Ok(())
    }
}
