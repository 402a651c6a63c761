// modlink-aio/src/archive.rs
// Read-only access to a module path element, jar or exploded directory.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use modlink_common::error::{ModlinkError, Result};
use modlink_common::model::EntryKind;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{DateTime, ZipArchive, ZipWriter};

pub enum EntryArchive {
    Jar {
        path: PathBuf,
        archive: ZipArchive<BufReader<File>>,
    },
    Directory {
        path: PathBuf,
    },
}

impl EntryArchive {
    pub fn open(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| ModlinkError::Filesystem(path.to_path_buf(), e.to_string()))?;
        if metadata.is_dir() {
            debug!("Opening exploded module path entry {}", path.display());
            return Ok(Self::Directory {
                path: path.to_path_buf(),
            });
        }

        debug!("Opening jar {}", path.display());
        let file =
            File::open(path).map_err(|e| ModlinkError::Filesystem(path.to_path_buf(), e.to_string()))?;
        let archive = ZipArchive::new(BufReader::new(file))
            .map_err(|e| ModlinkError::Archive(path.to_path_buf(), e.to_string()))?;
        Ok(Self::Jar {
            path: path.to_path_buf(),
            archive,
        })
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Jar { path, .. } | Self::Directory { path } => path,
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Jar { .. } => EntryKind::Jar,
            Self::Directory { .. } => EntryKind::Directory,
        }
    }

    /// Reads one file by its `/`-separated name. `Ok(None)` when absent.
    pub fn read(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        match self {
            Self::Jar { path, archive } => {
                let mut file = match archive.by_name(name) {
                    Ok(file) => file,
                    Err(zip::result::ZipError::FileNotFound) => return Ok(None),
                    Err(e) => return Err(ModlinkError::Archive(path.clone(), e.to_string())),
                };
                // The recorded size comes from the archive and is not trusted.
                let mut bytes = Vec::new();
                file.read_to_end(&mut bytes)
                    .map_err(|e| ModlinkError::Archive(path.clone(), e.to_string()))?;
                Ok(Some(bytes))
            }
            Self::Directory { path } => {
                let file_path = name
                    .split('/')
                    .filter(|s| !s.is_empty())
                    .fold(path.clone(), |acc, part| acc.join(part));
                if !file_path.is_file() {
                    return Ok(None);
                }
                crate::fs::read_to_bytes(&file_path).map(Some)
            }
        }
    }

    /// All regular file names, `/`-separated and sorted.
    pub fn file_names(&mut self) -> Result<Vec<String>> {
        let mut names = match self {
            Self::Jar { archive, .. } => archive
                .file_names()
                .filter(|n| !n.ends_with('/'))
                .map(str::to_string)
                .collect::<Vec<_>>(),
            Self::Directory { path } => {
                let mut names = Vec::new();
                for entry in WalkDir::new(&*path).follow_links(true) {
                    let entry =
                        entry.map_err(|e| ModlinkError::Filesystem(path.clone(), e.to_string()))?;
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    if let Ok(relative) = entry.path().strip_prefix(&*path) {
                        let name = relative
                            .components()
                            .map(|c| c.as_os_str().to_string_lossy())
                            .collect::<Vec<_>>()
                            .join("/");
                        names.push(name);
                    }
                }
                names
            }
        };
        names.sort();
        Ok(names)
    }
}

/// Writes `files` as a jar at `path`, in name order with a fixed timestamp so
/// identical input gives identical bytes.
pub fn write_jar(path: &Path, files: &BTreeMap<String, Vec<u8>>) -> Result<()> {
    if let Some(parent) = path.parent() {
        crate::fs::create_dir_all(parent)?;
    }
    let archive_err = |e: zip::result::ZipError| ModlinkError::Archive(path.to_path_buf(), e.to_string());
    let file =
        File::create(path).map_err(|e| ModlinkError::Filesystem(path.to_path_buf(), e.to_string()))?;
    let options = SimpleFileOptions::default()
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);
    let mut writer = ZipWriter::new(BufWriter::new(file));
    for (name, bytes) in files {
        writer.start_file(name.as_str(), options).map_err(archive_err)?;
        writer
            .write_all(bytes)
            .map_err(|e| ModlinkError::Archive(path.to_path_buf(), e.to_string()))?;
    }
    let mut inner = writer.finish().map_err(archive_err)?;
    inner
        .flush()
        .map_err(|e| ModlinkError::Filesystem(path.to_path_buf(), e.to_string()))?;
    debug!("Wrote jar {} ({} files)", path.display(), files.len());
    Ok(())
}
