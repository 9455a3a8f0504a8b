//! In-memory virtual filesystem backend.
//!
//! [`MemFs`] holds regular files in a path-keyed map; directories are
//! implied by path prefixes, and `"."` names the root. File modification
//! times default to `UNIX_EPOCH` (the zero value a fixed-modification-time
//! view exists to mask) and can be set per entry. File handles support
//! seeking; directory handles list direct children in sorted order and
//! support pagination.

use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom};
use std::time::SystemTime;

use tracing::debug;
use vfskit_traits::{
    is_valid_path, DirEntry, DirHandle, Handle, Metadata, Vfs, VfsError, VfsResult,
};

const DIR_MODE: u32 = 0o555;
const FILE_MODE: u32 = 0o444;

/// A file stored in a [`MemFs`].
#[derive(Clone, Debug)]
pub struct MemEntry {
    pub data: Vec<u8>,
    pub mode: u32,
    pub modified: SystemTime,
}

impl MemEntry {
    /// Create an entry with default mode and a zero modification time.
    pub fn new<D: Into<Vec<u8>>>(data: D) -> Self {
        Self {
            data: data.into(),
            mode: FILE_MODE,
            modified: SystemTime::UNIX_EPOCH,
        }
    }

    /// Builder: set the permission bits.
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// Builder: set the modification time.
    pub fn with_modified(mut self, modified: SystemTime) -> Self {
        self.modified = modified;
        self
    }
}

/// In-memory filesystem backend.
#[derive(Clone, Debug, Default)]
pub struct MemFs {
    entries: BTreeMap<String, MemEntry>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a regular file with default mode and a zero modification time.
    ///
    /// Parent directories are implied by the path and need not be added.
    pub fn add_file<D: Into<Vec<u8>>>(&mut self, path: &str, data: D) {
        self.add_entry(path, MemEntry::new(data));
    }

    /// Add a file entry at `path`, replacing any previous entry.
    pub fn add_entry(&mut self, path: &str, entry: MemEntry) {
        self.entries.insert(path.to_string(), entry);
    }

    /// Direct children of the directory at `path` (`"."` for the root),
    /// sorted by name.
    fn list_children(&self, path: &str) -> Vec<DirEntry> {
        let prefix = if path == "." {
            String::new()
        } else {
            format!("{path}/")
        };

        let mut out: Vec<DirEntry> = Vec::new();
        for (key, entry) in &self.entries {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                None => out.push(DirEntry {
                    name: rest.to_string(),
                    is_dir: false,
                    is_symlink: false,
                    len: entry.data.len() as u64,
                }),
                Some((child, _)) => {
                    // Implied subdirectory; the map is sorted, so all keys
                    // under it are adjacent and the last pushed entry dedupes.
                    if out.last().map(|e| e.name.as_str()) != Some(child) {
                        out.push(DirEntry {
                            name: child.to_string(),
                            is_dir: true,
                            is_symlink: false,
                            len: 0,
                        });
                    }
                }
            }
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    fn is_implied_dir(&self, path: &str) -> bool {
        let prefix = format!("{path}/");
        self.entries.keys().any(|key| key.starts_with(&prefix))
    }
}

impl Vfs for MemFs {
    fn open(&self, path: &str) -> VfsResult<Box<dyn Handle>> {
        if !is_valid_path(path) {
            debug!(path, "rejecting invalid path");
            return Err(VfsError::invalid_path(path));
        }

        if let Some(entry) = self.entries.get(path) {
            let name = path.rsplit('/').next().unwrap_or(path).to_string();
            return Ok(Box::new(MemFile {
                meta: MemMetadata {
                    name,
                    len: entry.data.len() as u64,
                    mode: entry.mode,
                    modified: entry.modified,
                    is_dir: false,
                },
                data: entry.data.clone(),
                pos: 0,
            }));
        }

        if path == "." || self.is_implied_dir(path) {
            let name = if path == "." {
                ".".to_string()
            } else {
                path.rsplit('/').next().unwrap_or(path).to_string()
            };
            return Ok(Box::new(MemDir {
                meta: MemMetadata {
                    name,
                    len: 0,
                    mode: DIR_MODE,
                    modified: SystemTime::UNIX_EPOCH,
                    is_dir: true,
                },
                entries: self.list_children(path),
                pos: 0,
            }));
        }

        Err(VfsError::NotFound)
    }
}

#[derive(Clone, Debug)]
struct MemMetadata {
    name: String,
    len: u64,
    mode: u32,
    modified: SystemTime,
    is_dir: bool,
}

impl Metadata for MemMetadata {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn mode(&self) -> u32 {
        self.mode
    }

    fn modified(&self) -> SystemTime {
        self.modified
    }

    fn is_dir(&self) -> bool {
        self.is_dir
    }
}

struct MemFile {
    meta: MemMetadata,
    data: Vec<u8>,
    pos: u64,
}

impl Read for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let start = (self.pos as usize).min(self.data.len());
        let n = (self.data.len() - start).min(buf.len());
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for MemFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(delta) => self.pos as i128 + delta as i128,
            SeekFrom::End(delta) => self.data.len() as i128 + delta as i128,
        };
        set_pos(&mut self.pos, target)
    }
}

fn set_pos(pos: &mut u64, target: i128) -> io::Result<u64> {
    if target < 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "seek to a negative position",
        ));
    }
    *pos = target as u64;
    Ok(*pos)
}

impl Handle for MemFile {
    fn stat(&self) -> VfsResult<Box<dyn Metadata>> {
        Ok(Box::new(self.meta.clone()))
    }

    fn as_seek(&mut self) -> Option<&mut dyn Seek> {
        Some(self)
    }
}

struct MemDir {
    meta: MemMetadata,
    entries: Vec<DirEntry>,
    pos: usize,
}

impl Read for MemDir {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::IsADirectory,
            "cannot read a directory",
        ))
    }
}

impl Handle for MemDir {
    fn stat(&self) -> VfsResult<Box<dyn Metadata>> {
        Ok(Box::new(self.meta.clone()))
    }

    fn as_dir(&mut self) -> Option<&mut dyn DirHandle> {
        Some(self)
    }
}

impl DirHandle for MemDir {
    fn read_entries(&mut self, count: Option<usize>) -> VfsResult<Vec<DirEntry>> {
        let rest = self.entries.len() - self.pos;
        let take = count.map_or(rest, |n| n.min(rest));
        let batch = self.entries[self.pos..self.pos + take].to_vec();
        self.pos += take;
        Ok(batch)
    }
}
