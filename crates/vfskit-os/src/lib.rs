//! OS-directory virtual filesystem backend.
//!
//! [`OsFs`] exposes the tree rooted at an OS directory through the
//! [`Vfs`] boundary. Paths are validated before they touch the OS, so a
//! handle can never escape the root. Directory listings are snapshotted and
//! sorted at open, which keeps pagination deterministic across platforms.

use std::any::Any;
use std::fs;
use std::io::{self, Read, Seek};
use std::path::PathBuf;
use std::time::SystemTime;

use tracing::debug;
use vfskit_traits::{
    is_valid_path, DirEntry, DirHandle, Handle, Metadata, Vfs, VfsError, VfsResult,
};

/// Filesystem backend rooted at an OS directory.
#[derive(Clone, Debug)]
pub struct OsFs {
    root: PathBuf,
}

impl OsFs {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

impl Vfs for OsFs {
    fn open(&self, path: &str) -> VfsResult<Box<dyn Handle>> {
        if !is_valid_path(path) {
            debug!(path, "rejecting invalid path");
            return Err(VfsError::invalid_path(path));
        }
        let full = if path == "." {
            self.root.clone()
        } else {
            self.root.join(path)
        };
        let name = if path == "." {
            ".".to_string()
        } else {
            path.rsplit('/').next().unwrap_or(path).to_string()
        };

        let meta = fs::metadata(&full).map_err(VfsError::from_io)?;
        if meta.is_dir() {
            let entries = read_sorted_entries(&full)?;
            return Ok(Box::new(OsDir {
                name,
                meta,
                entries,
                pos: 0,
            }));
        }

        let file = fs::File::open(&full).map_err(VfsError::from_io)?;
        Ok(Box::new(OsFile { name, file }))
    }
}

fn read_sorted_entries(dir: &std::path::Path) -> VfsResult<Vec<DirEntry>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).map_err(VfsError::from_io)? {
        let entry = entry.map_err(VfsError::from_io)?;
        let file_type = entry.file_type().map_err(VfsError::from_io)?;
        let len = entry.metadata().map(|m| m.len()).unwrap_or(0);
        out.push(DirEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir: file_type.is_dir(),
            is_symlink: file_type.is_symlink(),
            len,
        });
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

fn mode_bits(meta: &fs::Metadata) -> u32 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode()
    }
    #[cfg(not(unix))]
    {
        if meta.permissions().readonly() {
            0o444
        } else {
            0o666
        }
    }
}

struct OsMetadata {
    name: String,
    meta: fs::Metadata,
}

impl Metadata for OsMetadata {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> u64 {
        self.meta.len()
    }

    fn mode(&self) -> u32 {
        mode_bits(&self.meta)
    }

    fn modified(&self) -> SystemTime {
        self.meta.modified().unwrap_or(SystemTime::UNIX_EPOCH)
    }

    fn is_dir(&self) -> bool {
        self.meta.is_dir()
    }

    fn sys(&self) -> Option<&dyn Any> {
        Some(&self.meta)
    }
}

struct OsFile {
    name: String,
    file: fs::File,
}

impl Read for OsFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Handle for OsFile {
    fn stat(&self) -> VfsResult<Box<dyn Metadata>> {
        let meta = self.file.metadata().map_err(VfsError::from_io)?;
        Ok(Box::new(OsMetadata {
            name: self.name.clone(),
            meta,
        }))
    }

    fn as_seek(&mut self) -> Option<&mut dyn Seek> {
        Some(&mut self.file)
    }
}

struct OsDir {
    name: String,
    meta: fs::Metadata,
    entries: Vec<DirEntry>,
    pos: usize,
}

impl Read for OsDir {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::IsADirectory,
            "cannot read a directory",
        ))
    }
}

impl Handle for OsDir {
    fn stat(&self) -> VfsResult<Box<dyn Metadata>> {
        Ok(Box::new(OsMetadata {
            name: self.name.clone(),
            meta: self.meta.clone(),
        }))
    }

    fn as_dir(&mut self) -> Option<&mut dyn DirHandle> {
        Some(self)
    }
}

impl DirHandle for OsDir {
    fn read_entries(&mut self, count: Option<usize>) -> VfsResult<Vec<DirEntry>> {
        let rest = self.entries.len() - self.pos;
        let take = count.map_or(rest, |n| n.min(rest));
        let batch = self.entries[self.pos..self.pos + take].to_vec();
        self.pos += take;
        Ok(batch)
    }
}
