//! Compiled-in virtual filesystem backend.
//!
//! [`EmbedFs`] exposes a directory tree embedded into the binary with
//! [`include_dir`] through the [`Vfs`] boundary. Embedded entries carry no
//! modification time, so every entry reports `UNIX_EPOCH`. Pair this
//! backend with a fixed-modification-time view when consumers need a real
//! timestamp.

use std::io::{self, Read, Seek, SeekFrom};
use std::time::SystemTime;

use include_dir::Dir;
use tracing::debug;
use vfskit_traits::{
    is_valid_path, DirEntry, DirHandle, Handle, Metadata, Vfs, VfsError, VfsResult,
};

const DIR_MODE: u32 = 0o555;
const FILE_MODE: u32 = 0o444;

/// Filesystem backend over a directory tree embedded at compile time.
#[derive(Clone, Copy, Debug)]
pub struct EmbedFs {
    dir: &'static Dir<'static>,
}

impl EmbedFs {
    pub fn new(dir: &'static Dir<'static>) -> Self {
        Self { dir }
    }

    fn list_children(dir: &Dir<'static>) -> Vec<DirEntry> {
        let mut out: Vec<DirEntry> = Vec::new();
        for sub in dir.dirs() {
            out.push(DirEntry {
                name: base_name(sub.path()),
                is_dir: true,
                is_symlink: false,
                len: 0,
            });
        }
        for file in dir.files() {
            out.push(DirEntry {
                name: base_name(file.path()),
                is_dir: false,
                is_symlink: false,
                len: file.contents().len() as u64,
            });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

fn base_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl Vfs for EmbedFs {
    fn open(&self, path: &str) -> VfsResult<Box<dyn Handle>> {
        if !is_valid_path(path) {
            debug!(path, "rejecting invalid path");
            return Err(VfsError::invalid_path(path));
        }

        if path == "." {
            return Ok(Box::new(EmbedDir {
                name: ".".to_string(),
                entries: Self::list_children(self.dir),
                pos: 0,
            }));
        }

        if let Some(file) = self.dir.get_file(path) {
            return Ok(Box::new(EmbedFile {
                name: base_name(file.path()),
                data: file.contents(),
                pos: 0,
            }));
        }

        if let Some(sub) = self.dir.get_dir(path) {
            return Ok(Box::new(EmbedDir {
                name: base_name(sub.path()),
                entries: Self::list_children(sub),
                pos: 0,
            }));
        }

        Err(VfsError::NotFound)
    }
}

#[derive(Clone, Debug)]
struct EmbedMetadata {
    name: String,
    len: u64,
    is_dir: bool,
}

impl Metadata for EmbedMetadata {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn mode(&self) -> u32 {
        if self.is_dir {
            DIR_MODE
        } else {
            FILE_MODE
        }
    }

    fn modified(&self) -> SystemTime {
        // Embedded trees carry no timestamps.
        SystemTime::UNIX_EPOCH
    }

    fn is_dir(&self) -> bool {
        self.is_dir
    }
}

struct EmbedFile {
    name: String,
    data: &'static [u8],
    pos: u64,
}

impl Read for EmbedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let start = (self.pos as usize).min(self.data.len());
        let n = (self.data.len() - start).min(buf.len());
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for EmbedFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(delta) => self.pos as i128 + delta as i128,
            SeekFrom::End(delta) => self.data.len() as i128 + delta as i128,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative position",
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

impl Handle for EmbedFile {
    fn stat(&self) -> VfsResult<Box<dyn Metadata>> {
        Ok(Box::new(EmbedMetadata {
            name: self.name.clone(),
            len: self.data.len() as u64,
            is_dir: false,
        }))
    }

    fn as_seek(&mut self) -> Option<&mut dyn Seek> {
        Some(self)
    }
}

struct EmbedDir {
    name: String,
    entries: Vec<DirEntry>,
    pos: usize,
}

impl Read for EmbedDir {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::IsADirectory,
            "cannot read a directory",
        ))
    }
}

impl Handle for EmbedDir {
    fn stat(&self) -> VfsResult<Box<dyn Metadata>> {
        Ok(Box::new(EmbedMetadata {
            name: self.name.clone(),
            len: 0,
            is_dir: true,
        }))
    }

    fn as_dir(&mut self) -> Option<&mut dyn DirHandle> {
        Some(self)
    }
}

impl DirHandle for EmbedDir {
    fn read_entries(&mut self, count: Option<usize>) -> VfsResult<Vec<DirEntry>> {
        let rest = self.entries.len() - self.pos;
        let take = count.map_or(rest, |n| n.min(rest));
        let batch = self.entries[self.pos..self.pos + take].to_vec();
        self.pos += take;
        Ok(batch)
    }
}
