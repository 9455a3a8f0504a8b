//! Fixed-modification-time view over a virtual filesystem.
//!
//! [`FixedModTimeFs`] wraps any [`Vfs`] and reports a fixed, caller-supplied
//! modification time for every file and directory entry reachable through
//! it, while leaving every other behavior of the wrapped filesystem
//! unmodified. The primary use is compiled-in filesystems whose entries
//! report a zero modification time, which breaks consumers that rely on
//! modification time for caching, `If-Modified-Since` responses, or
//! deterministic build outputs.
//!
//! The view is stateless: it holds the wrapped filesystem and the timestamp,
//! nothing else. Errors from the wrapped filesystem are forwarded verbatim,
//! and optional handle capabilities (seeking, directory listing) are
//! preserved exactly: a wrapped handle supports a capability if and only
//! if the underlying handle does.

use std::any::Any;
use std::io::{Read, Seek};
use std::time::SystemTime;

use tracing::trace;
// Re-export all types from the traits crate
pub use vfskit_traits::*;

/// A view over a [`Vfs`] that reports a fixed modification time for every
/// entry.
///
/// Composable: wrapping an already-wrapped filesystem installs a new
/// override, and the outermost timestamp wins.
///
/// ```
/// use std::time::{Duration, SystemTime};
/// use vfskit_traits::Vfs;
/// use vfskit_fixed_mtime::FixedModTimeFs;
///
/// fn fix<F: Vfs>(fsys: F) -> FixedModTimeFs<F> {
///     let release = SystemTime::UNIX_EPOCH + Duration::from_secs(1_633_906_800);
///     FixedModTimeFs::new(fsys, release)
/// }
/// ```
pub struct FixedModTimeFs<F> {
    inner: F,
    mtime: SystemTime,
}

impl<F: Vfs> FixedModTimeFs<F> {
    /// Wrap `inner` so that every entry opened through the view reports
    /// `mtime` as its modification time.
    pub fn new(inner: F, mtime: SystemTime) -> Self {
        Self { inner, mtime }
    }
}

impl<F: Vfs> Vfs for FixedModTimeFs<F> {
    fn open(&self, path: &str) -> VfsResult<Box<dyn Handle>> {
        let mut handle = self.inner.open(path)?;

        // Treat as a directory only when the probe succeeds and the flag is
        // set; a failed probe selects the plain file wrapper and its error
        // stays internal.
        let is_dir = handle.stat().map(|m| m.is_dir()).unwrap_or(false);
        if is_dir && handle.as_dir().is_some() {
            trace!(path, "wrapping directory handle");
            return Ok(Box::new(FixedModTimeDir {
                inner: handle,
                mtime: self.mtime,
            }));
        }
        if handle.as_seek().is_some() {
            trace!(path, "wrapping seekable file handle");
            return Ok(Box::new(FixedModTimeSeekableFile {
                inner: handle,
                mtime: self.mtime,
            }));
        }
        trace!(path, "wrapping file handle");
        Ok(Box::new(FixedModTimeFile {
            inner: handle,
            mtime: self.mtime,
        }))
    }
}

fn wrap_stat(inner: &dyn Handle, mtime: SystemTime) -> VfsResult<Box<dyn Metadata>> {
    let meta = inner.stat()?;
    Ok(Box::new(FixedModTimeMetadata { inner: meta, mtime }))
}

/// File handle wrapper for underlying handles without seek support.
///
/// Inherits the trait's `None` default for `as_seek`, so it can never claim
/// a capability the underlying handle lacks.
struct FixedModTimeFile {
    inner: Box<dyn Handle>,
    mtime: SystemTime,
}

impl Read for FixedModTimeFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Handle for FixedModTimeFile {
    fn stat(&self) -> VfsResult<Box<dyn Metadata>> {
        wrap_stat(self.inner.as_ref(), self.mtime)
    }
}

/// File handle wrapper selected when the open-time probe observed seek
/// support on the underlying handle.
struct FixedModTimeSeekableFile {
    inner: Box<dyn Handle>,
    mtime: SystemTime,
}

impl Read for FixedModTimeSeekableFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Handle for FixedModTimeSeekableFile {
    fn stat(&self) -> VfsResult<Box<dyn Metadata>> {
        wrap_stat(self.inner.as_ref(), self.mtime)
    }

    fn as_seek(&mut self) -> Option<&mut dyn Seek> {
        self.inner.as_seek()
    }
}

/// Directory handle wrapper; listing operations go straight to the
/// underlying handle, preserving ordering and pagination state.
struct FixedModTimeDir {
    inner: Box<dyn Handle>,
    mtime: SystemTime,
}

impl Read for FixedModTimeDir {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Handle for FixedModTimeDir {
    fn stat(&self) -> VfsResult<Box<dyn Metadata>> {
        wrap_stat(self.inner.as_ref(), self.mtime)
    }

    fn as_dir(&mut self) -> Option<&mut dyn DirHandle> {
        self.inner.as_dir()
    }
}

/// Metadata wrapper: the single override point. Every accessor except
/// `modified` forwards to the underlying record.
struct FixedModTimeMetadata {
    inner: Box<dyn Metadata>,
    mtime: SystemTime,
}

impl Metadata for FixedModTimeMetadata {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn len(&self) -> u64 {
        self.inner.len()
    }

    fn mode(&self) -> u32 {
        self.inner.mode()
    }

    fn modified(&self) -> SystemTime {
        self.mtime
    }

    fn is_dir(&self) -> bool {
        self.inner.is_dir()
    }

    fn sys(&self) -> Option<&dyn Any> {
        self.inner.sys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::SeekFrom;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use vfskit_traits::VfsError;

    const DATA: &[u8] = b"test\n";

    fn fixed_time() -> SystemTime {
        // 2021-10-10T23:00:00Z
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_633_906_800)
    }

    struct MockFs {
        seekable: bool,
        stat_fails: bool,
        seek_calls: Arc<AtomicUsize>,
    }

    impl MockFs {
        fn new() -> Self {
            Self {
                seekable: false,
                stat_fails: false,
                seek_calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn seekable() -> Self {
            Self {
                seekable: true,
                ..Self::new()
            }
        }
    }

    impl Vfs for MockFs {
        fn open(&self, path: &str) -> VfsResult<Box<dyn Handle>> {
            if path != "test_data.txt" {
                return Err(VfsError::NotFound);
            }
            let file = MockFile {
                offset: 0,
                stat_fails: self.stat_fails,
            };
            if self.seekable {
                Ok(Box::new(MockSeekableFile {
                    file,
                    seek_calls: Arc::clone(&self.seek_calls),
                }))
            } else {
                Ok(Box::new(file))
            }
        }
    }

    struct MockFile {
        offset: usize,
        stat_fails: bool,
    }

    impl Read for MockFile {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let rest = &DATA[self.offset.min(DATA.len())..];
            let n = rest.len().min(buf.len());
            buf[..n].copy_from_slice(&rest[..n]);
            self.offset += n;
            Ok(n)
        }
    }

    struct MockMetadata;

    impl Metadata for MockMetadata {
        fn name(&self) -> &str {
            "test_data.txt"
        }

        fn len(&self) -> u64 {
            DATA.len() as u64
        }

        fn mode(&self) -> u32 {
            0o444
        }

        fn modified(&self) -> SystemTime {
            SystemTime::UNIX_EPOCH
        }

        fn is_dir(&self) -> bool {
            false
        }
    }

    impl Handle for MockFile {
        fn stat(&self) -> VfsResult<Box<dyn Metadata>> {
            if self.stat_fails {
                return Err(VfsError::Unsupported);
            }
            Ok(Box::new(MockMetadata))
        }
    }

    struct MockSeekableFile {
        file: MockFile,
        seek_calls: Arc<AtomicUsize>,
    }

    impl Read for MockSeekableFile {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.file.read(buf)
        }
    }

    impl Seek for MockSeekableFile {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            self.seek_calls.fetch_add(1, Ordering::SeqCst);
            if let SeekFrom::Start(offset) = pos {
                self.file.offset = offset as usize;
            }
            Ok(self.file.offset as u64)
        }
    }

    impl Handle for MockSeekableFile {
        fn stat(&self) -> VfsResult<Box<dyn Metadata>> {
            self.file.stat()
        }

        fn as_seek(&mut self) -> Option<&mut dyn Seek> {
            Some(self)
        }
    }

    #[test]
    fn test_modified_is_overridden() {
        let fsys = FixedModTimeFs::new(MockFs::new(), fixed_time());
        let handle = fsys.open("test_data.txt").unwrap();
        let meta = handle.stat().unwrap();
        assert_eq!(meta.modified(), fixed_time());
    }

    #[test]
    fn test_other_fields_are_forwarded() {
        let fsys = FixedModTimeFs::new(MockFs::new(), fixed_time());
        let handle = fsys.open("test_data.txt").unwrap();
        let meta = handle.stat().unwrap();
        assert_eq!(meta.name(), "test_data.txt");
        assert_eq!(meta.len(), 5);
        assert_eq!(meta.mode(), 0o444);
        assert!(!meta.is_dir());
        assert!(meta.sys().is_none());
    }

    #[test]
    fn test_reads_are_forwarded() {
        let fsys = FixedModTimeFs::new(MockFs::new(), fixed_time());
        let mut handle = fsys.open("test_data.txt").unwrap();
        let mut contents = String::new();
        handle.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "test\n");
    }

    #[test]
    fn test_open_failure_is_propagated() {
        let fsys = FixedModTimeFs::new(MockFs::new(), fixed_time());
        let err = match fsys.open("404") {
            Ok(_) => panic!("expected open to fail"),
            Err(e) => e,
        };
        assert!(matches!(err, VfsError::NotFound));
    }

    #[test]
    fn test_plain_handle_claims_no_seek() {
        let fsys = FixedModTimeFs::new(MockFs::new(), fixed_time());
        let mut handle = fsys.open("test_data.txt").unwrap();
        assert!(handle.as_seek().is_none());
    }

    #[test]
    fn test_seek_routes_to_underlying_handle() {
        let mock = MockFs::seekable();
        let calls = Arc::clone(&mock.seek_calls);
        let fsys = FixedModTimeFs::new(mock, fixed_time());

        let mut handle = fsys.open("test_data.txt").unwrap();
        let seek = handle.as_seek().expect("expected seekable handle");
        let pos = seek.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(pos, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stat_probe_failure_still_opens_file() {
        let fsys = FixedModTimeFs::new(
            MockFs {
                stat_fails: true,
                ..MockFs::new()
            },
            fixed_time(),
        );
        let mut handle = fsys.open("test_data.txt").unwrap();
        assert!(handle.as_dir().is_none());
        let mut contents = String::new();
        handle.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "test\n");

        // The handle opens, but stat still reports the inner failure.
        assert!(matches!(handle.stat(), Err(VfsError::Unsupported)));
    }

    #[test]
    fn test_rewrapping_outer_timestamp_wins() {
        let later = fixed_time() + Duration::from_secs(86_400);
        let inner = FixedModTimeFs::new(MockFs::new(), fixed_time());
        let outer = FixedModTimeFs::new(inner, later);

        let handle = outer.open("test_data.txt").unwrap();
        assert_eq!(handle.stat().unwrap().modified(), later);
    }

    #[test]
    fn test_wrapping_a_borrowed_filesystem() {
        let mock = MockFs::new();
        let fsys = FixedModTimeFs::new(&mock, fixed_time());
        let handle = fsys.open("test_data.txt").unwrap();
        assert_eq!(handle.stat().unwrap().modified(), fixed_time());
    }
}
