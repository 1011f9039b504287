//! Byte sources backing an archive
//!
//! A source is either borrowed from the caller (wrap mode) or owned by the
//! archive (load mode). Owned sources are freed when the source is dropped;
//! borrowed ones are never touched.

use std::fs::File;
use std::ops::Deref;
use std::path::Path;

use memmap2::{Mmap, MmapOptions};

use crate::config::LoadStrategy;
use crate::error::{ArchiveError, ArchiveResult};

/// Ownership-tagged view over archive bytes
pub enum ByteSource<'a> {
    /// Caller-owned buffer that must outlive the archive
    Borrowed(&'a [u8]),
    /// Buffer read from disk and owned by the archive
    Owned(Vec<u8>),
    /// Memory-mapped file owned by the archive
    Mapped(Mmap),
}

impl ByteSource<'static> {
    /// Load a whole file using `strategy`
    pub fn load(path: &Path, strategy: LoadStrategy) -> ArchiveResult<Self> {
        match strategy {
            LoadStrategy::Read => std::fs::read(path)
                .map(Self::Owned)
                .map_err(|e| ArchiveError::io(path, e)),
            LoadStrategy::Mmap => Self::map(path),
        }
    }

    fn map(path: &Path) -> ArchiveResult<Self> {
        let file = File::open(path).map_err(|e| ArchiveError::io(path, e))?;
        let len = file
            .metadata()
            .map_err(|e| ArchiveError::io(path, e))?
            .len();

        // Zero-length maps are rejected on some platforms
        if len == 0 {
            return Ok(Self::Owned(Vec::new()));
        }

        #[allow(unsafe_code)]
        let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(|e| ArchiveError::io(path, e))?;
        Ok(Self::Mapped(mmap))
    }
}

impl ByteSource<'_> {
    /// Bytes of this source
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Self::Borrowed(bytes) => bytes,
            Self::Owned(bytes) => bytes.as_slice(),
            Self::Mapped(mmap) => &mmap[..],
        }
    }

    /// Check whether dropping this source frees memory
    pub const fn is_owned(&self) -> bool {
        !matches!(self, Self::Borrowed(_))
    }

    /// Short label for logging
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Borrowed(_) => "borrowed",
            Self::Owned(_) => "owned",
            Self::Mapped(_) => "mapped",
        }
    }
}

impl Deref for ByteSource<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl std::fmt::Debug for ByteSource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ByteSource::{}({} bytes)", self.kind(), self.len())
    }
}
