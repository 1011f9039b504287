//! Archive handle: loading, lookup, reading and teardown
//!
//! An [`Archive`] bundles the parsed entry table with the index and data
//! byte sources. It is built either by wrapping caller buffers or by
//! loading an index file and its companion data file from disk; both paths
//! run the same validation.
//!
//! # Thread safety
//!
//! `find` and `read` take `&self` and touch no shared mutable state, so one
//! archive can serve many reader threads as long as each brings its own
//! destination buffer. `close` takes `&mut self`, which keeps it from
//! running while any reader still holds a reference.
//!
//! # Example
//!
//! ```no_run
//! use resarc_archive::{Archive, HashKey};
//!
//! let archive = Archive::load_from_path("assets/game.arci")?;
//! let hash = HashKey::from_hex("0a0a9f2a6772942557ab5355d76af442f8f65e01")?;
//!
//! if let Some(entry) = archive.find(&hash) {
//!     let mut buf = vec![0u8; entry.decompressed_size as usize];
//!     archive.read(&entry, &mut buf)?;
//! }
//! # Ok::<(), resarc_archive::ArchiveError>(())
//! ```

use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cipher::PayloadCipher;
use crate::compression::decompress_into;
use crate::config::ArchiveOptions;
use crate::error::{ArchiveError, ArchiveResult};
use crate::format::{Codec, IndexHeader};
use crate::hash::HashKey;
use crate::source::ByteSource;
use crate::table::{EntryMetadata, EntryTable};

struct Sources<'a> {
    index: ByteSource<'a>,
    data: ByteSource<'a>,
}

/// Which byte source is shorter than the index declares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Truncated {
    Index,
    Data,
}

/// An opened, read-only resource archive
pub struct Archive<'a> {
    header: IndexHeader,
    table: EntryTable,
    /// `None` once the archive is closed
    sources: Option<Sources<'a>>,
    cipher: Option<Arc<dyn PayloadCipher>>,
    max_entry_size: u32,
}

impl<'a> Archive<'a> {
    /// Wrap caller-owned index and data buffers without copying them
    pub fn wrap(index: &'a [u8], data: &'a [u8]) -> ArchiveResult<Self> {
        Self::wrap_with_options(index, data, &ArchiveOptions::default())
    }

    /// Wrap caller-owned buffers with explicit options
    pub fn wrap_with_options(
        index: &'a [u8],
        data: &'a [u8],
        options: &ArchiveOptions,
    ) -> ArchiveResult<Self> {
        options.validate()?;
        debug!(
            "Wrapping archive buffers: index {} bytes, data {} bytes",
            index.len(),
            data.len()
        );

        Self::from_sources(
            ByteSource::Borrowed(index),
            ByteSource::Borrowed(data),
            options,
            |source, required, actual| {
                let what = match source {
                    Truncated::Index => "index",
                    Truncated::Data => "data",
                };
                ArchiveError::invalid_format(format!(
                    "entries need {required} {what} bytes, buffer has {actual}"
                ))
            },
        )
    }

    /// Validate the index against the data source and assemble the handle
    fn from_sources(
        index: ByteSource<'a>,
        data: ByteSource<'a>,
        options: &ArchiveOptions,
        truncated: impl Fn(Truncated, u64, u64) -> ArchiveError,
    ) -> ArchiveResult<Self> {
        // A table that runs past the end of the index is truncation, not a
        // malformed header
        let declared = IndexHeader::parse(&index).inspect_err(|e| {
            warn!("Rejected archive index: {e}");
        })?;
        if let Some(range) = declared.table_range()
            && range.end > index.len()
        {
            warn!(
                "Archive index too short: need {} bytes, have {}",
                range.end,
                index.len()
            );
            return Err(truncated(
                Truncated::Index,
                range.end as u64,
                index.len() as u64,
            ));
        }

        // Per-entry ranges are checked below against the real data length so
        // that a short data source can be reported as truncation when loading
        let (header, table) =
            EntryTable::parse(&index, u64::MAX, options).inspect_err(|e| {
                warn!("Rejected archive index: {e}");
            })?;

        let required = table.required_data_len();
        let actual = data.len() as u64;
        if required > actual {
            warn!("Archive data source too short: need {required} bytes, have {actual}");
            return Err(truncated(Truncated::Data, required, actual));
        }

        Ok(Self {
            header,
            table,
            sources: Some(Sources { index, data }),
            cipher: options.cipher.clone(),
            max_entry_size: options.max_entry_size,
        })
    }

    /// Number of entries, 0 once closed
    pub fn entry_count(&self) -> u32 {
        self.table.len() as u32
    }

    /// Find the entry with exactly this hash
    ///
    /// A miss is a normal outcome and yields `None`. A closed archive finds
    /// nothing.
    pub fn find(&self, hash: &HashKey) -> Option<EntryMetadata> {
        self.table.find(hash).copied()
    }

    /// Iterate all entries in hash order
    pub fn entries(&self) -> impl Iterator<Item = &EntryMetadata> + '_ {
        self.table.iter()
    }

    /// Parsed index header
    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    /// Codec declared by the index
    pub fn codec(&self) -> Codec {
        self.header.codec()
    }

    /// Size of the data source in bytes, 0 once closed
    pub fn data_len(&self) -> u64 {
        self.sources.as_ref().map_or(0, |s| s.data.len() as u64)
    }

    /// Raw index bytes, `None` once closed
    pub fn index_bytes(&self) -> Option<&[u8]> {
        self.sources.as_ref().map(|s| s.index.as_slice())
    }

    /// Check whether the archive owns its byte sources
    pub fn is_owned(&self) -> bool {
        self.sources
            .as_ref()
            .is_some_and(|s| s.index.is_owned() && s.data.is_owned())
    }

    /// Check whether `close` has run
    pub fn is_closed(&self) -> bool {
        self.sources.is_none()
    }

    /// Read an entry's decompressed payload into `dest`
    ///
    /// `dest` must hold at least `entry.decompressed_size` bytes. Returns the
    /// number of bytes written. Failures affect only this call; the archive
    /// stays usable.
    pub fn read(&self, entry: &EntryMetadata, dest: &mut [u8]) -> ArchiveResult<usize> {
        let sources = self.sources.as_ref().ok_or(ArchiveError::Closed)?;
        self.check_entry_size(entry)?;

        let size = entry.decompressed_size as usize;
        if dest.len() < size {
            return Err(ArchiveError::DestinationTooSmall {
                required: size,
                actual: dest.len(),
            });
        }
        let dest = &mut dest[..size];

        let stored = Self::slice_payload(&sources.data, entry)?;

        if entry.is_encrypted() {
            let cipher = self
                .cipher
                .as_ref()
                .ok_or(ArchiveError::MissingCipher(entry.hash))?;

            // Scratch is bounded by the declared stored size
            let mut scratch = stored.to_vec();
            cipher
                .decrypt(&entry.hash, &mut scratch)
                .map_err(|e| ArchiveError::Decryption {
                    hash: entry.hash,
                    reason: e.to_string(),
                })?;
            self.decode(entry, &scratch, dest)?;
        } else {
            self.decode(entry, stored, dest)?;
        }

        Ok(size)
    }

    /// Read an entry into a freshly allocated buffer of its decompressed size
    ///
    /// The size cap and the stored range are checked before allocating.
    pub fn read_to_vec(&self, entry: &EntryMetadata) -> ArchiveResult<Vec<u8>> {
        let sources = self.sources.as_ref().ok_or(ArchiveError::Closed)?;
        self.check_entry_size(entry)?;
        Self::slice_payload(&sources.data, entry)?;

        let mut buf = vec![0u8; entry.decompressed_size as usize];
        self.read(entry, &mut buf)?;
        Ok(buf)
    }

    fn check_entry_size(&self, entry: &EntryMetadata) -> ArchiveResult<()> {
        if entry.decompressed_size > self.max_entry_size {
            return Err(ArchiveError::corrupt(format!(
                "entry {} declares {} bytes, limit is {}",
                entry.hash, entry.decompressed_size, self.max_entry_size
            )));
        }
        Ok(())
    }

    /// Bounds-checked view of an entry's stored bytes
    fn slice_payload<'s>(data: &'s [u8], entry: &EntryMetadata) -> ArchiveResult<&'s [u8]> {
        let start = usize::try_from(entry.data_offset).ok();
        let end = entry
            .data_end()
            .and_then(|end| usize::try_from(end).ok());

        match (start, end) {
            (Some(start), Some(end)) if end <= data.len() => Ok(&data[start..end]),
            _ => Err(ArchiveError::corrupt(format!(
                "entry {} range {}+{} exceeds data size {}",
                entry.hash,
                entry.data_offset,
                entry.compressed_size,
                data.len()
            ))),
        }
    }

    fn decode(&self, entry: &EntryMetadata, stored: &[u8], dest: &mut [u8]) -> ArchiveResult<()> {
        if entry.is_compressed() {
            return decompress_into(self.codec(), stored, dest);
        }

        if stored.len() != dest.len() {
            return Err(ArchiveError::corrupt(format!(
                "uncompressed entry {} stores {} bytes but declares {}",
                entry.hash,
                stored.len(),
                dest.len()
            )));
        }
        dest.copy_from_slice(stored);
        Ok(())
    }

    /// Release the byte sources and entry table
    ///
    /// Owned buffers and maps are freed; borrowed buffers are left alone.
    /// Calling `close` again is a no-op. After closing, `find` returns
    /// `None` and `read` fails with [`ArchiveError::Closed`].
    pub fn close(&mut self) {
        if let Some(sources) = self.sources.take() {
            debug!(
                "Closing archive: index {}, data {}",
                sources.index.kind(),
                sources.data.kind()
            );
            drop(sources);
        }
        self.table.clear();
    }
}

impl Archive<'static> {
    /// Load an index file and its companion data file from disk
    ///
    /// The data file has the same path with the `arcd` extension.
    pub fn load_from_path(index_path: impl AsRef<Path>) -> ArchiveResult<Self> {
        Self::load_with_options(index_path, &ArchiveOptions::default())
    }

    /// Load from disk with explicit options
    pub fn load_with_options(
        index_path: impl AsRef<Path>,
        options: &ArchiveOptions,
    ) -> ArchiveResult<Self> {
        options.validate()?;
        let index_path = index_path.as_ref();
        let data_path = options.data_path_for(index_path);

        debug!(
            "Loading archive {} with data {} ({:?})",
            index_path.display(),
            data_path.display(),
            options.load_strategy
        );

        let index = ByteSource::load(index_path, options.load_strategy)?;
        let data = ByteSource::load(&data_path, options.load_strategy)?;
        let index_len = index.len();
        let data_len = data.len();

        let archive = Self::from_sources(index, data, options, |source, required, actual| {
            let (path, what) = match source {
                Truncated::Index => (index_path, "index"),
                Truncated::Data => (data_path.as_path(), "data"),
            };
            ArchiveError::io(
                path,
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("{what} file truncated: need {required} bytes, found {actual}"),
                ),
            )
        })?;

        info!(
            "Loaded archive {}: {} entries, codec {}, index {} bytes, data {} bytes",
            index_path.display(),
            archive.entry_count(),
            archive.codec(),
            index_len,
            data_len
        );

        Ok(archive)
    }
}

impl std::fmt::Debug for Archive<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("entries", &self.table.len())
            .field("codec", &self.codec())
            .field("data_len", &self.data_len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
