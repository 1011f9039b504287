//! Read-only, content-addressed resource archives
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::return_self_not_must_use)] // Builder patterns
//! An archive is a pair of byte sources: an index (`.arci`) holding a header
//! and a table of entry records sorted by content hash, and a data blob
//! (`.arcd`) holding the concatenated payloads. Each payload is stored raw or
//! compressed with the single codec declared by the index.
//!
//! # Components
//!
//! - **[`HashKey`]**: fixed-length content hash with lexicographic ordering
//! - **[`EntryTable`]**: validated, sorted entry records with O(log n) lookup
//! - **[`ByteSource`]**: borrowed, owned or memory-mapped archive bytes
//! - **[`Archive`]**: the opened handle (`wrap`, `load_from_path`, `find`,
//!   `read`, `close`)
//!
//! # Untrusted input
//!
//! Every offset and size read from an index is validated when the archive
//! is opened and checked again when an entry is read. Decompression writes
//! into a destination bounded by the entry's declared size, so a malformed
//! payload cannot expand beyond what the index declares.
//!
//! # Example
//!
//! ```no_run
//! use resarc_archive::{Archive, HashKey};
//!
//! let archive = Archive::load_from_path("build/game.arci")?;
//! println!("{} entries", archive.entry_count());
//!
//! let hash = HashKey::from_data(b"file1_datafile1_datafile1_data");
//! match archive.find(&hash) {
//!     Some(entry) => {
//!         let payload = archive.read_to_vec(&entry)?;
//!         println!("read {} bytes", payload.len());
//!     }
//!     None => println!("not in archive"),
//! }
//! # Ok::<(), resarc_archive::ArchiveError>(())
//! ```

#![warn(missing_docs)]

mod archive;
mod cipher;
pub mod compression;
mod config;
mod error;
pub mod format;
mod hash;
mod source;
mod table;

pub use archive::Archive;
pub use cipher::{CipherError, PayloadCipher};
pub use config::{ArchiveOptions, DEFAULT_MAX_ENTRY_SIZE, LoadStrategy};
pub use error::{ArchiveError, ArchiveResult};
pub use format::{Codec, EntryFlags, IndexHeader};
pub use hash::{HASH_LENGTH, HashKey};
pub use source::ByteSource;
pub use table::{EntryMetadata, EntryTable};
