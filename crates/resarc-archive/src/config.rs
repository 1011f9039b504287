//! Options controlling how archives are opened
//!
//! # Example
//!
//! ```
//! use resarc_archive::{ArchiveOptions, LoadStrategy};
//!
//! let options = ArchiveOptions::new()
//!     .with_load_strategy(LoadStrategy::Mmap)
//!     .with_max_entry_size(64 * 1024 * 1024);
//!
//! options.validate().expect("valid options");
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cipher::PayloadCipher;
use crate::error::{ArchiveError, ArchiveResult};
use crate::format::DATA_EXTENSION;

/// Maximum decompressed size accepted for a single entry (1 GiB)
pub const DEFAULT_MAX_ENTRY_SIZE: u32 = 1024 * 1024 * 1024;

/// How `load_from_path` brings file contents into memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadStrategy {
    /// Read both files into owned buffers
    #[default]
    Read,
    /// Memory-map both files
    ///
    /// The files must not be truncated or rewritten while the archive is
    /// open. Read-time bounds checks run against the length seen at load,
    /// so a file shrunk by another process can fault (`SIGBUS`) on access
    /// instead of returning an error. Use [`LoadStrategy::Read`] when other
    /// processes may modify the files.
    Mmap,
}

/// Archive opening options
#[derive(Clone)]
pub struct ArchiveOptions {
    /// How files are loaded from disk
    pub load_strategy: LoadStrategy,
    /// Verify the MD5 of the entry table against the header
    pub verify_checksum: bool,
    /// Largest decompressed size accepted for any entry
    pub max_entry_size: u32,
    /// Extension of the data file that accompanies an index
    pub data_extension: String,
    /// Cipher for entries flagged `ENCRYPTED`
    pub cipher: Option<Arc<dyn PayloadCipher>>,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            load_strategy: LoadStrategy::Read,
            verify_checksum: true,
            max_entry_size: DEFAULT_MAX_ENTRY_SIZE,
            data_extension: DATA_EXTENSION.to_string(),
            cipher: None,
        }
    }
}

impl fmt::Debug for ArchiveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveOptions")
            .field("load_strategy", &self.load_strategy)
            .field("verify_checksum", &self.verify_checksum)
            .field("max_entry_size", &self.max_entry_size)
            .field("data_extension", &self.data_extension)
            .field("cipher", &self.cipher.is_some())
            .finish()
    }
}

impl ArchiveOptions {
    /// Create options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set load strategy
    pub fn with_load_strategy(mut self, strategy: LoadStrategy) -> Self {
        self.load_strategy = strategy;
        self
    }

    /// Enable or disable entry table checksum verification
    pub fn with_checksum_verification(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    /// Set the per-entry decompressed size limit
    pub fn with_max_entry_size(mut self, max_entry_size: u32) -> Self {
        self.max_entry_size = max_entry_size;
        self
    }

    /// Set the data file extension
    pub fn with_data_extension(mut self, extension: impl Into<String>) -> Self {
        self.data_extension = extension.into();
        self
    }

    /// Set the cipher used for encrypted entries
    pub fn with_cipher(mut self, cipher: Arc<dyn PayloadCipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// Validate the options
    pub fn validate(&self) -> ArchiveResult<()> {
        if self.max_entry_size == 0 {
            return Err(ArchiveError::InvalidOptions(
                "max_entry_size must be greater than 0".to_string(),
            ));
        }

        let extension = self.data_extension.trim_start_matches('.');
        if extension.is_empty() {
            return Err(ArchiveError::InvalidOptions(
                "data_extension must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Path of the data file paired with `index_path`
    ///
    /// The index extension is replaced by `data_extension`, so
    /// `assets/game.arci` pairs with `assets/game.arcd`.
    pub fn data_path_for(&self, index_path: &Path) -> PathBuf {
        index_path.with_extension(self.data_extension.trim_start_matches('.'))
    }
}
