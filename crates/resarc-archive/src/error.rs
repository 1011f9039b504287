//! Error types for archive operations

use std::path::PathBuf;

use thiserror::Error;

use crate::hash::HashKey;

/// Archive operation result type
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors produced while loading, querying or reading an archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Index or data file missing, unreadable or truncated
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Structurally malformed index
    #[error("Invalid archive format: {reason}")]
    InvalidFormat {
        /// Detailed description of the violation
        reason: String,
    },

    /// Entry range or size mismatch found while reading
    #[error("Corrupt archive: {reason}")]
    CorruptArchive {
        /// Detailed description of the mismatch
        reason: String,
    },

    /// Payload failed to decompress or produced the wrong length
    #[error("Decompression failed: {reason}")]
    Decompression {
        /// Codec diagnostic
        reason: String,
    },

    /// Destination buffer smaller than the entry's decompressed size
    #[error("Destination buffer too small: need {required} bytes, got {actual}")]
    DestinationTooSmall {
        /// Bytes the entry decompresses to
        required: usize,
        /// Bytes available in the destination
        actual: usize,
    },

    /// Entry is encrypted and no cipher was configured
    #[error("Entry {0} is encrypted but no cipher is configured")]
    MissingCipher(HashKey),

    /// Configured cipher rejected the payload
    #[error("Decryption of entry {hash} failed: {reason}")]
    Decryption {
        /// Entry being decrypted
        hash: HashKey,
        /// Cipher diagnostic
        reason: String,
    },

    /// Handle was used after `close`
    #[error("Archive is closed")]
    Closed,

    /// Hash key could not be built from the given input
    #[error("Invalid hash key: {0}")]
    InvalidHash(String),

    /// Options failed validation
    #[error("Invalid archive options: {0}")]
    InvalidOptions(String),
}

impl ArchiveError {
    pub(crate) fn invalid_format(reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptArchive {
            reason: reason.into(),
        }
    }

    pub(crate) fn decompression(reason: impl Into<String>) -> Self {
        Self::Decompression {
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if this error aborts a load attempt (no handle was produced)
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::InvalidFormat { .. } | Self::InvalidOptions(_)
        )
    }

    /// Check if this error only affects a single read
    ///
    /// The handle stays usable for other entries after any of these.
    pub fn is_read_error(&self) -> bool {
        matches!(
            self,
            Self::CorruptArchive { .. }
                | Self::Decompression { .. }
                | Self::DestinationTooSmall { .. }
                | Self::MissingCipher(_)
                | Self::Decryption { .. }
        )
    }

    /// Check if this error reports damaged archive contents
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidFormat { .. } | Self::CorruptArchive { .. } | Self::Decompression { .. }
        )
    }
}

impl From<binrw::Error> for ArchiveError {
    fn from(err: binrw::Error) -> Self {
        Self::invalid_format(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let io = ArchiveError::io(
            "missing.arci",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(io.is_load_error());
        assert!(!io.is_read_error());

        let corrupt = ArchiveError::corrupt("range past end");
        assert!(corrupt.is_read_error());
        assert!(corrupt.is_validation_error());
        assert!(!corrupt.is_load_error());

        assert!(!ArchiveError::Closed.is_read_error());
        assert!(!ArchiveError::Closed.is_load_error());
    }

    #[test]
    fn test_io_error_mentions_path() {
        let err = ArchiveError::io(
            "data/game.arcd",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.to_string().contains("data/game.arcd"));
    }
}
