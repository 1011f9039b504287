//! Sorted entry table and hash lookup

use std::cmp::Ordering;
use std::io::Cursor;

use binrw::BinRead;
use tracing::warn;

use crate::config::ArchiveOptions;
use crate::error::{ArchiveError, ArchiveResult};
use crate::format::{Codec, EntryFlags, EntryRecord, IndexHeader, table_checksum};
use crate::hash::HashKey;

/// Location and size of one archive entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryMetadata {
    /// Content hash
    pub hash: HashKey,
    /// Offset of the payload in the data source
    pub data_offset: u64,
    /// Stored payload size
    pub compressed_size: u32,
    /// Size after decompression
    pub decompressed_size: u32,
    /// Entry flags
    pub flags: EntryFlags,
}

impl EntryMetadata {
    /// Check whether the payload is compressed
    pub const fn is_compressed(&self) -> bool {
        self.flags.is_compressed()
    }

    /// Check whether the payload is encrypted
    pub const fn is_encrypted(&self) -> bool {
        self.flags.is_encrypted()
    }

    /// End of the payload in the data source, or `None` on overflow
    pub fn data_end(&self) -> Option<u64> {
        self.data_offset.checked_add(u64::from(self.compressed_size))
    }

    fn from_record(record: EntryRecord) -> ArchiveResult<Self> {
        let flags = EntryFlags::from_bits(record.flags).ok_or_else(|| {
            ArchiveError::invalid_format(format!(
                "entry {} has unknown flags 0x{:08X}",
                record.hash, record.flags
            ))
        })?;

        Ok(Self {
            hash: record.hash,
            data_offset: record.data_offset,
            compressed_size: record.compressed_size,
            decompressed_size: record.decompressed_size,
            flags,
        })
    }

    /// Check the size invariants of a single entry against the data length
    fn validate(&self, codec: Codec, data_len: u64, max_entry_size: u32) -> ArchiveResult<()> {
        if self.is_compressed() {
            if codec == Codec::None {
                return Err(ArchiveError::invalid_format(format!(
                    "entry {} is compressed but the archive declares no codec",
                    self.hash
                )));
            }
            if self.compressed_size > self.decompressed_size {
                return Err(ArchiveError::invalid_format(format!(
                    "entry {} compressed size {} exceeds decompressed size {}",
                    self.hash, self.compressed_size, self.decompressed_size
                )));
            }
        } else if self.compressed_size != self.decompressed_size {
            return Err(ArchiveError::invalid_format(format!(
                "uncompressed entry {} has sizes {} != {}",
                self.hash, self.compressed_size, self.decompressed_size
            )));
        }

        if self.decompressed_size > max_entry_size {
            return Err(ArchiveError::invalid_format(format!(
                "entry {} declares {} bytes, limit is {}",
                self.hash, self.decompressed_size, max_entry_size
            )));
        }

        match self.data_end() {
            Some(end) if end <= data_len => Ok(()),
            _ => Err(ArchiveError::invalid_format(format!(
                "entry {} range {}+{} exceeds data size {}",
                self.hash, self.data_offset, self.compressed_size, data_len
            ))),
        }
    }
}

/// Entries sorted strictly ascending by hash
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryTable {
    entries: Vec<EntryMetadata>,
}

impl EntryTable {
    /// Parse and validate the index header and entry table
    ///
    /// `data_len` is the size of the data source every entry range is
    /// checked against.
    pub fn parse(
        index: &[u8],
        data_len: u64,
        options: &ArchiveOptions,
    ) -> ArchiveResult<(IndexHeader, Self)> {
        let header = IndexHeader::parse(index)?;

        let range = header
            .table_range()
            .filter(|range| range.end <= index.len())
            .ok_or_else(|| {
                ArchiveError::invalid_format(format!(
                    "{} entries at offset {} do not fit in {} index bytes",
                    header.entry_count,
                    header.entries_offset,
                    index.len()
                ))
            })?;
        let table_bytes = &index[range];

        if options.verify_checksum {
            let actual = table_checksum(table_bytes);
            if actual != header.table_md5 {
                warn!(
                    "Entry table checksum mismatch: expected {}, got {}",
                    hex::encode(header.table_md5),
                    hex::encode(actual)
                );
                return Err(ArchiveError::invalid_format(format!(
                    "entry table checksum mismatch: expected {}, got {}",
                    hex::encode(header.table_md5),
                    hex::encode(actual)
                )));
            }
        }

        let codec = header.codec();
        let mut entries: Vec<EntryMetadata> = Vec::with_capacity(header.entry_count as usize);
        let mut cursor = Cursor::new(table_bytes);

        for i in 0..header.entry_count {
            let record = EntryRecord::read(&mut cursor)?;
            let entry = EntryMetadata::from_record(record)?;
            entry.validate(codec, data_len, options.max_entry_size)?;

            if let Some(prev) = entries.last() {
                match HashKey::compare(&prev.hash, &entry.hash) {
                    Ordering::Less => {}
                    Ordering::Equal => {
                        return Err(ArchiveError::invalid_format(format!(
                            "duplicate hash {} at entry {i}",
                            entry.hash
                        )));
                    }
                    Ordering::Greater => {
                        return Err(ArchiveError::invalid_format(format!(
                            "entry {i} ({}) is out of order",
                            entry.hash
                        )));
                    }
                }
            }

            entries.push(entry);
        }

        Ok((header, Self { entries }))
    }

    /// Find the entry with exactly this hash
    pub fn find(&self, hash: &HashKey) -> Option<&EntryMetadata> {
        self.entries
            .binary_search_by(|entry| HashKey::compare(&entry.hash, hash))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at position `index` in hash order
    pub fn get(&self, index: usize) -> Option<&EntryMetadata> {
        self.entries.get(index)
    }

    /// Iterate entries in hash order
    pub fn iter(&self) -> std::slice::Iter<'_, EntryMetadata> {
        self.entries.iter()
    }

    /// Smallest data source length that holds every entry
    pub fn required_data_len(&self) -> u64 {
        self.entries
            .iter()
            .filter_map(EntryMetadata::data_end)
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn clear(&mut self) {
        self.entries = Vec::new();
    }
}

impl<'a> IntoIterator for &'a EntryTable {
    type Item = &'a EntryMetadata;
    type IntoIter = std::slice::Iter<'a, EntryMetadata>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::format::INDEX_HEADER_SIZE;
    use binrw::BinWriterExt;
    use proptest::prelude::*;

    fn record(hash: HashKey, offset: u64, size: u32) -> EntryRecord {
        EntryRecord {
            hash,
            data_offset: offset,
            compressed_size: size,
            decompressed_size: size,
            flags: 0,
        }
    }

    fn encode_index(codec: Codec, records: &[EntryRecord]) -> Vec<u8> {
        let mut table = Cursor::new(Vec::new());
        for record in records {
            table.write_be(record).expect("write record");
        }
        let table = table.into_inner();

        let header = IndexHeader::new(codec, records.len() as u32, table_checksum(&table));
        let mut out = Cursor::new(Vec::new());
        out.write_be(&header).expect("write header");
        let mut out = out.into_inner();
        out.extend_from_slice(&table);
        out
    }

    fn sorted_keys(n: u8) -> Vec<HashKey> {
        let mut keys: Vec<HashKey> = (0..n).map(|i| HashKey::from_data(&[i])).collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_parse_and_find() {
        let keys = sorted_keys(4);
        let records: Vec<_> = keys
            .iter()
            .enumerate()
            .map(|(i, k)| record(*k, i as u64 * 10, 10))
            .collect();
        let index = encode_index(Codec::None, &records);

        let (header, table) =
            EntryTable::parse(&index, 40, &ArchiveOptions::default()).expect("valid index");
        assert_eq!(header.entry_count, 4);
        assert_eq!(table.len(), 4);
        assert_eq!(table.required_data_len(), 40);

        for (i, key) in keys.iter().enumerate() {
            let entry = table.find(key).expect("present");
            assert_eq!(entry.data_offset, i as u64 * 10);
        }
        assert!(table.find(&HashKey::from_data(b"absent")).is_none());
    }

    #[test]
    fn test_empty_table() {
        let index = encode_index(Codec::Lz4, &[]);
        let (_, table) =
            EntryTable::parse(&index, 0, &ArchiveOptions::default()).expect("valid index");
        assert!(table.is_empty());
        assert!(table.find(&HashKey::from_bytes([0u8; 20])).is_none());
    }

    #[test]
    fn test_duplicate_hash_rejected() {
        let key = HashKey::from_data(b"dup");
        let index = encode_index(Codec::None, &[record(key, 0, 1), record(key, 1, 1)]);
        let err = EntryTable::parse(&index, 2, &ArchiveOptions::default()).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_unsorted_rejected() {
        let keys = sorted_keys(2);
        let index = encode_index(
            Codec::None,
            &[record(keys[1], 0, 1), record(keys[0], 1, 1)],
        );
        let err = EntryTable::parse(&index, 2, &ArchiveOptions::default()).unwrap_err();
        assert!(err.to_string().contains("out of order"));
    }

    #[test]
    fn test_count_past_end_rejected() {
        let keys = sorted_keys(2);
        let mut index = encode_index(Codec::None, &[record(keys[0], 0, 1), record(keys[1], 1, 1)]);
        // Claim a third record that is not there
        index[12..16].copy_from_slice(&3u32.to_be_bytes());
        let err = EntryTable::parse(&index, 2, &ArchiveOptions::default()).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidFormat { .. }));
    }

    #[test]
    fn test_huge_count_rejected_without_allocation() {
        let mut index = encode_index(Codec::None, &[]);
        index[12..16].copy_from_slice(&u32::MAX.to_be_bytes());
        let options = ArchiveOptions::default().with_checksum_verification(false);
        assert!(EntryTable::parse(&index, 0, &options).is_err());
    }

    #[test]
    fn test_range_past_data_rejected() {
        let key = HashKey::from_data(b"a");
        let index = encode_index(Codec::None, &[record(key, 5, 10)]);
        let err = EntryTable::parse(&index, 14, &ArchiveOptions::default()).unwrap_err();
        assert!(err.to_string().contains("exceeds data size"));

        let index = encode_index(Codec::None, &[record(key, u64::MAX, 10)]);
        assert!(EntryTable::parse(&index, u64::MAX, &ArchiveOptions::default()).is_err());
    }

    #[test]
    fn test_size_invariants() {
        let key = HashKey::from_data(b"a");

        let mut raw = record(key, 0, 4);
        raw.decompressed_size = 8;
        let index = encode_index(Codec::Lz4, &[raw]);
        assert!(EntryTable::parse(&index, 4, &ArchiveOptions::default()).is_err());

        let mut grown = record(key, 0, 8);
        grown.decompressed_size = 4;
        grown.flags = EntryFlags::COMPRESSED.bits();
        let index = encode_index(Codec::Lz4, &[grown]);
        assert!(EntryTable::parse(&index, 8, &ArchiveOptions::default()).is_err());

        let mut no_codec = record(key, 0, 4);
        no_codec.decompressed_size = 8;
        no_codec.flags = EntryFlags::COMPRESSED.bits();
        let index = encode_index(Codec::None, &[no_codec]);
        assert!(EntryTable::parse(&index, 4, &ArchiveOptions::default()).is_err());

        let mut unknown = record(key, 0, 4);
        unknown.flags = 0x80;
        let index = encode_index(Codec::None, &[unknown]);
        assert!(EntryTable::parse(&index, 4, &ArchiveOptions::default()).is_err());
    }

    #[test]
    fn test_max_entry_size() {
        let key = HashKey::from_data(b"a");
        let index = encode_index(Codec::None, &[record(key, 0, 64)]);
        let options = ArchiveOptions::default().with_max_entry_size(32);
        assert!(EntryTable::parse(&index, 64, &options).is_err());
    }

    #[test]
    fn test_checksum_mismatch() {
        let keys = sorted_keys(1);
        let mut index = encode_index(Codec::None, &[record(keys[0], 0, 1)]);
        let last = index.len() - 1;
        index[last] ^= 0x01; // flip a flag bit inside the table

        let err = EntryTable::parse(&index, 1, &ArchiveOptions::default()).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_entries_offset_honoured() {
        let keys = sorted_keys(1);
        let index = encode_index(Codec::None, &[record(keys[0], 0, 3)]);

        // Move the table 8 bytes further and point the header at it
        let mut shifted = index[..INDEX_HEADER_SIZE].to_vec();
        shifted.extend_from_slice(&[0u8; 8]);
        shifted.extend_from_slice(&index[INDEX_HEADER_SIZE..]);
        shifted[16..20].copy_from_slice(&(INDEX_HEADER_SIZE as u32 + 8).to_be_bytes());

        let (_, table) =
            EntryTable::parse(&shifted, 3, &ArchiveOptions::default()).expect("valid index");
        assert!(table.find(&keys[0]).is_some());
    }

    proptest! {
        #[test]
        fn find_hits_every_key_and_misses_others(
            seeds in proptest::collection::btree_set(any::<u32>(), 1..64),
            probe in any::<u32>(),
        ) {
            let mut keys: Vec<HashKey> = seeds
                .iter()
                .map(|s| HashKey::from_data(&s.to_be_bytes()))
                .collect();
            keys.sort();
            keys.dedup();

            let records: Vec<_> = keys.iter().map(|k| record(*k, 0, 0)).collect();
            let index = encode_index(Codec::None, &records);
            let (_, table) = EntryTable::parse(&index, 0, &ArchiveOptions::default())
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            prop_assert_eq!(table.len(), keys.len());
            for key in &keys {
                prop_assert_eq!(table.find(key).map(|e| e.hash), Some(*key));
            }

            let probe = HashKey::from_data(&probe.to_be_bytes());
            prop_assert_eq!(table.find(&probe).is_some(), keys.contains(&probe));
            prop_assert!(table.find(&HashKey::from_bytes([0u8; 20])).is_none());
            prop_assert!(table.find(&HashKey::from_bytes([0xFF; 20])).is_none());
        }
    }
}
