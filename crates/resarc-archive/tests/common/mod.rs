//! Test-only archive writer
//!
//! Produces index/data pairs in the on-disk layout so integration tests can
//! exercise the read path. Payloads that do not shrink under compression are
//! stored raw, as a real packer would.
#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use binrw::BinWriterExt;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use resarc_archive::format::{EntryRecord, IndexHeader, table_checksum};
use resarc_archive::{Codec, EntryFlags, HASH_LENGTH, HashKey};

/// Hash key built from a short name, zero padded to `HASH_LENGTH`
pub fn name_hash(name: &str) -> HashKey {
    let mut bytes = [0u8; HASH_LENGTH];
    let len = name.len().min(HASH_LENGTH);
    bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
    HashKey::from_bytes(bytes)
}

pub fn compress(codec: Codec, data: &[u8]) -> Vec<u8> {
    match codec {
        Codec::None => data.to_vec(),
        Codec::Lz4 => lz4_flex::block::compress(data),
        Codec::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
            encoder.write_all(data).expect("zlib write");
            encoder.finish().expect("zlib finish")
        }
    }
}

struct Item {
    hash: HashKey,
    payload: Vec<u8>,
    compress: bool,
    xor_key: Option<u8>,
}

pub struct FixtureBuilder {
    codec: Codec,
    items: Vec<Item>,
}

impl FixtureBuilder {
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            items: Vec::new(),
        }
    }

    pub fn raw(mut self, hash: HashKey, payload: &[u8]) -> Self {
        self.items.push(Item {
            hash,
            payload: payload.to_vec(),
            compress: false,
            xor_key: None,
        });
        self
    }

    pub fn compressed(mut self, hash: HashKey, payload: &[u8]) -> Self {
        self.items.push(Item {
            hash,
            payload: payload.to_vec(),
            compress: true,
            xor_key: None,
        });
        self
    }

    /// Store the payload XOR-ed with `key` and flag it encrypted
    pub fn encrypted(mut self, hash: HashKey, payload: &[u8], key: u8, compress: bool) -> Self {
        self.items.push(Item {
            hash,
            payload: payload.to_vec(),
            compress,
            xor_key: Some(key),
        });
        self
    }

    /// Encode to `(index, data)` buffers
    pub fn build(&self) -> (Vec<u8>, Vec<u8>) {
        let mut order: Vec<&Item> = self.items.iter().collect();
        order.sort_by(|a, b| a.hash.cmp(&b.hash));

        let mut data = Vec::new();
        let mut table = Cursor::new(Vec::new());

        for item in order {
            let mut flags = EntryFlags::empty();
            let mut stored = item.payload.clone();

            if item.compress && self.codec != Codec::None {
                let packed = compress(self.codec, &item.payload);
                if packed.len() < item.payload.len() {
                    stored = packed;
                    flags |= EntryFlags::COMPRESSED;
                }
            }

            if let Some(key) = item.xor_key {
                for byte in &mut stored {
                    *byte ^= key;
                }
                flags |= EntryFlags::ENCRYPTED;
            }

            let record = EntryRecord {
                hash: item.hash,
                data_offset: data.len() as u64,
                compressed_size: stored.len() as u32,
                decompressed_size: item.payload.len() as u32,
                flags: flags.bits(),
            };
            table.write_be(&record).expect("write record");
            data.extend_from_slice(&stored);
        }

        let table = table.into_inner();
        let header = IndexHeader::new(
            self.codec,
            self.items.len() as u32,
            table_checksum(&table),
        );

        let mut index = Cursor::new(Vec::new());
        index.write_be(&header).expect("write header");
        let mut index = index.into_inner();
        index.extend_from_slice(&table);

        (index, data)
    }

    /// Write `<stem>.arci` and `<stem>.arcd` into `dir`, returning the index path
    pub fn write_to(&self, dir: &Path, stem: &str) -> PathBuf {
        let (index, data) = self.build();
        let index_path = dir.join(format!("{stem}.arci"));
        std::fs::write(&index_path, index).expect("write index file");
        std::fs::write(dir.join(format!("{stem}.arcd")), data).expect("write data file");
        index_path
    }
}

/// Five named payloads: three stored raw, two compressed
pub const SCENARIO: [(&str, &[u8], bool); 5] = [
    ("awesome hash here2", b"file4_datafile4_datafile4_data", true),
    ("awesome hash here5", b"file1_datafile1_datafile1_data\0", false),
    ("awesome hash here3", b"file3_data\0", false),
    ("awesome hash here4", b"file2_datafile2_datafile2_data\0", true),
    ("awesome hash here1", b"stuff to test encryption\0", false),
];

pub const UNKNOWN_NAME: &str = "awesome hash NOThere";

pub fn scenario(codec: Codec) -> FixtureBuilder {
    SCENARIO
        .iter()
        .fold(FixtureBuilder::new(codec), |builder, (name, payload, compress)| {
            if *compress {
                builder.compressed(name_hash(name), payload)
            } else {
                builder.raw(name_hash(name), payload)
            }
        })
}
