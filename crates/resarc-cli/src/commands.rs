//! Subcommand implementations

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use resarc_archive::{Archive, ArchiveOptions, HashKey};
use tracing::{info as log_info, warn};

use crate::config::{Command, Config};

/// Outcome of `verify`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Entries read successfully
    pub passed: usize,
    /// Hashes of entries that failed, with the reason
    pub failed: Vec<(HashKey, String)>,
}

impl VerifyReport {
    /// True when every entry read back
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

fn open(index: &Path, options: &ArchiveOptions) -> Result<Archive<'static>> {
    Archive::load_with_options(index, options)
        .with_context(|| format!("failed to open archive {}", index.display()))
}

/// Dispatch the configured subcommand
///
/// `verify` with failing entries is reported as an error after its report
/// has been written.
pub fn run(config: &Config, out: &mut impl Write) -> Result<()> {
    let options = config.archive_options();

    match &config.command {
        Command::Info { index } => info(index, &options, out),
        Command::List { index } => list(index, &options, out),
        Command::Extract {
            index,
            hash,
            output,
        } => match output {
            Some(path) => {
                let mut file = std::fs::File::create(path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                let written = extract(index, hash, &options, &mut file)?;
                log_info!("Wrote {written} bytes to {}", path.display());
                Ok(())
            }
            None => extract(index, hash, &options, out).map(|_| ()),
        },
        Command::Verify { index } => {
            let report = verify(index, &options, out)?;
            if !report.is_ok() {
                bail!(
                    "{} of {} entries failed verification",
                    report.failed.len(),
                    report.failed.len() + report.passed
                );
            }
            Ok(())
        }
    }
}

/// Print header fields and sizes
pub fn info(index: &Path, options: &ArchiveOptions, out: &mut impl Write) -> Result<()> {
    let archive = open(index, options)?;
    let header = archive.header();

    writeln!(out, "index:        {}", index.display())?;
    writeln!(
        out,
        "data:         {} ({} bytes)",
        options.data_path_for(index).display(),
        archive.data_len()
    )?;
    writeln!(out, "version:      {}", header.version)?;
    writeln!(out, "codec:        {}", archive.codec())?;
    writeln!(out, "entries:      {}", archive.entry_count())?;
    writeln!(out, "user data:    0x{:016X}", header.user_data)?;
    writeln!(out, "table md5:    {}", hex::encode(header.table_md5))?;

    let compressed = archive.entries().filter(|e| e.is_compressed()).count();
    let encrypted = archive.entries().filter(|e| e.is_encrypted()).count();
    let stored: u64 = archive
        .entries()
        .map(|e| u64::from(e.compressed_size))
        .sum();
    let expanded: u64 = archive
        .entries()
        .map(|e| u64::from(e.decompressed_size))
        .sum();
    writeln!(out, "compressed:   {compressed}")?;
    writeln!(out, "encrypted:    {encrypted}")?;
    writeln!(out, "stored size:  {stored}")?;
    writeln!(out, "full size:    {expanded}")?;

    Ok(())
}

/// Print one line per entry in hash order
pub fn list(index: &Path, options: &ArchiveOptions, out: &mut impl Write) -> Result<()> {
    let archive = open(index, options)?;

    for entry in archive.entries() {
        writeln!(
            out,
            "{} {:>12} {:>10} {:>10} {}",
            entry.hash,
            entry.data_offset,
            entry.compressed_size,
            entry.decompressed_size,
            entry.flags
        )?;
    }

    Ok(())
}

/// Write one entry's payload to `out`, returning its size
pub fn extract(
    index: &Path,
    hash: &str,
    options: &ArchiveOptions,
    out: &mut impl Write,
) -> Result<usize> {
    let key = HashKey::from_hex(hash).with_context(|| format!("invalid hash {hash:?}"))?;
    let archive = open(index, options)?;

    let Some(entry) = archive.find(&key) else {
        bail!("hash {key} not found in {}", index.display());
    };

    let payload = archive
        .read_to_vec(&entry)
        .with_context(|| format!("failed to read entry {key}"))?;
    out.write_all(&payload)?;
    out.flush()?;

    Ok(payload.len())
}

/// Read every entry and report the ones that fail
pub fn verify(index: &Path, options: &ArchiveOptions, out: &mut impl Write) -> Result<VerifyReport> {
    let archive = open(index, options)?;
    let mut report = VerifyReport::default();
    let mut buf = Vec::new();

    for entry in archive.entries() {
        buf.resize(entry.decompressed_size as usize, 0);
        match archive.read(entry, &mut buf) {
            Ok(_) => report.passed += 1,
            Err(e) => {
                warn!("Entry {} failed: {e}", entry.hash);
                writeln!(out, "FAILED {}: {e}", entry.hash)?;
                report.failed.push((entry.hash, e.to_string()));
            }
        }
    }

    writeln!(
        out,
        "verified {} entries: {} ok, {} failed",
        report.passed + report.failed.len(),
        report.passed,
        report.failed.len()
    )?;

    Ok(report)
}
