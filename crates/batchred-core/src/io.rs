//! Serialization helpers for batch and proof files.
//!
//! JSON and CBOR read/write utilities with extension-based auto-detection.
//! Unknown/missing extensions are rejected for reads and default to JSON
//! for writes. Files are wrapped in a tiny [`Versioned`] envelope so a reader
//! can refuse payloads from a newer wire format.
//!
//! Batches and proofs are plain data, so slicing, proving and advancing can
//! run in different processes that exchange these files.

use crate::{Batch, BatchProof};
use anyhow::{anyhow, ensure, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Wire version of batch/proof files written by this crate.
pub const FILE_VERSION: u16 = 1;

/// Small versioned wrapper to tag payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// Wire version tag.
    pub ver: u16,
    /// Wrapped payload.
    pub payload: T,
}

impl<T> Versioned<T> {
    /// Construct a new versioned wrapper.
    #[inline]
    pub const fn new(ver: u16, payload: T) -> Self {
        Self { ver, payload }
    }
}

/// Ensure the parent directory for a file exists (no-op if none).
fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating parent directory {}", dir.display()))?;
        }
    }
    Ok(())
}

/* ------------------------------ generic JSON ------------------------------ */

/// Read any `T` from **JSON**.
pub fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path_ref = path.as_ref();
    let f = File::open(path_ref).with_context(|| format!("open {}", path_ref.display()))?;
    serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("deserialize JSON from {}", path_ref.display()))
}

/// Write any `T` to **JSON** (pretty).
pub fn write_json<T: Serialize, P: AsRef<Path>>(path: P, v: &T) -> Result<()> {
    let path_ref = path.as_ref();
    ensure_parent_dir(path_ref)?;
    let f = File::create(path_ref).with_context(|| format!("create {}", path_ref.display()))?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, v).context("serialize JSON")?;
    w.flush().context("flush JSON writer")?;
    Ok(())
}

/* ------------------------------ generic CBOR ------------------------------ */

/// Read any `T` from **CBOR**.
pub fn read_cbor<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path_ref = path.as_ref();
    let f = File::open(path_ref).with_context(|| format!("open {}", path_ref.display()))?;
    let mut rdr = BufReader::new(f);
    ciborium::de::from_reader(&mut rdr)
        .with_context(|| format!("deserialize CBOR from {}", path_ref.display()))
}

/// Write any `T` to **CBOR**.
pub fn write_cbor<T: Serialize, P: AsRef<Path>>(path: P, v: &T) -> Result<()> {
    let path_ref = path.as_ref();
    ensure_parent_dir(path_ref)?;
    let f = File::create(path_ref).with_context(|| format!("create {}", path_ref.display()))?;
    let mut w = BufWriter::new(f);
    ciborium::ser::into_writer(v, &mut w).context("serialize CBOR")?;
    w.flush().context("flush CBOR writer")?;
    Ok(())
}

/* ------------------------------ auto-detect ------------------------------- */

/// Auto-detect read by extension `.json` / `.cbor` (case-insensitive).
pub fn read_auto<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    match ext_lower(path.as_ref()).as_deref() {
        Some("json") => read_json(path),
        Some("cbor") => read_cbor(path),
        Some(other) => Err(anyhow!(
            "unsupported extension: {other} (supported: .json, .cbor)"
        )),
        None => Err(anyhow!("path has no extension (expected .json or .cbor)")),
    }
}

/// Auto-detect write (defaults to **JSON** if unknown or missing).
pub fn write_auto<T: Serialize, P: AsRef<Path>>(path: P, v: &T) -> Result<()> {
    match ext_lower(path.as_ref()).as_deref() {
        Some("cbor") => write_cbor(path, v),
        _ => write_json(path, v),
    }
}

fn read_versioned<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let v: Versioned<T> = read_auto(path)?;
    ensure!(
        v.ver <= FILE_VERSION,
        "{} has wire version {}, this build reads up to {FILE_VERSION}",
        path.display(),
        v.ver
    );
    Ok(v.payload)
}

/* -------------------------------- batches --------------------------------- */

/// Read a batch file written by [`write_batches_auto`].
pub fn read_batches_auto<P: AsRef<Path>>(path: P) -> Result<Vec<Batch>> {
    read_versioned(path.as_ref()).context("reading batches")
}

/// Write batches as a versioned JSON/CBOR file.
pub fn write_batches_auto<P: AsRef<Path>>(path: P, batches: &[Batch]) -> Result<()> {
    write_auto(path, &Versioned::new(FILE_VERSION, batches)).context("writing batches")
}

/* --------------------------------- proofs --------------------------------- */

/// Read a proof file written by [`write_proofs_auto`].
pub fn read_proofs_auto<P: AsRef<Path>>(path: P) -> Result<Vec<BatchProof>> {
    read_versioned(path.as_ref()).context("reading proofs")
}

/// Write proofs as a versioned JSON/CBOR file.
pub fn write_proofs_auto<P: AsRef<Path>>(path: P, proofs: &[BatchProof]) -> Result<()> {
    write_auto(path, &Versioned::new(FILE_VERSION, proofs)).context("writing proofs")
}

/// Return the lowercase extension (without dot) if present.
fn ext_lower(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}
