//! In-memory store of ingested images and their compression results

use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use crate::image::{self, CompressedImage};

/// Ingestion cap, applied per file. Oversized inputs are rejected without
/// failing the rest of the batch.
pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// One ingested image: the immutable original plus, once a batch has run,
/// its latest compression result.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    id: Uuid,
    name: String,
    original_bytes: Arc<[u8]>,
    original_dimensions: (u32, u32),
    // The compressed bytes, dimensions, and ratio live in one Option so
    // they can only ever be replaced together.
    compressed: Option<CompressedImage>,
}

impl ImageRecord {
    pub(crate) fn new(name: String, bytes: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            original_bytes: bytes.into(),
            original_dimensions: dimensions,
            compressed: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn original_bytes(&self) -> &Arc<[u8]> {
        &self.original_bytes
    }

    pub fn original_size(&self) -> usize {
        self.original_bytes.len()
    }

    pub fn original_dimensions(&self) -> (u32, u32) {
        self.original_dimensions
    }

    pub fn compressed(&self) -> Option<&CompressedImage> {
        self.compressed.as_ref()
    }

    /// True iff a compression result exists for the latest completed run.
    pub fn processed(&self) -> bool {
        self.compressed.is_some()
    }

    pub fn compression_ratio(&self) -> Option<f64> {
        self.compressed.as_ref().map(|c| c.ratio())
    }
}

/// Insertion-ordered id -> record store. Sole owner of record lifetime:
/// removing a record drops its original and compressed bytes.
#[derive(Debug, Default)]
pub struct Registry {
    records: Vec<ImageRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store one uploaded file. Rejects oversized or
    /// undecodable inputs; either rejection leaves the registry untouched.
    pub fn ingest(&mut self, name: &str, bytes: Vec<u8>) -> Result<Uuid> {
        if bytes.len() > MAX_FILE_SIZE {
            anyhow::bail!("{name} is too large ({} bytes, max 50 MiB)", bytes.len());
        }

        let dimensions = image::probe_dimensions(&bytes)
            .map_err(|e| anyhow::anyhow!("{name} is not a decodable image: {e}"))?;

        Ok(self.push(ImageRecord::new(name.to_string(), bytes, dimensions)))
    }

    pub(crate) fn push(&mut self, record: ImageRecord) -> Uuid {
        let id = record.id;
        log::debug!("registered {} ({id})", record.name);
        self.records.push(record);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<&ImageRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Remove one record, dropping its bytes. Returns false if absent.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        before != self.records.len()
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageRecord> {
        self.records.iter()
    }

    /// Records that currently hold a compression result, in insertion order.
    pub fn processed(&self) -> impl Iterator<Item = &ImageRecord> {
        self.records.iter().filter(|r| r.processed())
    }

    /// Attach a worker result to its record. A result whose record has been
    /// removed mid-flight is dropped with a warning; nothing observes it
    /// anymore.
    pub fn upsert_compressed(&mut self, id: Uuid, result: CompressedImage) -> bool {
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.compressed = Some(result);
                true
            }
            None => {
                log::warn!("dropping compression result for unknown record {id}");
                false
            }
        }
    }
}
