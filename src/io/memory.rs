use async_trait::async_trait;

use super::{ByteSink, RangeReader};
use crate::error::Result;

/// Range reader over an in-memory archive image.
#[derive(Debug, Default, Clone)]
pub struct MemoryReader {
    data: Vec<u8>,
}

impl MemoryReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

#[async_trait]
impl RangeReader for MemoryReader {
    async fn read_range(&mut self, offset: u64, length: u64) -> Result<Vec<u8>> {
        let len = self.data.len() as u64;
        let start = offset.min(len) as usize;
        let end = offset.saturating_add(length).min(len) as usize;
        Ok(self.data[start..end].to_vec())
    }
}

/// Sink that builds the archive in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    data: Vec<u8>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Take ownership of the finished archive bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

#[async_trait]
impl ByteSink for MemorySink {
    async fn append(&mut self, data: &[u8]) -> Result<()> {
        self.data.extend_from_slice(data);
        Ok(())
    }

    async fn write_at(&mut self, data: &[u8], offset: u64) -> Result<()> {
        let offset = offset as usize;
        if offset + data.len() > self.data.len() {
            self.data.resize(offset + data.len(), 0u8);
        }
        self.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }
}
