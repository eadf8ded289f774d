use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{Result, SortError};
use crate::external_sort::constants::*;
use crate::external_sort::store::ChunkRetention;
use crate::utils::{format_bytes, system};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalSortConfig {
    /// Records per in-memory batch; each batch becomes one chunk.
    pub max_records: usize,
    /// Staging directory for chunk files. `None` puts them beside the output.
    pub temp_directory: Option<PathBuf>,
    pub io_buffer_size_kb: usize,
    pub chunk_compression_level: u32,
    pub output_compression_level: u32,
    /// Most chunks merged at once; more than this triggers intermediate passes.
    pub max_open_chunks: usize,
    pub chunk_retention: ChunkRetention,
}

impl Default for ExternalSortConfig {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_MAX_RECORDS,
            temp_directory: None,
            io_buffer_size_kb: DEFAULT_IO_BUFFER_SIZE_KB,
            chunk_compression_level: DEFAULT_CHUNK_COMPRESSION_LEVEL,
            output_compression_level: DEFAULT_OUTPUT_COMPRESSION_LEVEL,
            max_open_chunks: DEFAULT_MAX_OPEN_CHUNKS,
            chunk_retention: ChunkRetention::Keep,
        }
    }
}

impl ExternalSortConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_records < MIN_MAX_RECORDS {
            return Err(SortError::InvalidConfig(format!(
                "max_records must be at least {}",
                MIN_MAX_RECORDS
            )));
        }

        if self.max_open_chunks < MIN_MAX_OPEN_CHUNKS {
            return Err(SortError::InvalidConfig(format!(
                "max_open_chunks must be at least {}",
                MIN_MAX_OPEN_CHUNKS
            )));
        }

        for (name, level) in [
            ("chunk_compression_level", self.chunk_compression_level),
            ("output_compression_level", self.output_compression_level),
        ] {
            if level > MAX_COMPRESSION_LEVEL {
                return Err(SortError::InvalidConfig(format!(
                    "{} must be between 0 and {}",
                    name, MAX_COMPRESSION_LEVEL
                )));
            }
        }

        if self.io_buffer_size_kb == 0 {
            return Err(SortError::InvalidConfig(
                "io_buffer_size_kb must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn io_buffer_size_bytes(&self) -> usize {
        self.io_buffer_size_kb * BYTES_PER_KB
    }

    pub fn estimated_batch_bytes(&self) -> u64 {
        system::estimated_batch_bytes(self.max_records, ESTIMATED_RECORD_SIZE_BYTES)
    }

    /// Warns when one batch probably won't fit in available memory. Advisory only:
    /// record sizes vary too much for this to be a hard limit.
    pub fn check_memory_budget(&self) -> bool {
        let needed = self.estimated_batch_bytes();
        let available = system::available_memory_bytes();
        if available > 0 && needed > available {
            warn!(
                "A batch of {} records needs roughly {}, but only {} is available; consider lowering max_records",
                self.max_records,
                format_bytes(needed),
                format_bytes(available)
            );
            return false;
        }
        true
    }
}
