pub mod chunk;
pub mod config;
pub mod constants;
pub mod format;
pub mod key;
pub mod merger;
pub mod processor;
pub mod store;


pub use config::ExternalSortConfig;
pub use format::RecordFormat;
pub use key::{KeyExtractor, SequenceKey};
pub use processor::ExternalSortProcessor;
pub use store::{ChunkHandle, ChunkRetention};

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSortStats {
    pub total_records: usize,
    pub records_written: usize,
    pub chunks_created: usize,
    pub intermediate_passes: usize,
    pub intermediate_chunks: usize,
    pub chunks_removed: usize,
    /// Compressed size of the first-level chunks.
    pub chunk_bytes: u64,
    pub sort_time_ms: u64,
    pub merge_time_ms: u64,
    pub processing_time_ms: u64,
}

pub fn sort_fastq(
    input_file: &Path,
    output_file: &Path,
    config: ExternalSortConfig,
) -> Result<ExternalSortStats> {
    let processor = ExternalSortProcessor::new(config)?;
    processor.process(input_file, output_file)
}
