pub use crate::constants::BYTES_PER_KB;

/// Records held in memory per chunk before it is sorted and spilled.
pub const DEFAULT_MAX_RECORDS: usize = 5_000_000;
pub const DEFAULT_IO_BUFFER_SIZE_KB: usize = 64;
pub const DEFAULT_CHUNK_COMPRESSION_LEVEL: u32 = 1;
pub const DEFAULT_OUTPUT_COMPRESSION_LEVEL: u32 = 1;
pub const DEFAULT_MAX_OPEN_CHUNKS: usize = 256;

pub const MIN_MAX_RECORDS: usize = 1;
pub const MIN_MAX_OPEN_CHUNKS: usize = 2;
pub const MAX_COMPRESSION_LEVEL: u32 = 9;

/// Rough in-memory footprint of one short-read FASTQ record, for the advisory memory check.
pub const ESTIMATED_RECORD_SIZE_BYTES: usize = 400;
