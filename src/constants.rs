pub const BYTES_PER_KB: usize = 1024;

/// Tracing target prefix of everything this crate logs.
pub const LOG_TARGET: &str = "fastq_sort";
pub const GZIP_EXTENSION: &str = "gz";
