// External Sort module - chunking, merging and the processor tying them together
pub mod external_sort;

// FASTQ record source and serializer
pub mod fastq;

pub mod constants;
pub mod error;
pub mod utils;

// Re-export main types for convenience
pub use error::{Result, SortError};
pub use external_sort::{sort_fastq, ExternalSortConfig, ExternalSortProcessor, ExternalSortStats};
pub use fastq::FastqRecord;
