use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::error::{Result, SortError};
use crate::external_sort::chunk::ChunkBuilder;
use crate::external_sort::format::RecordFormat;
use crate::external_sort::key::{KeyExtractor, SequenceKey};
use crate::external_sort::merger::ChunkMerger;
use crate::external_sort::store::{ChunkLayout, ChunkStore};
use crate::external_sort::{ExternalSortConfig, ExternalSortStats};
use crate::fastq::{open_fastq, FastqFormat};
use crate::utils::format_bytes;
use crate::utils::io::{ensure_parent_dir, total_file_size, OutputWriter};

/// Runs the two phases of the sort back to back: every chunk is finished before
/// the merge opens any of them.
pub struct ExternalSortProcessor {
    config: ExternalSortConfig,
}

impl ExternalSortProcessor {
    pub fn new(config: ExternalSortConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExternalSortConfig {
        &self.config
    }

    /// Sorts a FASTQ file (plain or compressed) by read sequence into `output_file`.
    pub fn process(&self, input_file: &Path, output_file: &Path) -> Result<ExternalSortStats> {
        info!("Sorting {} into {}", input_file.display(), output_file.display());
        let layout = ChunkLayout::new(output_file, self.config.temp_directory.as_deref());
        if layout.would_overwrite(input_file) {
            return Err(SortError::InvalidConfig(format!(
                "input {} would be overwritten by chunk files named after {}; choose another output name or temp directory",
                input_file.display(),
                output_file.display()
            )));
        }

        let source = open_fastq(input_file, self.config.io_buffer_size_bytes())?;
        self.sort_records(source, &SequenceKey, &FastqFormat, output_file)
    }

    /// Sorts any record stream. The output file is only created once all chunks
    /// have been written, so a failure while chunking leaves no output behind.
    pub fn sort_records<I, K, F>(
        &self,
        source: I,
        keys: &K,
        format: &F,
        output_file: &Path,
    ) -> Result<ExternalSortStats>
    where
        I: Iterator<Item = Result<F::Record>>,
        F: RecordFormat,
        K: KeyExtractor<F::Record>,
    {
        let start_time = Instant::now();
        let mut stats = ExternalSortStats::default();

        self.config.check_memory_budget();

        let layout = ChunkLayout::new(output_file, self.config.temp_directory.as_deref());
        if !layout.directory().as_os_str().is_empty() {
            std::fs::create_dir_all(layout.directory()).map_err(|source| SortError::ChunkWrite {
                index: 0,
                path: layout.directory().to_path_buf(),
                source,
            })?;
        }
        debug!("Chunk directory: {}", layout.directory().display());

        let mut store = ChunkStore::new(
            layout,
            self.config.io_buffer_size_bytes(),
            self.config.chunk_compression_level,
            self.config.chunk_retention,
        );

        info!("Phase 1: building sorted chunks of up to {} records", self.config.max_records);
        let chunking = ChunkBuilder::new(self.config.max_records, keys, format)
            .build_chunks(source, &mut store)?;

        stats.total_records = chunking.total_records;
        stats.chunks_created = chunking.chunks.len();
        stats.sort_time_ms = chunking.sort_time.as_millis() as u64;
        stats.chunk_bytes = total_file_size(chunking.chunks.iter().map(|c| c.path.as_path()));
        info!(
            "Created {} chunks from {} records ({})",
            stats.chunks_created,
            stats.total_records,
            format_bytes(stats.chunk_bytes)
        );

        info!("Phase 2: merging {} chunks", stats.chunks_created);
        let merge_start = Instant::now();

        ensure_parent_dir(output_file).map_err(|source| output_error(output_file, source))?;
        let mut output = OutputWriter::create(
            output_file,
            self.config.output_compression_level,
            self.config.io_buffer_size_bytes(),
        )
        .map_err(|source| output_error(output_file, source))?;
        debug!("Output gzip-compressed: {}", output.is_compressed());

        let merge = ChunkMerger::new(self.config.max_open_chunks, keys, format).merge_chunks(
            chunking.chunks,
            &mut store,
            |record| {
                format
                    .write_record(&mut output, record)
                    .map_err(|source| output_error(output_file, source))
            },
        )?;
        output
            .finish()
            .map_err(|source| output_error(output_file, source))?;

        stats.records_written = merge.records_written;
        stats.intermediate_passes = merge.intermediate_passes;
        stats.intermediate_chunks = merge.intermediate_chunks;
        stats.merge_time_ms = merge_start.elapsed().as_millis() as u64;

        stats.chunks_removed = store.release(&merge.consumed_chunks)?;
        stats.processing_time_ms = start_time.elapsed().as_millis() as u64;

        info!(
            "Wrote {} records to {} in {} ms",
            stats.records_written,
            output_file.display(),
            stats.processing_time_ms
        );

        Ok(stats)
    }
}

fn output_error(path: &Path, source: std::io::Error) -> SortError {
    SortError::Output {
        path: path.to_path_buf(),
        source,
    }
}
