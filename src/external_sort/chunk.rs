use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::Result;
use crate::external_sort::format::RecordFormat;
use crate::external_sort::key::KeyExtractor;
use crate::external_sort::store::{ChunkHandle, ChunkStore};

/// Result of the chunking phase.
#[derive(Debug, Default)]
pub struct ChunkSummary {
    /// Handles in creation order.
    pub chunks: Vec<ChunkHandle>,
    pub total_records: usize,
    pub sort_time: Duration,
    pub write_time: Duration,
}

/// Splits a record stream into sorted chunks of at most `max_records` each.
pub struct ChunkBuilder<'a, K, F> {
    max_records: usize,
    keys: &'a K,
    format: &'a F,
}

impl<'a, K, F> ChunkBuilder<'a, K, F>
where
    F: RecordFormat,
    K: KeyExtractor<F::Record>,
{
    pub fn new(max_records: usize, keys: &'a K, format: &'a F) -> Self {
        Self {
            max_records: max_records.max(1),
            keys,
            format,
        }
    }

    /// Drains `source` batch by batch. Only one batch is alive at a time: each is
    /// moved into [`ChunkBuilder::sort_and_write_chunk`] and dropped there before the
    /// next one is collected.
    pub fn build_chunks<I>(&self, mut source: I, store: &mut ChunkStore) -> Result<ChunkSummary>
    where
        I: Iterator<Item = Result<F::Record>>,
    {
        let mut summary = ChunkSummary::default();

        loop {
            let batch = source
                .by_ref()
                .take(self.max_records)
                .collect::<Result<Vec<_>>>()?;
            if batch.is_empty() {
                break;
            }

            let exhausted = batch.len() < self.max_records;
            summary.total_records += batch.len();

            let (handle, sort_time, write_time) = self.sort_and_write_chunk(batch, store)?;
            summary.sort_time += sort_time;
            summary.write_time += write_time;
            summary.chunks.push(handle);

            if exhausted {
                break;
            }
        }

        Ok(summary)
    }

    /// Stable-sorts one batch by key and persists it as the store's next chunk.
    pub fn sort_and_write_chunk(
        &self,
        mut records: Vec<F::Record>,
        store: &mut ChunkStore,
    ) -> Result<(ChunkHandle, Duration, Duration)> {
        let sort_start = Instant::now();
        // Stable: equal keys keep their input order, which the merge tie-break relies on.
        records.sort_by(|a, b| self.keys.sort_key(a).cmp(self.keys.sort_key(b)));
        let sort_time = sort_start.elapsed();

        let write_start = Instant::now();
        let mut writer = store.create_writer()?;
        for record in &records {
            self.format
                .write_record(writer.sink(), record)
                .map_err(|e| writer.write_error(e))?;
            writer.record_written();
        }
        drop(records);
        let handle = writer.finish()?;
        let write_time = write_start.elapsed();

        debug!(
            "Wrote chunk {} ({} records) to {} [sort {:?}, write {:?}]",
            handle.index,
            handle.record_count,
            handle.path.display(),
            sort_time,
            write_time
        );

        Ok((handle, sort_time, write_time))
    }
}
