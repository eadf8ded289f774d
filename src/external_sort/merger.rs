use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::{Result, SortError};
use crate::external_sort::format::{RecordFormat, RecordIter};
use crate::external_sort::key::KeyExtractor;
use crate::external_sort::store::{ChunkHandle, ChunkStore};

/// Result of the merge phase.
#[derive(Debug, Default)]
pub struct MergeSummary {
    pub records_written: usize,
    /// Intermediate passes run before the final merge; zero for a flat merge.
    pub intermediate_passes: usize,
    /// Chunks written by intermediate passes.
    pub intermediate_chunks: usize,
    /// Every chunk read by any pass, intermediates included, in the order they
    /// were consumed. None of them are released by the merger itself.
    pub consumed_chunks: Vec<ChunkHandle>,
}

/// Current head of one open chunk.
///
/// Ordered by `(sort key, ordinal)`, where `ordinal` is the stream's position in
/// creation order. The record itself never needs to be comparable.
struct MergeEntry<'k, K, R> {
    record: R,
    ordinal: usize,
    keys: &'k K,
}

impl<K: KeyExtractor<R>, R> PartialEq for MergeEntry<'_, K, R> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K: KeyExtractor<R>, R> Eq for MergeEntry<'_, K, R> {}

impl<K: KeyExtractor<R>, R> PartialOrd for MergeEntry<'_, K, R> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: KeyExtractor<R>, R> Ord for MergeEntry<'_, K, R> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.keys
            .sort_key(&self.record)
            .cmp(other.keys.sort_key(&other.record))
            .then(self.ordinal.cmp(&other.ordinal))
    }
}

/// One chunk opened for its single sequential read.
struct ChunkStream<'a, R> {
    index: usize,
    path: PathBuf,
    records: RecordIter<'a, R>,
}

impl<R> ChunkStream<'_, R> {
    fn next_record(&mut self) -> Result<Option<R>> {
        match self.records.next() {
            None => Ok(None),
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(SortError::ChunkRead {
                index: self.index,
                path: self.path.clone(),
                source: Box::new(e),
            }),
        }
    }
}

/// K-way merges sorted chunks, falling back to several passes when there are more
/// chunks than `max_open_chunks`.
pub struct ChunkMerger<'a, K, F> {
    max_open_chunks: usize,
    keys: &'a K,
    format: &'a F,
}

impl<'a, K, F> ChunkMerger<'a, K, F>
where
    F: RecordFormat,
    K: KeyExtractor<F::Record>,
{
    pub fn new(max_open_chunks: usize, keys: &'a K, format: &'a F) -> Self {
        Self {
            max_open_chunks: max_open_chunks.max(2),
            keys,
            format,
        }
    }

    /// Merges `chunks` (in creation order) and hands every record, in global order,
    /// to `emit`.
    pub fn merge_chunks<E>(
        &self,
        mut chunks: Vec<ChunkHandle>,
        store: &mut ChunkStore,
        mut emit: E,
    ) -> Result<MergeSummary>
    where
        E: FnMut(&F::Record) -> Result<()>,
    {
        let mut summary = MergeSummary::default();

        let first_level = store.chunks_created();
        while chunks.len() > self.max_open_chunks {
            let before = chunks.len();
            chunks = self.merge_pass(chunks, store, &mut summary.consumed_chunks)?;
            summary.intermediate_passes += 1;
            summary.intermediate_chunks = store.chunks_created() - first_level;
            info!(
                "Merge pass {}: {} chunks reduced to {}",
                summary.intermediate_passes,
                before,
                chunks.len()
            );
        }

        summary.records_written = self.merge_streams(&chunks, store, &mut emit)?;
        summary.consumed_chunks.extend(chunks);
        Ok(summary)
    }

    /// Merges consecutive groups of chunks into new chunks. Groups are taken in
    /// creation order and their outputs are created in the same order, so equal
    /// keys still come out in input order. Merged groups are appended to
    /// `consumed` and stay on disk until the whole run has succeeded.
    fn merge_pass(
        &self,
        chunks: Vec<ChunkHandle>,
        store: &mut ChunkStore,
        consumed: &mut Vec<ChunkHandle>,
    ) -> Result<Vec<ChunkHandle>> {
        let mut merged = Vec::with_capacity(chunks.len().div_ceil(self.max_open_chunks));

        for group in chunks.chunks(self.max_open_chunks) {
            if let [single] = group {
                merged.push(single.clone());
                continue;
            }

            let mut writer = store.create_writer()?;
            self.merge_streams(group, store, |record| {
                self.format
                    .write_record(writer.sink(), record)
                    .map_err(|e| writer.write_error(e))?;
                writer.record_written();
                Ok(())
            })?;
            let handle = writer.finish()?;
            debug!(
                "Merged chunks {}..={} into chunk {} ({} records)",
                group[0].index,
                group[group.len() - 1].index,
                handle.index,
                handle.record_count
            );

            consumed.extend_from_slice(group);
            merged.push(handle);
        }

        Ok(merged)
    }

    /// Flat k-way merge over one open stream per chunk. At most one record per
    /// stream is held in the heap at a time.
    fn merge_streams<E>(&self, chunks: &[ChunkHandle], store: &ChunkStore, mut emit: E) -> Result<usize>
    where
        E: FnMut(&F::Record) -> Result<()>,
    {
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut streams = Vec::with_capacity(chunks.len());
        for handle in chunks {
            streams.push(ChunkStream {
                index: handle.index,
                path: handle.path.clone(),
                records: self.format.read_records(store.open_reader(handle)?),
            });
        }

        let mut heap = BinaryHeap::with_capacity(streams.len());
        for (ordinal, stream) in streams.iter_mut().enumerate() {
            // Empty chunks simply never enter the heap.
            if let Some(record) = stream.next_record()? {
                heap.push(Reverse(self.entry(record, ordinal)));
            }
        }

        let mut records_written = 0;
        while let Some(Reverse(head)) = heap.pop() {
            emit(&head.record)?;
            records_written += 1;

            if let Some(next) = streams[head.ordinal].next_record()? {
                heap.push(Reverse(self.entry(next, head.ordinal)));
            }
        }

        Ok(records_written)
    }

    fn entry(&self, record: F::Record, ordinal: usize) -> MergeEntry<'a, K, F::Record> {
        MergeEntry {
            record,
            ordinal,
            keys: self.keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Keyed(&'static [u8], usize);

    fn by_first(record: &Keyed) -> &[u8] {
        record.0
    }

    fn entry<'k, K>(keys: &'k K, key: &'static [u8], ordinal: usize) -> MergeEntry<'k, K, Keyed> {
        MergeEntry {
            record: Keyed(key, ordinal),
            ordinal,
            keys,
        }
    }

    #[test]
    fn test_entry_orders_by_key_then_ordinal() {
        let keys = by_first as fn(&Keyed) -> &[u8];
        assert!(entry(&keys, b"AAA", 5) < entry(&keys, b"CCC", 0));
        assert!(entry(&keys, b"AAA", 0) < entry(&keys, b"AAA", 1));
        assert!(entry(&keys, b"AAA", 2) == entry(&keys, b"AAA", 2));
    }

    #[test]
    fn test_heap_pops_lowest_ordinal_on_ties() {
        let keys = by_first as fn(&Keyed) -> &[u8];
        let mut heap = BinaryHeap::new();
        heap.push(Reverse(entry(&keys, b"GGG", 0)));
        heap.push(Reverse(entry(&keys, b"AAA", 2)));
        heap.push(Reverse(entry(&keys, b"AAA", 1)));

        let order: Vec<(&[u8], usize)> = std::iter::from_fn(|| heap.pop())
            .map(|Reverse(e)| (e.record.0, e.ordinal))
            .collect();
        assert_eq!(
            order,
            vec![(&b"AAA"[..], 1), (&b"AAA"[..], 2), (&b"GGG"[..], 0)]
        );
    }
}
