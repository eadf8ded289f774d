use crate::fastq::FastqRecord;

/// Maps a record to the bytes it is ordered by.
///
/// Keys compare lexicographically as byte strings. Both the chunk builder and the
/// merger take an extractor explicitly, so neither one knows what a key means.
pub trait KeyExtractor<R> {
    fn sort_key<'r>(&self, record: &'r R) -> &'r [u8];
}

/// Orders FASTQ records by their base sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceKey;

impl KeyExtractor<FastqRecord> for SequenceKey {
    fn sort_key<'r>(&self, record: &'r FastqRecord) -> &'r [u8] {
        &record.seq
    }
}

/// Plain functions such as `fn(&R) -> &[u8]` work as extractors too.
impl<R, F> KeyExtractor<R> for F
where
    F: for<'r> Fn(&'r R) -> &'r [u8],
{
    fn sort_key<'r>(&self, record: &'r R) -> &'r [u8] {
        self(record)
    }
}
