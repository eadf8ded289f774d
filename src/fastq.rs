//! FASTQ records and their text encoding.
//!
//! This is the record source and serializer the sorter runs on: input is read with
//! compression autodetection, and chunks and output are written as plain FASTQ text
//! (compression is layered on by the caller).

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

use crate::error::{Result, SortError};
use crate::external_sort::format::{RecordFormat, RecordIter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastqRecord {
    /// Header line without the leading `@`.
    pub head: Vec<u8>,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

impl FastqRecord {
    pub fn new(head: Vec<u8>, seq: Vec<u8>, qual: Vec<u8>) -> Self {
        Self { head, seq, qual }
    }
}

impl From<seq_io::fastq::OwnedRecord> for FastqRecord {
    fn from(record: seq_io::fastq::OwnedRecord) -> Self {
        Self {
            head: record.head,
            seq: record.seq,
            qual: record.qual,
        }
    }
}

/// Lazily parses FASTQ records from any byte stream.
pub struct FastqReader<R: Read> {
    inner: seq_io::fastq::Reader<R>,
}

impl<R: Read> FastqReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: seq_io::fastq::Reader::new(reader),
        }
    }
}

impl<R: Read> Iterator for FastqReader<R> {
    type Item = Result<FastqRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let parsed = self.inner.next()?;
        Some(match parsed {
            Ok(record) => Ok(FastqRecord::from(record.to_owned_record())),
            Err(seq_io::fastq::Error::Io(e)) => Err(SortError::Io(e)),
            Err(e) => Err(SortError::MalformedRecord(e.to_string())),
        })
    }
}

/// FASTQ text encoding: `@head`, sequence, `+`, qualities.
#[derive(Debug, Clone, Copy, Default)]
pub struct FastqFormat;

impl RecordFormat for FastqFormat {
    type Record = FastqRecord;

    fn write_record<W: Write>(&self, writer: &mut W, record: &FastqRecord) -> std::io::Result<()> {
        writer.write_all(b"@")?;
        writer.write_all(&record.head)?;
        writer.write_all(b"\n")?;
        writer.write_all(&record.seq)?;
        writer.write_all(b"\n+\n")?;
        writer.write_all(&record.qual)?;
        writer.write_all(b"\n")
    }

    fn read_records<'a>(&self, reader: Box<dyn BufRead + 'a>) -> RecordIter<'a, FastqRecord> {
        Box::new(FastqReader::new(reader))
    }
}

/// Opens a FASTQ file for reading, transparently decompressing gzip and the
/// other formats niffler recognises.
pub fn open_fastq(path: &Path, buffer_size: usize) -> Result<FastqReader<Box<dyn Read>>> {
    let source_open = |source: crate::error::BoxError| SortError::SourceOpen {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(|e| source_open(Box::new(e)))?;
    let buffered: Box<dyn Read> = Box::new(BufReader::with_capacity(buffer_size, file));
    match niffler::get_reader(buffered) {
        Ok((reader, format)) => {
            tracing::debug!("Opened {} ({:?})", path.display(), format);
            Ok(FastqReader::new(reader))
        }
        // Too short to sniff a magic number; an empty file is a valid empty input.
        Err(niffler::Error::FileTooShort) => {
            let file = File::open(path).map_err(|e| source_open(Box::new(e)))?;
            let plain: Box<dyn Read> = Box::new(BufReader::new(file));
            Ok(FastqReader::new(plain))
        }
        Err(e) => Err(source_open(Box::new(e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(records: &[FastqRecord]) -> Vec<u8> {
        let mut buffer = Vec::new();
        for record in records {
            FastqFormat.write_record(&mut buffer, record).unwrap();
        }
        buffer
    }

    #[test]
    fn test_write_record_layout() {
        let record = FastqRecord::new(b"read1 extra".to_vec(), b"ACGT".to_vec(), b"IIII".to_vec());
        let bytes = encode(&[record]);
        assert_eq!(bytes, b"@read1 extra\nACGT\n+\nIIII\n");
    }

    #[test]
    fn test_read_records_in_order() {
        let text = b"@r1\nCTT\n+\nIII\n@r2\nAAA\n+\n###\n";
        let records: Vec<FastqRecord> = FastqFormat
            .read_records(Box::new(Cursor::new(&text[..])))
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].head, b"r1");
        assert_eq!(records[0].seq, b"CTT");
        assert_eq!(records[1].qual, b"###");
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        let mut records = FastqFormat.read_records(Box::new(Cursor::new(Vec::new())));
        assert!(records.next().is_none());
    }

    #[test]
    fn test_malformed_record_is_an_error() {
        let text = b"r1 missing at sign\nACGT\n+\nIIII\n";
        let first = FastqFormat
            .read_records(Box::new(Cursor::new(&text[..])))
            .next()
            .unwrap();
        assert!(matches!(first, Err(SortError::MalformedRecord(_))));
    }

    #[test]
    fn test_open_missing_file() {
        let result = open_fastq(Path::new("/nonexistent/reads.fastq"), 4096);
        assert!(matches!(result, Err(SortError::SourceOpen { .. })));
    }
}
