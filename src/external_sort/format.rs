use std::io::{BufRead, Write};

use crate::error::Result;

/// Iterator over the records decoded from one stream.
pub type RecordIter<'a, R> = Box<dyn Iterator<Item = Result<R>> + 'a>;

/// Converts records to and from their on-disk byte form.
///
/// Chunks and the final output share this encoding, so a chunk read back with
/// [`RecordFormat::read_records`] yields records in the order they were written.
pub trait RecordFormat {
    type Record;

    fn write_record<W: Write>(&self, writer: &mut W, record: &Self::Record) -> std::io::Result<()>;

    fn read_records<'a>(&self, reader: Box<dyn BufRead + 'a>) -> RecordIter<'a, Self::Record>;
}
