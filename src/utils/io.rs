use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::constants::GZIP_EXTENSION;

/// Final output artifact. Gzip is chosen from a `.gz` extension, anything else is
/// written as plain text.
pub enum OutputWriter {
    Plain(BufWriter<File>),
    Gzip(BufWriter<GzEncoder<File>>),
}

impl OutputWriter {
    pub fn create(path: &Path, compression_level: u32, buffer_size: usize) -> io::Result<Self> {
        let file = File::create(path)?;
        if is_gzip_path(path) {
            let encoder = GzEncoder::new(file, Compression::new(compression_level));
            Ok(Self::Gzip(BufWriter::with_capacity(buffer_size, encoder)))
        } else {
            Ok(Self::Plain(BufWriter::with_capacity(buffer_size, file)))
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::Gzip(_))
    }

    /// Flushes everything and, for gzip, writes the trailer.
    pub fn finish(self) -> io::Result<()> {
        match self {
            Self::Plain(mut writer) => writer.flush(),
            Self::Gzip(writer) => {
                let encoder = writer.into_inner().map_err(|e| e.into_error())?;
                encoder.finish()?;
                Ok(())
            }
        }
    }
}

impl Write for OutputWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
        }
    }
}

pub fn is_gzip_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(GZIP_EXTENSION))
        .unwrap_or(false)
}

/// Creates the parent directory of `path` when it has one.
pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Sum of the on-disk sizes of `paths`, skipping any that no longer exist.
pub fn total_file_size<'a, I>(paths: I) -> u64
where
    I: IntoIterator<Item = &'a Path>,
{
    paths
        .into_iter()
        .filter_map(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .sum()
}
