use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Result, SortError};

/// Identifies one chunk artifact. `index` is the creation order and doubles as the
/// merge tie-breaker; it does not imply ownership of the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkHandle {
    pub index: usize,
    pub path: PathBuf,
    pub record_count: usize,
}

/// What happens to chunk artifacts once the merge that consumed them succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkRetention {
    /// Leave every chunk on disk.
    #[default]
    Keep,
    /// Delete chunks after a successful merge. Failed runs always keep them.
    Remove,
}

/// Resolves where chunk artifacts live.
///
/// Chunk `n` is named `<output file name><n>` and placed in the staging directory
/// when one is given, otherwise beside the output file.
#[derive(Debug, Clone)]
pub struct ChunkLayout {
    directory: PathBuf,
    prefix: String,
}

impl ChunkLayout {
    pub fn new(output_file: &Path, staging_directory: Option<&Path>) -> Self {
        let prefix = output_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "chunk".to_string());

        let directory = match staging_directory {
            Some(dir) => dir.to_path_buf(),
            None => output_file
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };

        Self { directory, prefix }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn chunk_path(&self, index: usize) -> PathBuf {
        self.directory.join(format!("{}{}", self.prefix, index))
    }

    /// True when `path` is an existing file that some chunk of this layout would
    /// truncate, i.e. it lives in the chunk directory and is named `<prefix><digits>`.
    /// Symlinks are resolved first.
    pub fn would_overwrite(&self, path: &Path) -> bool {
        let Ok(resolved) = path.canonicalize() else {
            return false;
        };
        let is_chunk_name = resolved
            .file_name()
            .map(|name| name.to_string_lossy())
            .and_then(|name| {
                name.strip_prefix(self.prefix.as_str())
                    .map(|suffix| !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()))
            })
            .unwrap_or(false);
        if !is_chunk_name {
            return false;
        }

        let directory = if self.directory.as_os_str().is_empty() {
            Path::new(".")
        } else {
            self.directory.as_path()
        };
        match (directory.canonicalize(), resolved.parent()) {
            (Ok(directory), Some(parent)) => directory == parent,
            _ => false,
        }
    }
}

/// Owns the lifecycle of chunk artifacts: naming, writing, reading back, disposal.
pub struct ChunkStore {
    layout: ChunkLayout,
    io_buffer_size: usize,
    compression_level: u32,
    retention: ChunkRetention,
    next_index: usize,
}

impl ChunkStore {
    pub fn new(
        layout: ChunkLayout,
        io_buffer_size: usize,
        compression_level: u32,
        retention: ChunkRetention,
    ) -> Self {
        Self {
            layout,
            io_buffer_size,
            compression_level,
            retention,
            next_index: 0,
        }
    }

    /// Number of chunks created so far, which is also the next creation index.
    pub fn chunks_created(&self) -> usize {
        self.next_index
    }

    /// Reserves the next creation index and opens a gzip writer for it.
    ///
    /// The file is closed whether or not [`ChunkWriter::finish`] is reached; only
    /// `finish` reports flush errors.
    pub fn create_writer(&mut self) -> Result<ChunkWriter> {
        let index = self.next_index;
        let path = self.layout.chunk_path(index);
        let file = File::create(&path).map_err(|source| SortError::ChunkWrite {
            index,
            path: path.clone(),
            source,
        })?;
        self.next_index += 1;

        let encoder = GzEncoder::new(file, Compression::new(self.compression_level));
        Ok(ChunkWriter {
            index,
            path,
            writer: BufWriter::with_capacity(self.io_buffer_size, encoder),
            record_count: 0,
        })
    }

    /// Opens a previously finished chunk for a single sequential pass.
    pub fn open_reader(&self, handle: &ChunkHandle) -> Result<Box<dyn BufRead>> {
        let file = File::open(&handle.path).map_err(|e| SortError::ChunkRead {
            index: handle.index,
            path: handle.path.clone(),
            source: Box::new(e),
        })?;
        Ok(Box::new(BufReader::with_capacity(
            self.io_buffer_size,
            MultiGzDecoder::new(file),
        )))
    }

    /// Applies the retention policy to chunks whose merge has completed.
    pub fn release(&self, handles: &[ChunkHandle]) -> Result<usize> {
        if self.retention == ChunkRetention::Keep {
            return Ok(0);
        }

        let mut removed = 0;
        for handle in handles {
            match std::fs::remove_file(&handle.path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!("Chunk {} already gone: {}", handle.index, handle.path.display());
                }
                Err(e) => return Err(e.into()),
            }
        }
        debug!("Removed {} chunk files", removed);
        Ok(removed)
    }
}

/// Write side of a single chunk.
pub struct ChunkWriter {
    index: usize,
    path: PathBuf,
    writer: BufWriter<GzEncoder<File>>,
    record_count: usize,
}

impl ChunkWriter {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Wraps a failed write with this chunk's identity.
    pub fn write_error(&self, source: std::io::Error) -> SortError {
        SortError::ChunkWrite {
            index: self.index,
            path: self.path.clone(),
            source,
        }
    }

    /// Raw byte sink for a record serializer. Call [`ChunkWriter::record_written`]
    /// after each complete record.
    pub fn sink(&mut self) -> &mut BufWriter<GzEncoder<File>> {
        &mut self.writer
    }

    pub fn record_written(&mut self) {
        self.record_count += 1;
    }

    /// Flushes buffers, writes the gzip trailer and closes the file.
    pub fn finish(self) -> Result<ChunkHandle> {
        let ChunkWriter {
            index,
            path,
            writer,
            record_count,
        } = self;

        let finished = writer
            .into_inner()
            .map_err(|e| e.into_error())
            .and_then(|encoder| encoder.finish());

        match finished {
            Ok(_file) => Ok(ChunkHandle {
                index,
                path,
                record_count,
            }),
            Err(source) => Err(SortError::ChunkWrite {
                index,
                path,
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use tempfile::tempdir;

    fn store_in(dir: &Path, retention: ChunkRetention) -> ChunkStore {
        let layout = ChunkLayout::new(&dir.join("sorted.fastq.gz"), None);
        ChunkStore::new(layout, 4096, 1, retention)
    }

    #[test]
    fn test_chunk_paths_beside_output() {
        let layout = ChunkLayout::new(Path::new("/data/out/sorted.fastq.gz"), None);
        assert_eq!(layout.chunk_path(0), PathBuf::from("/data/out/sorted.fastq.gz0"));
        assert_eq!(layout.chunk_path(12), PathBuf::from("/data/out/sorted.fastq.gz12"));
    }

    #[test]
    fn test_chunk_paths_in_staging_directory() {
        let layout = ChunkLayout::new(
            Path::new("/data/out/sorted.fastq.gz"),
            Some(Path::new("/scratch")),
        );
        assert_eq!(layout.chunk_path(3), PathBuf::from("/scratch/sorted.fastq.gz3"));
        assert_eq!(layout.directory(), Path::new("/scratch"));
    }

    #[test]
    fn test_bare_output_name_uses_current_directory() {
        let layout = ChunkLayout::new(Path::new("sorted.fq"), None);
        assert_eq!(layout.chunk_path(1), PathBuf::from("sorted.fq1"));
    }

    #[test]
    fn test_would_overwrite_detects_chunk_named_files() {
        let dir = tempdir().unwrap();
        let layout = ChunkLayout::new(&dir.path().join("o.fq"), None);
        for name in ["o.fq0", "o.fq17", "o.fq", "o.fqx", "reads.fq"] {
            std::fs::write(dir.path().join(name), b"@r\nA\n+\nI\n").unwrap();
        }

        assert!(layout.would_overwrite(&dir.path().join("o.fq0")));
        assert!(layout.would_overwrite(&dir.path().join("o.fq17")));
        assert!(!layout.would_overwrite(&dir.path().join("o.fq")));
        assert!(!layout.would_overwrite(&dir.path().join("o.fqx")));
        assert!(!layout.would_overwrite(&dir.path().join("reads.fq")));
        // Not yet on disk, so nothing to lose.
        assert!(!layout.would_overwrite(&dir.path().join("o.fq5")));

        let staged = ChunkLayout::new(&dir.path().join("o.fq"), Some(&dir.path().join("staging")));
        assert!(!staged.would_overwrite(&dir.path().join("o.fq0")));
    }

    #[test]
    fn test_write_then_read_back() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path(), ChunkRetention::Keep);

        let mut writer = store.create_writer().unwrap();
        assert_eq!(writer.index(), 0);
        writer.sink().write_all(b"hello chunk").unwrap();
        writer.record_written();
        let handle = writer.finish().unwrap();

        assert_eq!(handle.index, 0);
        assert_eq!(handle.record_count, 1);
        assert_eq!(store.chunks_created(), 1);

        let mut contents = String::new();
        store.open_reader(&handle).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "hello chunk");
    }

    #[test]
    fn test_indices_follow_creation_order() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path(), ChunkRetention::Keep);

        let first = store.create_writer().unwrap().finish().unwrap();
        let second = store.create_writer().unwrap().finish().unwrap();
        assert_eq!((first.index, second.index), (0, 1));
        assert_ne!(first.path, second.path);
    }

    #[test]
    fn test_dropped_writer_still_closes_file() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path(), ChunkRetention::Keep);

        let mut writer = store.create_writer().unwrap();
        writer.sink().write_all(b"partial").unwrap();
        drop(writer);

        assert!(dir.path().join("sorted.fastq.gz0").exists());
    }

    #[test]
    fn test_missing_chunk_is_read_error() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path(), ChunkRetention::Keep);
        let handle = ChunkHandle {
            index: 7,
            path: dir.path().join("nope"),
            record_count: 0,
        };

        assert!(matches!(
            store.open_reader(&handle),
            Err(SortError::ChunkRead { index: 7, .. })
        ));
    }

    #[test]
    fn test_release_respects_retention() {
        let dir = tempdir().unwrap();

        let mut keep = store_in(dir.path(), ChunkRetention::Keep);
        let kept = keep.create_writer().unwrap().finish().unwrap();
        assert_eq!(keep.release(&[kept.clone()]).unwrap(), 0);
        assert!(kept.path.exists());

        let remove = store_in(dir.path(), ChunkRetention::Remove);
        assert_eq!(remove.release(&[kept.clone()]).unwrap(), 1);
        assert!(!kept.path.exists());
    }
}
