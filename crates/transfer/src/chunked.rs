use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::TransferError;
use crate::types::ChunkMeta;

/// Read-only source file that serves chunks by offset.
///
/// Reads are positional (`pread`-style), so any number of threads may read
/// disjoint chunks through a shared reference without a lock or a shared
/// cursor.
#[derive(Debug)]
pub struct ChunkSource {
    file: File,
    path: PathBuf,
    file_size: u64,
}

impl ChunkSource {
    /// Opens `path` for chunked reading.
    pub fn open(path: &Path) -> Result<Self, TransferError> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        Ok(Self {
            file,
            path: path.to_path_buf(),
            file_size,
        })
    }

    /// Size of the file when it was opened.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads exactly `chunk.length` bytes starting at `chunk.offset`.
    ///
    /// A file that ends before the chunk does is an error
    /// (`UnexpectedEof`).
    pub fn read_chunk(&self, chunk: &ChunkMeta) -> Result<Vec<u8>, TransferError> {
        let len = usize::try_from(chunk.length).map_err(|_| TransferError::ChunkTooLarge {
            part_number: chunk.part_number,
            length: chunk.length,
        })?;
        let mut buf = vec![0u8; len];
        read_exact_at(&self.file, &mut buf, chunk.offset)?;
        Ok(buf)
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ));
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
