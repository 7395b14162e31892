use std::io::Read;
use std::path::Path;

use chunkcopy_protocol::{Checksum, DIGEST_LEN};
use md5::{Digest, Md5};

use crate::TransferError;

const FILE_READ_BUFFER: usize = 64 * 1024;

/// Incremental content digest.
///
/// Fed while bytes stream to disk so the digest always describes exactly
/// what was written.
#[derive(Default, Clone)]
pub struct ContentHasher {
    inner: Md5,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    pub fn finalize(self) -> Checksum {
        let out = self.inner.finalize();
        let mut bytes = [0u8; DIGEST_LEN];
        bytes.copy_from_slice(&out);
        Checksum(bytes)
    }
}

/// Computes the digest of an in-memory buffer.
pub fn checksum_bytes(data: &[u8]) -> Checksum {
    let mut hasher = ContentHasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Computes the digest of an entire file.
pub fn calculate_file_checksum(path: &Path) -> Result<Checksum, TransferError> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = ContentHasher::new();
    let mut buf = vec![0u8; FILE_READ_BUFFER];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}
