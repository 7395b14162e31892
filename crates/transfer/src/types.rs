use crate::TransferError;

/// A contiguous byte range of the source file, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkMeta {
    /// 1-based part number.
    pub part_number: u64,
    /// Byte offset into the source file.
    pub offset: u64,
    /// Chunk length in bytes. Only the last chunk may be shorter than the
    /// chunk size.
    pub length: u64,
}

impl ChunkMeta {
    /// Offset one past the last byte of this chunk.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Number of parts a file of `file_size` bytes splits into.
///
/// An empty file still produces a single zero-length part.
pub fn total_parts(file_size: u64, chunk_size: u64) -> Result<u64, TransferError> {
    if chunk_size == 0 {
        return Err(TransferError::ZeroChunkSize);
    }
    Ok(file_size.div_ceil(chunk_size).max(1))
}

/// Splits `[0, file_size)` into ordered chunks of at most `chunk_size` bytes.
pub fn plan_chunks(file_size: u64, chunk_size: u64) -> Result<Vec<ChunkMeta>, TransferError> {
    let parts = total_parts(file_size, chunk_size)?;
    let mut chunks = Vec::with_capacity(parts as usize);
    let mut offset = 0u64;

    for part_number in 1..=parts {
        let length = chunk_size.min(file_size - offset);
        chunks.push(ChunkMeta {
            part_number,
            offset,
            length,
        });
        offset += length;
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Asserts the plan exactly partitions `[0, file_size)`.
    fn assert_partition(file_size: u64, chunk_size: u64) {
        let chunks = plan_chunks(file_size, chunk_size).unwrap();
        assert_eq!(chunks.len() as u64, total_parts(file_size, chunk_size).unwrap());

        let mut expected_offset = 0;
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.part_number, i as u64 + 1);
            assert_eq!(chunk.offset, expected_offset);
            assert!(chunk.length <= chunk_size);
            if i + 1 < chunks.len() {
                assert_eq!(chunk.length, chunk_size, "only the last chunk may be short");
            }
            expected_offset = chunk.end();
        }
        assert_eq!(expected_offset, file_size);
        assert_eq!(chunks.iter().map(|c| c.length).sum::<u64>(), file_size);
    }

    #[test]
    fn ragged_last_chunk() {
        let chunks = plan_chunks(1200, 500).unwrap();
        let lengths: Vec<u64> = chunks.iter().map(|c| c.length).collect();
        assert_eq!(lengths, vec![500, 500, 200]);
        let offsets: Vec<u64> = chunks.iter().map(|c| c.offset).collect();
        assert_eq!(offsets, vec![0, 500, 1000]);
    }

    #[test]
    fn exact_multiple() {
        let chunks = plan_chunks(1000, 500).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.length == 500));
    }

    #[test]
    fn empty_file_has_one_empty_part() {
        let chunks = plan_chunks(0, 500).unwrap();
        assert_eq!(
            chunks,
            vec![ChunkMeta {
                part_number: 1,
                offset: 0,
                length: 0
            }]
        );
    }

    #[test]
    fn single_byte_file() {
        let chunks = plan_chunks(1, 500).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].length, 1);
    }

    #[test]
    fn zero_chunk_size_rejected() {
        assert!(matches!(
            plan_chunks(10, 0),
            Err(TransferError::ZeroChunkSize)
        ));
    }

    #[test]
    fn plans_partition_the_file() {
        for file_size in [0, 1, 2, 499, 500, 501, 999, 1000, 1001, 1200, 4096, 65_537] {
            for chunk_size in [1, 2, 3, 7, 500, 512, 4096, 1 << 20] {
                if file_size / chunk_size > 10_000 {
                    continue;
                }
                assert_partition(file_size, chunk_size);
            }
        }
    }
}
