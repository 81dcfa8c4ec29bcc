//! Chunk partitioning
//!
//! A transfer of `length` bytes is split into contiguous, non-overlapping
//! chunks of at most `chunk_size` bytes. Every chunk is full size except
//! possibly the last.

/// One segment of a bulk transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Cumulative bytes transferred before this chunk
    pub offset: usize,
    /// Bytes in this chunk
    pub len: usize,
}

/// Iterator over the chunks of a transfer
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    length: usize,
    chunk_size: usize,
    done: usize,
}

impl ChunkPlan {
    /// Plan a transfer of `length` bytes
    ///
    /// `chunk_size` must be non-zero; a zero size is treated as 1 so the
    /// iterator always terminates.
    pub fn new(length: usize, chunk_size: usize) -> Self {
        Self {
            length,
            chunk_size: chunk_size.max(1),
            done: 0,
        }
    }

    /// Bytes not yet handed out
    pub fn remaining(&self) -> usize {
        self.length - self.done
    }
}

impl Iterator for ChunkPlan {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done >= self.length {
            return None;
        }

        let len = self.remaining().min(self.chunk_size);
        let chunk = Chunk {
            offset: self.done,
            len,
        };
        self.done += len;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining().div_ceil(self.chunk_size);
        (n, Some(n))
    }
}

impl ExactSizeIterator for ChunkPlan {}
