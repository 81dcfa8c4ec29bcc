//! Chunked EEPROM transfer engine
//!
//! Moves `length` bytes between a standard stream and the EEPROM as a
//! sequence of vendor control transfers, one per [`ChunkPlan`] chunk. The
//! first chunk that does not move exactly its own length aborts the
//! operation. Nothing already streamed or written is rolled back.
//!
//! A length whose chunks cannot all be addressed by the 16-bit offset is
//! rejected before any input is read or any transfer is issued.

use crate::error::{Error, Result};
use crate::session::Session;
use crate::usb_types::UsbHandle;
use protocol::{ChunkPlan, Direction, EepromProtocol, TransferResult};
use std::fmt;
use std::io::{Read, Write};
use tracing::{debug, trace};

/// Totals of a completed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSummary {
    pub direction: Direction,
    pub bytes: usize,
    pub chunks: usize,
}

impl fmt::Display for TransferSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} bytes", self.direction.past_tense(), self.bytes)
    }
}

/// Runs reads and writes against a claimed session
pub struct TransferEngine<'a> {
    params: &'a EepromProtocol,
}

impl<'a> TransferEngine<'a> {
    pub fn new(params: &'a EepromProtocol) -> Self {
        Self { params }
    }

    /// Run the operation in `direction`
    ///
    /// Reads stream to `output`; writes consume `input`. The stream not used
    /// by the direction is left untouched.
    pub fn run<H, R, W>(
        &self,
        session: &mut Session<H>,
        direction: Direction,
        length: usize,
        input: &mut R,
        output: &mut W,
    ) -> Result<TransferSummary>
    where
        H: UsbHandle,
        R: Read,
        W: Write,
    {
        match direction {
            Direction::Read => self.read(session, length, output),
            Direction::Write => self.write(session, length, input),
        }
    }

    /// Read `length` bytes from offset 0 into `output`
    ///
    /// Each chunk is flushed to `output` before the next transfer is issued.
    pub fn read<H: UsbHandle, W: Write>(
        &self,
        session: &mut Session<H>,
        length: usize,
        output: &mut W,
    ) -> Result<TransferSummary> {
        self.params.check_span(Direction::Read, length)?;
        let mut buffer = self.allocate(length)?;
        let mut summary = TransferSummary {
            direction: Direction::Read,
            bytes: 0,
            chunks: 0,
        };

        session.begin_transfer();
        for chunk in ChunkPlan::new(length, self.params.chunk_size) {
            let request = self.params.request(Direction::Read, chunk)?;
            buffer.resize(chunk.len, 0);

            trace!("Reading {} bytes at {}", chunk.len, chunk.offset);
            let transferred = session
                .handle()
                .read_control(&request, &mut buffer)
                .map_err(|source| Error::Transfer {
                    direction: Direction::Read,
                    offset: chunk.offset,
                    expected: chunk.len,
                    source,
                })?;
            TransferResult { transferred }.verify(&request)?;

            output.write_all(&buffer)?;
            output.flush()?;

            summary.bytes += chunk.len;
            summary.chunks += 1;
        }
        session.end_transfer();

        debug!("{} in {} chunk(s)", summary, summary.chunks);
        Ok(summary)
    }

    /// Write `length` bytes from `input` starting at offset 0
    ///
    /// Each chunk is read in full from `input` before it is sent. Input that
    /// ends early fails the operation without issuing that chunk.
    pub fn write<H: UsbHandle, R: Read>(
        &self,
        session: &mut Session<H>,
        length: usize,
        input: &mut R,
    ) -> Result<TransferSummary> {
        self.params.check_span(Direction::Write, length)?;
        let mut buffer = self.allocate(length)?;
        let mut summary = TransferSummary {
            direction: Direction::Write,
            bytes: 0,
            chunks: 0,
        };

        session.begin_transfer();
        for chunk in ChunkPlan::new(length, self.params.chunk_size) {
            buffer.clear();
            let actual = input
                .by_ref()
                .take(chunk.len as u64)
                .read_to_end(&mut buffer)?;
            if actual != chunk.len {
                return Err(Error::ShortInput {
                    expected: chunk.len,
                    actual,
                });
            }

            let request = self.params.request(Direction::Write, chunk)?;

            trace!("Writing {} bytes at {}", chunk.len, chunk.offset);
            let transferred = session
                .handle()
                .write_control(&request, &buffer)
                .map_err(|source| Error::Transfer {
                    direction: Direction::Write,
                    offset: chunk.offset,
                    expected: chunk.len,
                    source,
                })?;
            TransferResult { transferred }.verify(&request)?;

            summary.bytes += chunk.len;
            summary.chunks += 1;
        }
        session.end_transfer();

        debug!("{} in {} chunk(s)", summary, summary.chunks);
        Ok(summary)
    }

    /// Reserve the single transfer buffer reused by every chunk
    fn allocate(&self, length: usize) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(length.min(self.params.chunk_size))?;
        Ok(buffer)
    }
}
