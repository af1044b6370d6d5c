//! Byte-stream synchronization: finding pages in raw input.
//!
//! [`SyncState`] accumulates whatever the transport delivers and carves
//! checksum-verified pages off the front. After corruption or a mid-stream
//! join it hunts for the next plausible capture pattern one byte at a time,
//! accepting a candidate only once the complete page is buffered and its
//! checksum holds, so a stray "OggS" inside packet data never produces a
//! bogus page.

use bytes::{Buf, BytesMut};

use crate::crc;
use crate::error::SyncError;
use crate::lifecycle::ReleaseFlag;
use crate::page::Page;
use crate::wire::{PageHeader, CAPTURE_PATTERN, HEADER_SIZE};

/// Default cap on buffered bytes; stands in for the host out-of-memory
/// condition with a typed, testable failure.
pub const DEFAULT_BUFFER_LIMIT: usize = 16 * 1024 * 1024;

/// Outcome of one [`SyncState::pageseek`] step.
#[derive(Debug)]
pub enum PageSeek {
    /// Too little buffered data to decide; write more and retry.
    NeedData,
    /// Discarded this many bytes hunting for a capture candidate.
    Skipped(usize),
    /// A verified page, consumed from the accumulator.
    Page(Page),
}

/// A page candidate measured at the buffer front but not yet fully
/// buffered or verified.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    meta: PageHeader,
    header_len: usize,
    body_len: usize,
}

/// Decode-side synchronizer.
///
/// # Example
///
/// ```
/// use oggframe::SyncState;
///
/// let mut sync = SyncState::new();
/// sync.write(b"not a page yet").unwrap();
/// assert!(sync.pageout().unwrap().is_none());
/// ```
#[derive(Debug)]
pub struct SyncState {
    buffer: BytesMut,
    /// Candidate at the buffer front, cached across calls while its body
    /// is still arriving.
    candidate: Option<Candidate>,
    /// A corruption signal was already raised for the current desync run.
    unsynced: bool,
    limit: usize,
    flag: ReleaseFlag,
}

impl SyncState {
    pub fn new() -> Self {
        Self::with_buffer_limit(DEFAULT_BUFFER_LIMIT)
    }

    /// A synchronizer whose accumulator refuses to grow past `limit`
    /// bytes.
    pub fn with_buffer_limit(limit: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            candidate: None,
            unsynced: false,
            limit,
            flag: ReleaseFlag::new(),
        }
    }

    /// Append raw bytes from the transport.
    pub fn write(&mut self, data: &[u8]) -> Result<(), SyncError> {
        self.flag.ensure_active()?;
        let requested = self.buffer.len() + data.len();
        if requested > self.limit {
            return Err(SyncError::BufferFull {
                requested,
                limit: self.limit,
            });
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Extract the next verified page.
    ///
    /// `Ok(None)` means no complete page is buffered yet; write more data.
    /// When leading bytes have to be dropped to regain page alignment, one
    /// [`SyncError::CorruptData`] is raised for the desynchronized run;
    /// retrying continues the hunt from where it stopped and eventually
    /// yields the next intact page.
    pub fn pageout(&mut self) -> Result<Option<Page>, SyncError> {
        self.flag.ensure_active()?;
        loop {
            match self.seek_step() {
                PageSeek::Page(page) => {
                    self.unsynced = false;
                    return Ok(Some(page));
                }
                PageSeek::NeedData => return Ok(None),
                PageSeek::Skipped(skipped) => {
                    if !self.unsynced {
                        self.unsynced = true;
                        tracing::warn!(skipped, "lost page sync, hunting for capture pattern");
                        return Err(SyncError::CorruptData { skipped });
                    }
                    // Already signaled for this run; keep hunting.
                }
            }
        }
    }

    /// One synchronization step; the primitive [`pageout`](Self::pageout)
    /// loops over.
    ///
    /// Unlike `pageout` this never raises a corruption error: skipped
    /// bytes are reported in the return value, which seeking code can
    /// total up to track its byte position in the physical stream.
    pub fn pageseek(&mut self) -> Result<PageSeek, SyncError> {
        self.flag.ensure_active()?;
        Ok(self.seek_step())
    }

    /// Discard all buffered bytes and any half-measured candidate; the
    /// object stays usable.
    pub fn reset(&mut self) -> Result<(), SyncError> {
        self.flag.ensure_active()?;
        self.buffer.clear();
        self.candidate = None;
        self.unsynced = false;
        Ok(())
    }

    /// Mark this synchronizer released and drop its buffer. Idempotent.
    /// Outstanding [`Page`]s lose access to their raw bytes.
    pub fn release(&mut self) {
        self.flag.release();
        self.buffer = BytesMut::new();
        self.candidate = None;
    }

    /// Lifecycle query; callable in any state.
    #[inline]
    pub fn is_released(&self) -> bool {
        self.flag.is_released()
    }

    /// Bytes currently buffered and not yet consumed.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn seek_step(&mut self) -> PageSeek {
        let candidate = match self.candidate {
            Some(candidate) => candidate,
            None => {
                if self.buffer.len() < HEADER_SIZE {
                    return PageSeek::NeedData;
                }
                let Some(meta) = PageHeader::decode(&self.buffer) else {
                    // No capture pattern at the front.
                    return self.skip_ahead();
                };
                let header_len = meta.header_len();
                if self.buffer.len() < header_len {
                    return PageSeek::NeedData;
                }
                let body_len = self.buffer[HEADER_SIZE..header_len]
                    .iter()
                    .map(|&v| v as usize)
                    .sum();
                let candidate = Candidate {
                    meta,
                    header_len,
                    body_len,
                };
                self.candidate = Some(candidate);
                candidate
            }
        };

        let total = candidate.header_len + candidate.body_len;
        if self.buffer.len() < total {
            return PageSeek::NeedData;
        }
        self.candidate = None;

        let computed = crc::page_checksum(&self.buffer[..total]);
        if computed != candidate.meta.checksum {
            tracing::debug!(
                stored = candidate.meta.checksum,
                computed,
                "page checksum mismatch, dropping candidate"
            );
            return self.skip_ahead();
        }

        let raw = self.buffer.split_to(total).freeze();
        let header = raw.slice(..candidate.header_len);
        let body = raw.slice(candidate.header_len..);
        PageSeek::Page(Page::from_parts(
            candidate.meta,
            header,
            body,
            self.flag.clone(),
        ))
    }

    /// Drop the failed candidate start and everything up to the next byte
    /// that could open a capture pattern.
    fn skip_ahead(&mut self) -> PageSeek {
        self.candidate = None;
        let skip = self.buffer[1..]
            .iter()
            .position(|&b| b == CAPTURE_PATTERN[0])
            .map(|pos| pos + 1)
            .unwrap_or(self.buffer.len());
        self.buffer.advance(skip);
        PageSeek::Skipped(skip)
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SyncState {
    fn drop(&mut self) {
        self.flag.release();
    }
}
