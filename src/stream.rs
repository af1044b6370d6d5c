//! Logical stream framing: packets into pages and back.
//!
//! [`StreamState`] is one half of a codec pair. On the encode side it
//! buffers submitted packets, breaks them into 255-byte lacing segments
//! and cuts pages near a configurable fill target. On the decode side it
//! accepts checksum-verified pages (usually from
//! [`SyncState`](crate::SyncState)) and reassembles the original packet
//! sequence, flagging sequence gaps instead of silently splicing across
//! lost data.
//!
//! One instance serves one direction of one logical stream; multiplexed
//! inputs are routed to per-serial instances by the caller.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

use crate::error::StreamError;
use crate::lifecycle::ReleaseFlag;
use crate::packet::Packet;
use crate::page::Page;
use crate::wire::{self, flags, PageHeader, HEADER_SIZE};

/// Target page body size in bytes. Pages are cut at the first packet
/// boundary past this, so real pages overshoot it slightly.
pub const DEFAULT_PAGE_FILL: usize = 4096;

/// Granule value for segments that do not end a packet, and for pages on
/// which no packet ends.
const NO_GRANULE: i64 = -1;

/// One segment table slot plus its bookkeeping.
#[derive(Debug, Clone, Copy)]
struct LacingEntry {
    len: u8,
    /// Encode: first segment of its packet. Decode: carries the stream
    /// bos marker to the first packet.
    begin: bool,
    /// The stream's final packet ends in this segment.
    end: bool,
    /// Pseudo-entry standing in for pages lost to a sequence gap.
    gap: bool,
    granule: i64,
}

impl LacingEntry {
    fn segment(len: u8, begin: bool, granule: i64) -> Self {
        Self {
            len,
            begin,
            end: false,
            gap: false,
            granule,
        }
    }

    fn hole() -> Self {
        Self {
            len: 0,
            begin: false,
            end: false,
            gap: true,
            granule: NO_GRANULE,
        }
    }
}

/// Packet/page framing state for a single logical stream.
///
/// # Example
///
/// ```
/// use oggframe::{Packet, StreamState};
///
/// let mut stream = StreamState::new(0x1234);
/// stream
///     .packetin(&Packet::new(&b"header"[..], true, false, 0, 0))
///     .unwrap();
/// let page = stream.flush().unwrap().unwrap();
/// assert!(page.bos());
/// assert_eq!(page.serial_number(), 0x1234);
/// ```
#[derive(Debug)]
pub struct StreamState {
    serial: u32,
    /// Packet bytes in segment order; consumed from the front as pages
    /// are cut (encode) or packets are read out (decode).
    body: BytesMut,
    lacing: VecDeque<LacingEntry>,
    /// Decode: number of front lacing entries forming whole packets.
    complete: usize,
    bos_written: bool,
    eos: bool,
    /// Next expected (decode) or assigned (encode) page sequence number.
    /// `None` after a reset: the next page is accepted or numbered from
    /// scratch.
    page_seq: Option<u32>,
    packet_seq: i64,
    flag: ReleaseFlag,
}

impl StreamState {
    /// Framing state for the logical stream identified by
    /// `serial_number`.
    pub fn new(serial_number: u32) -> Self {
        Self {
            serial: serial_number,
            body: BytesMut::new(),
            lacing: VecDeque::new(),
            complete: 0,
            bos_written: false,
            eos: false,
            page_seq: Some(0),
            packet_seq: 0,
            flag: ReleaseFlag::new(),
        }
    }

    /// Serial number this stream was created (or last reset) with.
    #[inline]
    pub fn serial_number(&self) -> u32 {
        self.serial
    }

    /// Whether the end of stream has been submitted (encode) or observed
    /// on a page (decode).
    #[inline]
    pub fn eos(&self) -> bool {
        self.eos
    }

    /// Lifecycle query; callable in any state.
    #[inline]
    pub fn is_released(&self) -> bool {
        self.flag.is_released()
    }

    /// Submit a packet for framing.
    ///
    /// The payload is copied into the stream's buffers; lacing segments
    /// are appended but no page is produced here. A zero-length payload
    /// is a legal packet and occupies one segment table slot.
    pub fn packetin(&mut self, packet: &Packet) -> Result<(), StreamError> {
        self.flag.ensure_active()?;
        if self.eos {
            return Err(StreamError::PacketAfterEos);
        }
        let payload = packet.payload()?;
        self.body.extend_from_slice(payload);

        let full = payload.len() / 255;
        let tail = (payload.len() % 255) as u8;
        for i in 0..full {
            self.lacing
                .push_back(LacingEntry::segment(255, i == 0, NO_GRANULE));
        }
        self.lacing
            .push_back(LacingEntry::segment(tail, full == 0, packet.granule_position()));

        if packet.eos() {
            self.eos = true;
        }
        self.packet_seq += 1;
        Ok(())
    }

    /// Cut a page once enough data has accumulated.
    ///
    /// Returns `Ok(None)` while the buffered data is below the default
    /// fill target and no cut is required; the end of stream always
    /// drains. Equivalent to
    /// [`pageout_fill`](Self::pageout_fill) with [`DEFAULT_PAGE_FILL`].
    pub fn pageout(&mut self) -> Result<Option<Page>, StreamError> {
        self.pageout_fill(DEFAULT_PAGE_FILL)
    }

    /// [`pageout`](Self::pageout) with an explicit fill target.
    pub fn pageout_fill(&mut self, nfill: usize) -> Result<Option<Page>, StreamError> {
        self.flag.ensure_active()?;
        let force = self.eos && !self.lacing.is_empty();
        Ok(self.cut_page(nfill, force))
    }

    /// Cut a page from whatever is buffered, regardless of fill.
    ///
    /// At most one page is produced per call; callers drain by looping
    /// until `Ok(None)`. Equivalent to [`flush_fill`](Self::flush_fill)
    /// with [`DEFAULT_PAGE_FILL`].
    pub fn flush(&mut self) -> Result<Option<Page>, StreamError> {
        self.flush_fill(DEFAULT_PAGE_FILL)
    }

    /// [`flush`](Self::flush) with an explicit fill target.
    pub fn flush_fill(&mut self, nfill: usize) -> Result<Option<Page>, StreamError> {
        self.flag.ensure_active()?;
        Ok(self.cut_page(nfill, true))
    }

    /// Accept a verified page into the decode buffers.
    ///
    /// The page must belong to this stream's serial number. A sequence
    /// gap is reported with [`StreamError::SequenceGap`] after the page
    /// has been buffered; decoding continues, and the loss surfaces once
    /// more as [`StreamError::Hole`] at the packet boundary.
    pub fn pagein(&mut self, page: &Page) -> Result<(), StreamError> {
        self.flag.ensure_active()?;

        if page.serial_number() != self.serial {
            return Err(StreamError::SerialMismatch {
                expected: self.serial,
                got: page.serial_number(),
            });
        }
        if page.version() != 0 {
            return Err(StreamError::UnsupportedVersion(page.version()));
        }

        let header = page.header_bytes()?;
        let mut segments = &header[HEADER_SIZE..];
        let mut body = page.body_bytes()?;
        let got = page.page_sequence_number();
        let mut bos = page.bos();

        let mut gap = None;
        if let Some(expected) = self.page_seq {
            if got != expected {
                // Unroll the packet the lost pages interrupted, then
                // leave a hole marker in its place.
                self.drop_unfinished_packet();
                self.lacing.push_back(LacingEntry::hole());
                self.complete = self.lacing.len();
                gap = Some(StreamError::SequenceGap { expected, got });
                tracing::warn!(
                    expected,
                    got,
                    serial = self.serial,
                    "page sequence gap, inserting hole marker"
                );
            }
        }

        if page.continued() && !self.has_partial_packet() {
            // Continuation of a packet whose start we never buffered:
            // drop the leading segment run through its terminal.
            bos = false;
            let mut consumed = 0usize;
            let mut skipped = 0usize;
            for &val in segments {
                consumed += val as usize;
                skipped += 1;
                if val < 255 {
                    break;
                }
            }
            tracing::debug!(
                bytes = consumed,
                serial = self.serial,
                "dropping continuation fragment with no pending packet"
            );
            segments = &segments[skipped..];
            body = &body[consumed..];
        }

        self.body.extend_from_slice(body);

        let mut last_terminal = None;
        for &val in segments {
            self.lacing
                .push_back(LacingEntry::segment(val, bos, NO_GRANULE));
            bos = false;
            if val < 255 {
                last_terminal = Some(self.lacing.len() - 1);
                self.complete = self.lacing.len();
            }
        }
        // Only the last packet to end on a page gets its granule.
        if let Some(idx) = last_terminal {
            self.lacing[idx].granule = page.granule_position();
        }

        if page.eos() {
            self.eos = true;
            if let Some(entry) = self.lacing.back_mut() {
                entry.end = true;
            }
        }

        self.page_seq = Some(got.wrapping_add(1));

        match gap {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Read the next whole packet out of the decode buffers.
    ///
    /// `Ok(None)` means no complete packet is buffered. A
    /// [`StreamError::Hole`] reports pages lost to a sequence gap; the
    /// hole consumes one packet number, and the next call resumes with
    /// the data after the gap.
    pub fn packetout(&mut self) -> Result<Option<Packet>, StreamError> {
        self.take_packet(true)
    }

    /// Like [`packetout`](Self::packetout) but leaves the packet
    /// buffered; the payload is copied out. A pending hole is consumed
    /// and reported exactly as `packetout` would.
    pub fn packetpeek(&mut self) -> Result<Option<Packet>, StreamError> {
        self.take_packet(false)
    }

    /// Return the stream to its freshly-initialized state, dropping all
    /// buffered data. The serial number is kept; the next page sequence
    /// number is accepted (decode) or restarted at zero (encode).
    pub fn reset(&mut self) -> Result<(), StreamError> {
        self.flag.ensure_active()?;
        self.clear_state();
        Ok(())
    }

    /// [`reset`](Self::reset), then adopt a new serial number.
    pub fn reset_serial_number(&mut self, serial_number: u32) -> Result<(), StreamError> {
        self.reset()?;
        self.serial = serial_number;
        Ok(())
    }

    /// Mark this stream released and drop its buffers. Idempotent.
    /// Outstanding [`Page`]s and [`Packet`]s lose access to their
    /// payload bytes.
    pub fn release(&mut self) {
        self.flag.release();
        self.body = BytesMut::new();
        self.lacing = VecDeque::new();
        self.complete = 0;
    }

    fn clear_state(&mut self) {
        self.body.clear();
        self.lacing.clear();
        self.complete = 0;
        self.bos_written = false;
        self.eos = false;
        self.page_seq = None;
        self.packet_seq = 0;
    }

    /// Last buffered segment belongs to a packet still waiting for its
    /// terminal segment.
    fn has_partial_packet(&self) -> bool {
        matches!(self.lacing.back(), Some(entry) if entry.len == 255)
    }

    /// Discard trailing lacing entries (and their body bytes) that do
    /// not form a complete packet.
    fn drop_unfinished_packet(&mut self) {
        let dropped: usize = self
            .lacing
            .drain(self.complete..)
            .map(|entry| entry.len as usize)
            .sum();
        if dropped > 0 {
            let keep = self.body.len() - dropped;
            self.body.truncate(keep);
        }
    }

    /// Cut one page off the front of the buffered segments.
    ///
    /// Scans at most 255 entries. Without `force`, a page is produced
    /// only past the first packet boundary beyond `nfill`, or when the
    /// segment table window is full; `force` cuts whatever the scan
    /// selected.
    fn cut_page(&mut self, nfill: usize, force: bool) -> Option<Page> {
        let window = self.lacing.len().min(wire::MAX_SEGMENTS);
        if window == 0 {
            return None;
        }

        let mut vals = window;
        let mut granule = NO_GRANULE;
        let mut cut = force || window == wire::MAX_SEGMENTS;

        if !self.bos_written {
            // The first page carries exactly one packet, however small.
            let mut acc = 0usize;
            for (i, entry) in self.lacing.iter().take(window).enumerate() {
                acc += entry.len as usize;
                if entry.len < 255 {
                    vals = i + 1;
                    granule = entry.granule;
                    if acc > nfill {
                        cut = true;
                    }
                    break;
                }
            }
        } else {
            let mut acc = 0usize;
            let mut at_boundary = false;
            for (i, entry) in self.lacing.iter().take(window).enumerate() {
                if at_boundary && acc > nfill {
                    vals = i;
                    cut = true;
                    break;
                }
                acc += entry.len as usize;
                at_boundary = entry.len < 255;
                if at_boundary {
                    granule = entry.granule;
                }
            }
        }

        if !cut {
            return None;
        }

        let mut header_type = 0u8;
        if !self.lacing[0].begin {
            header_type |= flags::CONTINUED;
        }
        if !self.bos_written {
            header_type |= flags::BOS;
        }
        if self.eos && vals == self.lacing.len() {
            header_type |= flags::EOS;
        }

        let seq = self.page_seq.unwrap_or(0);
        let body_len: usize = self
            .lacing
            .iter()
            .take(vals)
            .map(|entry| entry.len as usize)
            .sum();

        let mut meta = PageHeader {
            version: 0,
            header_type,
            granule_position: granule,
            serial_number: self.serial,
            page_sequence: seq,
            checksum: 0,
            segment_count: vals as u8,
        };

        let header_len = HEADER_SIZE + vals;
        let mut raw = Vec::with_capacity(header_len + body_len);
        raw.resize(HEADER_SIZE, 0);
        meta.encode_into(&mut raw);
        for entry in self.lacing.iter().take(vals) {
            raw.push(entry.len);
        }
        let body = self.body.split_to(body_len);
        raw.extend_from_slice(&body);
        wire::set_page_checksum(&mut raw);
        meta.checksum = u32::from_le_bytes([raw[22], raw[23], raw[24], raw[25]]);

        self.lacing.drain(..vals);
        self.complete = self.complete.saturating_sub(vals);
        self.bos_written = true;
        self.page_seq = Some(seq.wrapping_add(1));

        let raw = Bytes::from(raw);
        Some(Page::from_parts(
            meta,
            raw.slice(..header_len),
            raw.slice(header_len..),
            self.flag.clone(),
        ))
    }

    fn take_packet(&mut self, advance: bool) -> Result<Option<Packet>, StreamError> {
        self.flag.ensure_active()?;
        if self.complete == 0 {
            return Ok(None);
        }

        let front = self.lacing[0];
        if front.gap {
            // The hole is consumed even on peek and occupies one packet
            // number, so callers can account for the loss exactly once.
            self.lacing.pop_front();
            self.complete -= 1;
            self.packet_seq += 1;
            tracing::debug!(serial = self.serial, "signaling data hole to the caller");
            return Err(StreamError::Hole);
        }

        let mut vals = 1usize;
        let mut bytes = front.len as usize;
        let mut eos = front.end;
        let mut granule = front.granule;
        let mut entry = front;
        while entry.len == 255 {
            entry = self.lacing[vals];
            vals += 1;
            bytes += entry.len as usize;
            if entry.end {
                eos = true;
            }
            granule = entry.granule;
        }

        let (payload, seq) = if advance {
            let payload = self.body.split_to(bytes).freeze();
            self.lacing.drain(..vals);
            self.complete -= vals;
            let seq = self.packet_seq;
            self.packet_seq += 1;
            (payload, seq)
        } else {
            (Bytes::copy_from_slice(&self.body[..bytes]), self.packet_seq)
        };

        Ok(Some(Packet::from_stream(
            payload,
            front.begin,
            eos,
            granule,
            seq,
            self.flag.clone(),
        )))
    }
}

impl Drop for StreamState {
    fn drop(&mut self) {
        self.flag.release();
    }
}
