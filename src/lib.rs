//! # oggframe
//!
//! Container framing for Ogg bitstreams: packs logical packets into
//! checksummed pages for transport, and recovers the packet sequence from
//! raw, possibly damaged byte streams.
//!
//! The engine frames opaque payloads; it never inspects codec data. Pages
//! carry a CRC and sequence numbers, so the decode side detects
//! corruption, resynchronizes after garbage, and reports lost data
//! instead of splicing across it.
//!
//! ## Architecture
//!
//! - **Encode** ([`StreamState`]): submitted packets are split into
//!   lacing segments and cut into pages near a fill target, or on demand
//!   with `flush`.
//! - **Decode** ([`SyncState`] + [`StreamState`]): raw bytes are scanned
//!   for checksum-verified pages, which per-stream state machines
//!   reassemble into packets.
//!
//! Multiplexed physical streams work by routing each page to the
//! [`StreamState`] matching its serial number.
//!
//! ## Example
//!
//! ```
//! use oggframe::{OggError, Packet, StreamState, SyncState};
//!
//! fn main() -> Result<(), OggError> {
//!     // Encode: packets in, pages out.
//!     let mut encoder = StreamState::new(0x4d5e);
//!     encoder.packetin(&Packet::new(&b"hello"[..], true, false, 1, 0))?;
//!     encoder.packetin(&Packet::new(&b"ogg"[..], false, true, 2, 1))?;
//!
//!     let mut wire = Vec::new();
//!     while let Some(page) = encoder.pageout()? {
//!         wire.extend_from_slice(&page.to_bytes()?);
//!     }
//!
//!     // Decode: raw bytes in, packets out.
//!     let mut sync = SyncState::new();
//!     let mut decoder = StreamState::new(0x4d5e);
//!     sync.write(&wire)?;
//!     while let Some(page) = sync.pageout()? {
//!         decoder.pagein(&page)?;
//!         while let Some(packet) = decoder.packetout()? {
//!             assert!(packet.payload().is_ok());
//!         }
//!     }
//!     assert!(decoder.eos());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod wire;

mod crc;
mod lifecycle;
mod packet;
mod page;
mod stream;
mod sync;

pub use error::{OggError, ReleasedResourceError, StreamError, SyncError};
pub use packet::Packet;
pub use page::Page;
pub use stream::{StreamState, DEFAULT_PAGE_FILL};
pub use sync::{PageSeek, SyncState, DEFAULT_BUFFER_LIMIT};
