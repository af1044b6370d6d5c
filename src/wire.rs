//! On-wire page layout.
//!
//! Every page starts with a fixed 27-byte header, followed by the segment
//! table and the body:
//!
//! ```text
//! Offset  Size  Field
//! 0       4     capture pattern "OggS" (0x4F 0x67 0x67 0x53)
//! 4       1     version (always 0)
//! 5       1     header type (bit 0: continued, bit 1: bos, bit 2: eos)
//! 6       8     granule position (i64, little-endian)
//! 14      4     serial number (u32, little-endian)
//! 18      4     page sequence number (u32, little-endian)
//! 22      4     checksum (u32, little-endian, see `crc`)
//! 26      1     segment count
//! 27      N     segment table: one lacing value per segment
//! 27+N    ...   body: the segments' bytes, concatenated
//! ```
//!
//! Lacing: a packet occupies a run of segments. Every lacing value of 255
//! means "255 bytes of this packet, more follow"; the first smaller value
//! ends it. A packet whose length is an exact multiple of 255 therefore
//! ends with an explicit 0-valued segment, which is also how a zero-length
//! packet is written.

use crate::crc;

/// Byte length of the fixed page header (capture pattern through segment
/// count; segment table excluded).
pub const HEADER_SIZE: usize = 27;

/// Capture pattern opening every page.
pub const CAPTURE_PATTERN: [u8; 4] = *b"OggS";

/// Maximum number of segments in one page's lacing table.
pub const MAX_SEGMENTS: usize = 255;

/// Maximum body bytes one page can carry (255 segments of 255 bytes).
pub const MAX_BODY_SIZE: usize = MAX_SEGMENTS * 255;

/// Maximum total page size: fixed header + full segment table + full body.
pub const MAX_PAGE_SIZE: usize = HEADER_SIZE + MAX_SEGMENTS + MAX_BODY_SIZE;

/// Header-type flag bits (offset 5).
pub mod flags {
    /// The page's first segment continues a packet from the previous page.
    pub const CONTINUED: u8 = 0x01;

    /// First page of the logical stream.
    pub const BOS: u8 = 0x02;

    /// Last page of the logical stream.
    pub const EOS: u8 = 0x04;

    /// Check whether a header-type byte has the given flag set.
    ///
    /// # Example
    ///
    /// ```
    /// use oggframe::wire::flags;
    ///
    /// assert!(flags::has_flag(flags::BOS | flags::EOS, flags::BOS));
    /// assert!(!flags::has_flag(flags::BOS, flags::CONTINUED));
    /// ```
    #[inline]
    pub fn has_flag(header_type: u8, flag: u8) -> bool {
        header_type & flag != 0
    }
}

/// Decoded fixed page header.
///
/// The segment table is not part of this struct; it follows the fixed
/// header on the wire and stays with the raw page bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    /// Format version, always 0.
    pub version: u8,
    /// Header-type bitfield, see [`flags`].
    pub header_type: u8,
    /// Position of the last packet completed on this page in codec units,
    /// -1 when no packet ends here.
    pub granule_position: i64,
    /// Serial number of the logical stream this page belongs to.
    pub serial_number: u32,
    /// Position of this page within its stream.
    pub page_sequence: u32,
    /// CRC over the whole page with this field zeroed.
    pub checksum: u32,
    /// Number of lacing values in the segment table.
    pub segment_count: u8,
}

impl PageHeader {
    /// Decode the fixed header from the start of `buf`.
    ///
    /// Returns `None` if `buf` is shorter than [`HEADER_SIZE`] or does not
    /// begin with the capture pattern.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE || buf[0..4] != CAPTURE_PATTERN {
            return None;
        }
        Some(Self {
            version: buf[4],
            header_type: buf[5],
            granule_position: i64::from_le_bytes([
                buf[6], buf[7], buf[8], buf[9], buf[10], buf[11], buf[12], buf[13],
            ]),
            serial_number: u32::from_le_bytes([buf[14], buf[15], buf[16], buf[17]]),
            page_sequence: u32::from_le_bytes([buf[18], buf[19], buf[20], buf[21]]),
            checksum: u32::from_le_bytes([buf[22], buf[23], buf[24], buf[25]]),
            segment_count: buf[26],
        })
    }

    /// Encode the fixed header into the first [`HEADER_SIZE`] bytes of
    /// `buf`.
    ///
    /// # Panics
    ///
    /// Panics if `buf` is shorter than [`HEADER_SIZE`].
    pub fn encode_into(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&CAPTURE_PATTERN);
        buf[4] = self.version;
        buf[5] = self.header_type;
        buf[6..14].copy_from_slice(&self.granule_position.to_le_bytes());
        buf[14..18].copy_from_slice(&self.serial_number.to_le_bytes());
        buf[18..22].copy_from_slice(&self.page_sequence.to_le_bytes());
        buf[22..26].copy_from_slice(&self.checksum.to_le_bytes());
        buf[26] = self.segment_count;
    }

    /// Total header length on the wire: fixed part plus segment table.
    #[inline]
    pub fn header_len(&self) -> usize {
        HEADER_SIZE + self.segment_count as usize
    }

    /// The page's first segment continues a packet from the previous page.
    #[inline]
    pub fn is_continued(&self) -> bool {
        flags::has_flag(self.header_type, flags::CONTINUED)
    }

    /// First page of the logical stream.
    #[inline]
    pub fn is_bos(&self) -> bool {
        flags::has_flag(self.header_type, flags::BOS)
    }

    /// Last page of the logical stream.
    #[inline]
    pub fn is_eos(&self) -> bool {
        flags::has_flag(self.header_type, flags::EOS)
    }
}

/// Stamp the checksum of a fully assembled page into offsets 22..26.
///
/// `page` must hold the complete page: fixed header, segment table and
/// body. The CRC is computed as if the checksum field were zero, then
/// written over it. Useful after patching header fields (for example
/// rewriting the granule position) to restore checksum validity.
///
/// # Panics
///
/// Panics if `page` is shorter than [`HEADER_SIZE`].
pub fn set_page_checksum(page: &mut [u8]) {
    let sum = crc::page_checksum(page);
    page[22..26].copy_from_slice(&sum.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> PageHeader {
        PageHeader {
            version: 0,
            header_type: flags::BOS,
            granule_position: 0x0102_0304_0506_0708,
            serial_number: 0xdead_beef,
            page_sequence: 7,
            checksum: 0x1122_3344,
            segment_count: 2,
        }
    }

    #[test]
    fn test_encode_byte_positions() {
        let mut buf = [0u8; HEADER_SIZE];
        sample_header().encode_into(&mut buf);

        assert_eq!(&buf[0..4], b"OggS");
        assert_eq!(buf[4], 0);
        assert_eq!(buf[5], flags::BOS);
        // Little-endian granule position.
        assert_eq!(
            &buf[6..14],
            &[0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]
        );
        assert_eq!(&buf[14..18], &[0xef, 0xbe, 0xad, 0xde]);
        assert_eq!(&buf[18..22], &[0x07, 0x00, 0x00, 0x00]);
        assert_eq!(&buf[22..26], &[0x44, 0x33, 0x22, 0x11]);
        assert_eq!(buf[26], 2);
    }

    #[test]
    fn test_decode_roundtrip() {
        let header = sample_header();
        let mut buf = [0u8; HEADER_SIZE];
        header.encode_into(&mut buf);

        let decoded = PageHeader::decode(&buf).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.header_len(), HEADER_SIZE + 2);
    }

    #[test]
    fn test_decode_negative_granule() {
        let mut header = sample_header();
        header.granule_position = -1;
        let mut buf = [0u8; HEADER_SIZE];
        header.encode_into(&mut buf);

        assert_eq!(&buf[6..14], &[0xff; 8]);
        assert_eq!(PageHeader::decode(&buf).unwrap().granule_position, -1);
    }

    #[test]
    fn test_decode_rejects_short_buffer() {
        let mut buf = [0u8; HEADER_SIZE];
        sample_header().encode_into(&mut buf);
        assert!(PageHeader::decode(&buf[..HEADER_SIZE - 1]).is_none());
        assert!(PageHeader::decode(&[]).is_none());
    }

    #[test]
    fn test_decode_rejects_bad_capture() {
        let mut buf = [0u8; HEADER_SIZE];
        sample_header().encode_into(&mut buf);
        buf[2] = b'x';
        assert!(PageHeader::decode(&buf).is_none());
    }

    #[test]
    fn test_flag_accessors() {
        let mut header = sample_header();
        header.header_type = flags::CONTINUED | flags::EOS;
        assert!(header.is_continued());
        assert!(!header.is_bos());
        assert!(header.is_eos());
    }

    #[test]
    fn test_set_page_checksum_validates() {
        // Fixed header + 1-entry segment table + 3-byte body.
        let mut page = vec![0u8; HEADER_SIZE + 1 + 3];
        let header = PageHeader {
            segment_count: 1,
            checksum: 0,
            ..sample_header()
        };
        header.encode_into(&mut page);
        page[HEADER_SIZE] = 3;
        page[HEADER_SIZE + 1..].copy_from_slice(b"abc");

        set_page_checksum(&mut page);

        let stored = u32::from_le_bytes([page[22], page[23], page[24], page[25]]);
        assert_ne!(stored, 0);
        assert_eq!(stored, crate::crc::page_checksum(&page));

        // Stamping twice is stable.
        let snapshot = page.clone();
        set_page_checksum(&mut page);
        assert_eq!(page, snapshot);
    }
}
