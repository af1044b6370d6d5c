//! Page views.

use bytes::Bytes;

use crate::error::ReleasedResourceError;
use crate::lifecycle::ReleaseFlag;
use crate::wire::{PageHeader, HEADER_SIZE};

/// One on-wire frame: fixed header, segment table and body.
///
/// Pages are produced by [`SyncState::pageout`](crate::SyncState::pageout)
/// (decode direction) or [`StreamState::pageout`](crate::StreamState::pageout)
/// and [`flush`](crate::StreamState::flush) (encode direction); they cannot
/// be built directly. Header fields are decoded eagerly and stay readable
/// for the life of the view; the raw byte accessors check that the
/// producing state has not been released.
#[derive(Debug, Clone)]
pub struct Page {
    meta: PageHeader,
    /// Fixed header plus segment table.
    header: Bytes,
    body: Bytes,
    owner: ReleaseFlag,
}

impl Page {
    pub(crate) fn from_parts(
        meta: PageHeader,
        header: Bytes,
        body: Bytes,
        owner: ReleaseFlag,
    ) -> Self {
        Self {
            meta,
            header,
            body,
            owner,
        }
    }

    /// Format version; 0 for every stream this engine produces.
    #[inline]
    pub fn version(&self) -> u8 {
        self.meta.version
    }

    /// The page's first segment continues a packet from the previous page.
    #[inline]
    pub fn continued(&self) -> bool {
        self.meta.is_continued()
    }

    /// First page of the logical stream.
    #[inline]
    pub fn bos(&self) -> bool {
        self.meta.is_bos()
    }

    /// Last page of the logical stream.
    #[inline]
    pub fn eos(&self) -> bool {
        self.meta.is_eos()
    }

    /// Position of the last packet completed on this page in codec units,
    /// -1 when no packet ends here.
    #[inline]
    pub fn granule_position(&self) -> i64 {
        self.meta.granule_position
    }

    /// Serial number of the logical stream this page belongs to.
    #[inline]
    pub fn serial_number(&self) -> u32 {
        self.meta.serial_number
    }

    /// Position of this page within its stream.
    #[inline]
    pub fn page_sequence_number(&self) -> u32 {
        self.meta.page_sequence
    }

    /// Number of packets completed on this page. Fragments continued onto
    /// the next page do not count.
    pub fn packet_count(&self) -> usize {
        self.header[HEADER_SIZE..].iter().filter(|&&v| v < 255).count()
    }

    /// Body length in bytes.
    #[inline]
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Raw header bytes: fixed header plus segment table.
    ///
    /// Fails with [`ReleasedResourceError`] once the producing state has
    /// been released.
    pub fn header_bytes(&self) -> Result<&[u8], ReleasedResourceError> {
        self.owner.ensure_active()?;
        Ok(&self.header)
    }

    /// Raw body bytes. An empty body is a valid result, not an error.
    ///
    /// Fails with [`ReleasedResourceError`] once the producing state has
    /// been released.
    pub fn body_bytes(&self) -> Result<&[u8], ReleasedResourceError> {
        self.owner.ensure_active()?;
        Ok(&self.body)
    }

    /// The complete page as written to the wire: header then body.
    ///
    /// Fails with [`ReleasedResourceError`] once the producing state has
    /// been released.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ReleasedResourceError> {
        self.owner.ensure_active()?;
        let mut out = Vec::with_capacity(self.header.len() + self.body.len());
        out.extend_from_slice(&self.header);
        out.extend_from_slice(&self.body);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{self, flags};

    fn sample_page(owner: ReleaseFlag) -> Page {
        // Two segments: a 5-byte packet and the first 255 bytes of a
        // larger one continuing onto the next page.
        let meta = PageHeader {
            version: 0,
            header_type: flags::BOS,
            granule_position: 77,
            serial_number: 0x5150,
            page_sequence: 3,
            checksum: 0,
            segment_count: 2,
        };
        let mut raw = vec![0u8; HEADER_SIZE + 2];
        meta.encode_into(&mut raw);
        raw[HEADER_SIZE] = 5;
        raw[HEADER_SIZE + 1] = 255;

        let mut body = vec![0xaau8; 5];
        body.extend_from_slice(&[0xbb; 255]);
        raw.extend_from_slice(&body);
        wire::set_page_checksum(&mut raw);

        let meta = PageHeader::decode(&raw).unwrap();
        let raw = Bytes::from(raw);
        let header = raw.slice(..HEADER_SIZE + 2);
        let body = raw.slice(HEADER_SIZE + 2..);
        Page::from_parts(meta, header, body, owner)
    }

    #[test]
    fn test_metadata_accessors() {
        let page = sample_page(ReleaseFlag::new());
        assert_eq!(page.version(), 0);
        assert!(page.bos());
        assert!(!page.eos());
        assert!(!page.continued());
        assert_eq!(page.granule_position(), 77);
        assert_eq!(page.serial_number(), 0x5150);
        assert_eq!(page.page_sequence_number(), 3);
        assert_eq!(page.body_len(), 260);
    }

    #[test]
    fn test_packet_count_ignores_continuations() {
        let page = sample_page(ReleaseFlag::new());
        // One terminal segment (5), one continuation segment (255).
        assert_eq!(page.packet_count(), 1);
    }

    #[test]
    fn test_to_bytes_is_header_then_body() {
        let page = sample_page(ReleaseFlag::new());
        let raw = page.to_bytes().unwrap();
        assert_eq!(&raw[..HEADER_SIZE + 2], page.header_bytes().unwrap());
        assert_eq!(&raw[HEADER_SIZE + 2..], page.body_bytes().unwrap());
    }

    #[test]
    fn test_byte_accessors_guarded_after_release() {
        let owner = ReleaseFlag::new();
        let page = sample_page(owner.clone());

        owner.release();

        assert_eq!(page.header_bytes(), Err(ReleasedResourceError));
        assert_eq!(page.body_bytes(), Err(ReleasedResourceError));
        assert!(page.to_bytes().is_err());
        // Decoded metadata is still there.
        assert_eq!(page.serial_number(), 0x5150);
        assert_eq!(page.packet_count(), 1);
    }
}
