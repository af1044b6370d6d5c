//! Page checksum.
//!
//! Ogg checksums pages with CRC-32, polynomial 0x04c11db7, zero initial
//! value, no bit reflection and no final inversion. That parameter set is
//! not the IEEE variant the common checksum crates implement, so the lookup
//! table is built here at compile time.

const POLY: u32 = 0x04c1_1db7;

const TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut r = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            r = if r & 0x8000_0000 != 0 {
                (r << 1) ^ POLY
            } else {
                r << 1
            };
            bit += 1;
        }
        table[i] = r;
        i += 1;
    }
    table
}

/// Feed `data` into a running checksum.
#[inline]
pub(crate) fn update(mut crc: u32, data: &[u8]) -> u32 {
    for &byte in data {
        crc = (crc << 8) ^ TABLE[(((crc >> 24) as u8) ^ byte) as usize];
    }
    crc
}

/// Checksum of a complete page (header, segment table and body in one
/// slice), computed as if the checksum field at offsets 22..26 were zero.
pub(crate) fn page_checksum(page: &[u8]) -> u32 {
    let crc = update(0, &page[..22]);
    let crc = update(crc, &[0u8; 4]);
    update(crc, &page[26..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_zero() {
        assert_eq!(update(0, &[]), 0);
        assert_eq!(update(0, &[0x00]), 0);
    }

    #[test]
    fn test_single_byte_values() {
        // Table entries for small indices fall out of the polynomial
        // directly: one shift cycle of 0x01 is POLY itself, of 0x02 its
        // left shift.
        assert_eq!(update(0, &[0x01]), POLY);
        assert_eq!(update(0, &[0x02]), POLY << 1);
    }

    #[test]
    fn test_check_string() {
        // "123456789" under poly 0x04c11db7, init 0, no reflection, no
        // xorout.
        assert_eq!(update(0, b"123456789"), 0x89a1_897f);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let one_shot = update(0, data);
        let mut crc = 0;
        for chunk in data.chunks(7) {
            crc = update(crc, chunk);
        }
        assert_eq!(crc, one_shot);
    }

    #[test]
    fn test_page_checksum_ignores_stored_field() {
        let mut page = vec![0xabu8; 40];
        let base = page_checksum(&page);

        page[22..26].copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(page_checksum(&page), base);

        // Any other byte does change it.
        page[30] ^= 0x01;
        assert_ne!(page_checksum(&page), base);
    }

    #[test]
    fn test_detects_single_bit_flips() {
        let data = b"OggS framing test vector";
        let base = update(0, data);
        for i in 0..data.len() {
            for bit in 0..8 {
                let mut flipped = data.to_vec();
                flipped[i] ^= 1 << bit;
                assert_ne!(update(0, &flipped), base, "flip at byte {i} bit {bit}");
            }
        }
    }
}
