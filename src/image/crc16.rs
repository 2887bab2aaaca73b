/**
 * CRC16 used by the serial bootloader to validate the application region.
 *
 * Polynomial 0x1021, MSB-first, zero initial state, no reflection and no
 * final XOR (the same parameters as CRC-16/XMODEM).
 */
pub const ALGORITHM: crc::Algorithm<u16> = crc::Algorithm {
    width: 16,
    poly: 0x1021,
    init: 0x0000,
    refin: false,
    refout: false,
    xorout: 0x0000,
    check: 0x31c3,
    residue: 0x0000,
};

const TOP_BIT: u32 = 0x8000;

/**
 * Bit-by-bit CRC16 over `data`.
 *
 * The running value is carried unmasked between bytes and only truncated to
 * 16 bits on return. Bits shifted past bit 31 are simply dropped, and bits
 * above bit 15 never feed back into the low half.
 */
pub fn checksum(data: &[u8]) -> u16 {
    let poly = ALGORITHM.poly as u32;
    let mut crc: u32 = 0;

    for &b in data.iter() {
        crc ^= (b as u32) << 8;
        for _ in 0..8 {
            if crc & TOP_BIT != 0 {
                crc = (crc << 1) ^ poly;
            } else {
                crc <<= 1;
            }
        }
    }

    (crc & 0xffff) as u16
}

//----------------------------------------------------------------------------
// Tests
//----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, RngCore};

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(checksum(&[]), 0x0000);
    }

    #[test]
    fn single_zero_byte_is_zero() {
        assert_eq!(checksum(&[0x00]), 0x0000);
    }

    #[test]
    fn check_value_matches_xmodem() {
        assert_eq!(checksum(b"123456789"), 0x31c3);
        assert_eq!(checksum(b"123456789"), ALGORITHM.check);
    }

    #[test]
    fn agrees_with_crc_crate_on_random_buffers() {
        let oracle = crc::Crc::<u16>::new(&ALGORITHM);
        let xmodem = crc::Crc::<u16>::new(&crc::CRC_16_XMODEM);
        let mut rng = rand::thread_rng();

        for _ in 0..64 {
            let len = rng.gen_range(0..2048);
            let mut data = vec![0u8; len];
            rng.fill_bytes(&mut data);

            let crc = checksum(&data);
            assert_eq!(crc, oracle.checksum(&data), "len = {}", len);
            assert_eq!(crc, xmodem.checksum(&data), "len = {}", len);
        }
    }

    #[test]
    fn depends_only_on_content() {
        let a = b"bootloader".to_vec();
        let b = a.clone();
        assert_eq!(checksum(&a), checksum(&a));
        assert_eq!(checksum(&a), checksum(&b));
        assert_ne!(checksum(&a), checksum(&a[..a.len() - 1]));
    }
}
