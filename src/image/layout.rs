use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::ops::Range;

use log::{debug, trace};

use super::crc16;

/// Where a field's offset is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    End,
}

/**
 * A little-endian field at a fixed position inside the application binary.
 *
 * For `Anchor::End` the offset is the distance from the end of the file to
 * the first byte of the field.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub anchor: Anchor,
    pub offset: u64,
    pub width: usize,
}

impl Field {
    pub const fn at(name: &'static str, offset: u64, width: usize) -> Self {
        Self {
            name,
            anchor: Anchor::Start,
            offset,
            width,
        }
    }

    pub const fn from_end(name: &'static str, offset: u64, width: usize) -> Self {
        Self {
            name,
            anchor: Anchor::End,
            offset,
            width,
        }
    }

    /// Byte range of the field within a file of `len` bytes.
    pub fn range(&self, len: u64) -> Range<u64> {
        let start = match self.anchor {
            Anchor::Start => self.offset,
            Anchor::End => len - self.offset,
        };
        start..start + self.width as u64
    }

    /// Smallest file that holds this field.
    pub const fn min_len(&self) -> u64 {
        match self.anchor {
            Anchor::Start => self.offset + self.width as u64,
            Anchor::End => self.offset,
        }
    }
}

/**
 * Layout of the application binary, as expected by the serial bootloader:
 *
 *  - 0x1E0..0x1E4 : application size (before the bootloader is appended)
 *  - 0x1E4..0x1E8 : bootloader size
 *  - last 2 bytes : CRC16 over every preceding byte of the application
 *
 * The bootloader image is appended after the checksum, and isn't covered by
 * it.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub app_size: Field,
    pub boot_size: Field,
    pub checksum: Field,
}

pub const LAYOUT: Layout = Layout {
    app_size: Field::at("application size", 0x1E0, 4),
    boot_size: Field::at("bootloader size", 0x1E4, 4),
    checksum: Field::from_end("checksum", 2, 2),
};

impl Layout {
    /**
     * Smallest application binary the layout fits in, without the checksum
     * overlapping either size field.
     */
    pub const fn min_len(&self) -> u64 {
        let a = self.app_size.min_len();
        let b = self.boot_size.min_len();
        let fixed = if a > b { a } else { b };
        fixed + self.checksum.min_len()
    }

    /**
     * Patch both size fields, then compute and store the checksum, in place.
     *
     * The stream must already hold the whole application binary; its length
     * is unchanged. Returns the checksum that was written.
     */
    pub fn patch<F>(&self, image: &mut F, app_len: u32, boot_len: u32) -> io::Result<u16>
    where
        F: Read + Write + Seek,
    {
        let len = image.seek(SeekFrom::End(0))?;
        if len < self.min_len() {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "image is {} bytes, layout needs at least {}",
                    len,
                    self.min_len()
                ),
            ));
        }

        write_field(image, &self.app_size, len, &app_len.to_le_bytes())?;
        write_field(image, &self.boot_size, len, &boot_len.to_le_bytes())?;

        image.seek(SeekFrom::Start(0))?;
        let mut content = Vec::with_capacity(len as usize);
        image.read_to_end(&mut content)?;

        let covered = self.checksum.range(len).start as usize;
        let crc = crc16::checksum(&content[..covered]);
        debug!("CRC16 over {} bytes: 0x{:04X}", covered, crc);

        write_field(image, &self.checksum, len, &crc.to_le_bytes())?;
        Ok(crc)
    }
}

fn write_field<F>(image: &mut F, field: &Field, len: u64, bytes: &[u8]) -> io::Result<()>
where
    F: Write + Seek,
{
    let range = field.range(len);
    trace!(
        "{}: 0x{:X}..0x{:X} <- {:02X?}",
        field.name,
        range.start,
        range.end,
        &bytes[..field.width]
    );
    image.seek(SeekFrom::Start(range.start))?;
    image.write_all(&bytes[..field.width])
}

//----------------------------------------------------------------------------
// Tests
//----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;
    use std::io::Cursor;

    fn random_image(len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut data);
        data
    }

    #[test]
    fn field_ranges() {
        assert_eq!(LAYOUT.app_size.range(1000), 0x1E0..0x1E4);
        assert_eq!(LAYOUT.boot_size.range(1000), 0x1E4..0x1E8);
        assert_eq!(LAYOUT.checksum.range(1000), 998..1000);
    }

    #[test]
    fn minimum_length_keeps_checksum_clear_of_size_fields() {
        assert_eq!(LAYOUT.min_len(), 0x1EA);
        let len = LAYOUT.min_len();
        assert!(LAYOUT.checksum.range(len).start >= LAYOUT.boot_size.range(len).end);
    }

    #[test]
    fn patch_writes_sizes_and_checksum() {
        let original = random_image(1000);
        let mut image = Cursor::new(original.clone());

        let crc = LAYOUT.patch(&mut image, 1000, 200).unwrap();
        let patched = image.into_inner();

        assert_eq!(patched.len(), 1000);
        assert_eq!(&patched[0x1E0..0x1E4], &1000u32.to_le_bytes());
        assert_eq!(&patched[0x1E4..0x1E8], &200u32.to_le_bytes());
        assert_eq!(&patched[998..1000], &crc.to_le_bytes());
        assert_eq!(crc, crc16::checksum(&patched[..998]));

        // Everything else is left alone
        assert_eq!(&patched[..0x1E0], &original[..0x1E0]);
        assert_eq!(&patched[0x1E8..998], &original[0x1E8..998]);
    }

    #[test]
    fn checksum_covers_patched_size_fields() {
        let mut a = Cursor::new(vec![0u8; 600]);
        let mut b = Cursor::new(vec![0u8; 600]);
        let crc_a = LAYOUT.patch(&mut a, 600, 100).unwrap();
        let crc_b = LAYOUT.patch(&mut b, 600, 101).unwrap();
        assert_ne!(crc_a, crc_b);
    }

    #[test]
    fn patch_rejects_short_image() {
        let mut image = Cursor::new(vec![0u8; 0x1E9]);
        let err = LAYOUT.patch(&mut image, 0x1E9, 16).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(image.into_inner(), vec![0u8; 0x1E9]);
    }

    #[test]
    fn patch_at_minimum_length() {
        let len = LAYOUT.min_len() as usize;
        let mut image = Cursor::new(random_image(len));
        let crc = LAYOUT.patch(&mut image, len as u32, 7).unwrap();
        let patched = image.into_inner();
        assert_eq!(&patched[0x1E4..0x1E8], &7u32.to_le_bytes());
        assert_eq!(&patched[len - 2..], &crc.to_le_bytes());
    }
}
