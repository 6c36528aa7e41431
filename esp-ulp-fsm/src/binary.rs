//! # ULP binary images
//!
//! ## Overview
//!
//! The ULP toolchain links programs into a small image: a 12 byte header
//! followed by the text and data sections. The `.bss` section is not stored,
//! only its size. [`load_binary`] checks the header against the image and
//! the memory reservation, copies text and data and zeroes the `.bss`
//! region behind them.
//!
//! | offset | size | field         |
//! |--------|------|---------------|
//! | 0      | 4    | magic `ulp\0` |
//! | 4      | 2    | text offset   |
//! | 6      | 2    | text size     |
//! | 8      | 2    | data size     |
//! | 10     | 2    | bss size      |
//!
//! All fields are little endian. The text offset is counted from the start
//! of the image and normally equals the header size.

use crate::{Error, memory::SlowMemory};

/// Magic word at the start of every image (`"ulp\0"`).
pub const BINARY_MAGIC: u32 = 0x0070_6c75;

/// Size of the image header in bytes.
pub const HEADER_SIZE: usize = 12;

/// Parsed header of a ULP binary image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BinaryHeader {
    /// Magic word, [`BINARY_MAGIC`] for a valid image.
    pub magic: u32,
    /// Offset of the text section from the start of the image.
    pub text_offset: u16,
    /// Size of the text section in bytes.
    pub text_size: u16,
    /// Size of the data section in bytes.
    pub data_size: u16,
    /// Size of the zero initialized section in bytes.
    pub bss_size: u16,
}

impl BinaryHeader {
    /// Parses the header at the start of `image`.
    ///
    /// Only the length is checked here, see [`BinaryHeader::validate`].
    pub fn parse(image: &[u8]) -> Result<Self, Error> {
        let Some(header) = image.first_chunk::<HEADER_SIZE>() else {
            return Err(Error::InvalidSize);
        };

        let u16_at = |offset: usize| u16::from_le_bytes([header[offset], header[offset + 1]]);

        Ok(Self {
            magic: u32::from_le_bytes([header[0], header[1], header[2], header[3]]),
            text_offset: u16_at(4),
            text_size: u16_at(6),
            data_size: u16_at(8),
            bss_size: u16_at(10),
        })
    }

    /// Checks the magic word and that the section sizes add up to
    /// `image_len`.
    pub fn validate(&self, image_len: usize) -> Result<(), Error> {
        if self.magic != BINARY_MAGIC {
            warn!("Invalid ULP binary magic {:#x}", self.magic);
            return Err(Error::InvalidMagic);
        }

        let expected = self.text_offset as usize + self.text_size as usize + self.data_size as usize;
        if expected != image_len {
            warn!(
                "ULP binary size mismatch: header says {}, image is {} bytes",
                expected, image_len
            );
            return Err(Error::InvalidSize);
        }

        Ok(())
    }

    /// Bytes the program occupies once loaded: text, data and bss.
    pub fn load_size(&self) -> usize {
        self.text_size as usize + self.data_size as usize + self.bss_size as usize
    }
}

/// Loads `image` at word `load_addr` of `mem`.
///
/// Only the first `reserved_bytes` bytes of `mem` may be used.
pub fn load_binary<M>(
    mem: &mut M,
    reserved_bytes: usize,
    load_addr: usize,
    image: &[u8],
) -> Result<BinaryHeader, Error>
where
    M: SlowMemory + ?Sized,
{
    if reserved_bytes > mem.len_words() * 4 {
        return Err(Error::InvalidArgument);
    }

    let header = BinaryHeader::parse(image)?;

    let base = load_addr.checked_mul(4).unwrap_or(usize::MAX);
    if base > reserved_bytes {
        warn!("Load address {:#x} is past the reserved {} bytes", base, reserved_bytes);
        return Err(Error::LoadAddressOutOfRange);
    }
    if base + image.len() > reserved_bytes {
        warn!(
            "Image of {} bytes at {:#x} does not fit into the reserved {} bytes",
            image.len(),
            base,
            reserved_bytes
        );
        return Err(Error::SizeTooBig);
    }

    header.validate(image.len())?;

    if base + header.load_size() > reserved_bytes {
        warn!(
            "Image needs {} bytes at {:#x}, only {} bytes reserved",
            header.load_size(),
            base,
            reserved_bytes
        );
        return Err(Error::SizeTooBig);
    }

    let sections = &image[header.text_offset as usize..];
    mem.write_bytes(base, sections);
    mem.fill_bytes(base + sections.len(), header.bss_size as usize, 0);

    debug!(
        "Loaded ULP binary at {:#x}: text {} data {} bss {}",
        base, header.text_size, header.data_size, header.bss_size
    );

    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(text: &[u8], data: &[u8], bss: u16) -> ([u8; 64], usize) {
        let mut buf = [0u8; 64];
        buf[..4].copy_from_slice(&BINARY_MAGIC.to_le_bytes());
        buf[4..6].copy_from_slice(&(HEADER_SIZE as u16).to_le_bytes());
        buf[6..8].copy_from_slice(&(text.len() as u16).to_le_bytes());
        buf[8..10].copy_from_slice(&(data.len() as u16).to_le_bytes());
        buf[10..12].copy_from_slice(&bss.to_le_bytes());
        buf[12..][..text.len()].copy_from_slice(text);
        buf[12 + text.len()..][..data.len()].copy_from_slice(data);
        (buf, HEADER_SIZE + text.len() + data.len())
    }

    #[test]
    fn header_layout() {
        let (buf, len) = image(&[0; 8], &[0; 4], 6);
        let header = BinaryHeader::parse(&buf[..len]).unwrap();

        assert_eq!(
            header,
            BinaryHeader {
                magic: BINARY_MAGIC,
                text_offset: 12,
                text_size: 8,
                data_size: 4,
                bss_size: 6,
            }
        );
        assert_eq!(&buf[..4], b"ulp\0");
        assert_eq!(header.load_size(), 18);
        assert_eq!(header.validate(len), Ok(()));
    }

    #[test]
    fn copies_sections_and_clears_bss() {
        let (buf, len) = image(&[1, 2, 3, 4, 5, 6, 7, 8], &[9, 10], 6);
        let mut mem = [0xffff_ffffu32; 8];

        load_binary(&mut mem[..], 32, 1, &buf[..len]).unwrap();

        assert_eq!(mem[0], 0xffff_ffff);
        assert_eq!(mem[1..3], [0x0403_0201, 0x0807_0605]);
        // data then six bss bytes
        assert_eq!(mem[3], 0x0000_0a09);
        assert_eq!(mem[4], 0x0000_0000);
        assert_eq!(mem[5], 0xffff_ffff);
    }

    #[test]
    fn rejects_bad_images() {
        let (buf, len) = image(&[0; 8], &[], 0);
        let mut mem = [0u32; 16];

        assert_eq!(load_binary(&mut mem[..], 64, 0, &buf[..11]), Err(Error::InvalidSize));
        assert_eq!(
            load_binary(&mut mem[..], 64, 17, &buf[..len]),
            Err(Error::LoadAddressOutOfRange)
        );
        assert_eq!(
            load_binary(&mut mem[..], 64, usize::MAX / 2, &buf[..len]),
            Err(Error::LoadAddressOutOfRange)
        );
        assert_eq!(load_binary(&mut mem[..], 64, 12, &buf[..len]), Err(Error::SizeTooBig));
        assert_eq!(load_binary(&mut mem[..], 128, 0, &buf[..len]), Err(Error::InvalidArgument));

        let mut bad_magic = buf;
        bad_magic[3] = 1;
        assert_eq!(load_binary(&mut mem[..], 64, 0, &bad_magic[..len]), Err(Error::InvalidMagic));

        // a trailing byte the header does not account for
        assert_eq!(load_binary(&mut mem[..], 64, 0, &buf[..len + 1]), Err(Error::InvalidSize));

        // the image fits but its bss does not
        let (buf, len) = image(&[0; 8], &[], 40);
        assert_eq!(load_binary(&mut mem[..], 48, 1, &buf[..len]), Err(Error::SizeTooBig));
        assert_eq!(load_binary(&mut mem[..], 48, 0, &buf[..len]).map(|h| h.bss_size), Ok(40));

        assert!(mem[12..].iter().all(|word| *word == 0));
    }
}
