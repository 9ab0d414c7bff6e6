//! On-flash layout of the environment image.
//!
//! ```text
//! single:    | crc32 (u32 LE) | data ...                |
//! redundant: | crc32 (u32 LE) | flags (u8) | data ...   |
//! ```
//!
//! The checksum covers the whole data region, including the padding behind the terminating
//! empty entry. The flags byte is a wrapping serial number that tells which of the two
//! redundant copies was written last.

use crate::error::Error;
use crate::platform::FnCrc32;
use crate::table::{EnvTable, Import};
use alloc::vec::Vec;
use core::mem::size_of;

pub(crate) const CRC_SIZE: usize = size_of::<u32>();
pub(crate) const FLAGS_SIZE: usize = size_of::<u8>();

/// Whether the image carries the flags byte used to arbitrate between two redundant copies.
#[derive(strum::Display, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Layout {
    Single,
    Redundant,
}

impl Layout {
    pub const fn header_size(&self) -> usize {
        match self {
            Layout::Single => CRC_SIZE,
            Layout::Redundant => CRC_SIZE + FLAGS_SIZE,
        }
    }
}

/// A checksum verified view into an environment image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvImage<'a> {
    crc: u32,
    flags: Option<u8>,
    data: &'a [u8],
}

impl<'a> EnvImage<'a> {
    /// Parse `raw` and verify the checksum over the data region.
    pub fn from_bytes(raw: &'a [u8], layout: Layout, crc32: FnCrc32) -> Result<Self, Error> {
        let header = layout.header_size();
        if raw.len() <= header {
            return Err(Error::InvalidSize);
        }

        let mut crc = [0u8; CRC_SIZE];
        crc.copy_from_slice(&raw[..CRC_SIZE]);
        let crc = u32::from_le_bytes(crc);
        let flags = match layout {
            Layout::Single => None,
            Layout::Redundant => Some(raw[CRC_SIZE]),
        };
        let data = &raw[header..];

        if crc32(data) != crc {
            return Err(Error::BadCrc);
        }

        Ok(Self { crc, flags, data })
    }

    pub fn crc(&self) -> u32 {
        self.crc
    }

    /// The redundancy serial, `None` for single copy images.
    pub fn flags(&self) -> Option<u8> {
        self.flags
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Parse the data region into a fresh table.
    pub fn to_table(&self) -> Result<EnvTable, Error> {
        let mut table = EnvTable::new();
        table.import(self.data, &Import::binary().clear(true))?;
        Ok(table)
    }

    /// Serialize `table` into `buf`, which spans the whole image. The data region behind the
    /// terminating empty entry is filled with `fill`. `flags` is ignored for single copy images.
    pub fn encode_into(
        buf: &mut [u8],
        table: &EnvTable,
        layout: Layout,
        flags: u8,
        fill: u8,
        crc32: FnCrc32,
    ) -> Result<(), Error> {
        let header = layout.header_size();
        if buf.len() <= header {
            return Err(Error::InvalidSize);
        }

        let (head, data) = buf.split_at_mut(header);
        let used = table.export_binary(data)?;
        data[used..].fill(fill);

        head[..CRC_SIZE].copy_from_slice(&crc32(data).to_le_bytes());
        if layout == Layout::Redundant {
            head[CRC_SIZE] = flags;
        }
        Ok(())
    }

    /// Allocating variant of [`EnvImage::encode_into`] producing an image of `size` bytes.
    pub fn encode(
        table: &EnvTable,
        size: usize,
        layout: Layout,
        flags: u8,
        fill: u8,
        crc32: FnCrc32,
    ) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(size).map_err(|_| Error::OutOfMemory)?;
        buf.resize(size, fill);
        Self::encode_into(&mut buf, table, layout, flags, fill, crc32)?;
        Ok(buf)
    }
}

/// Decide which of two redundant copies is current. Arguments are the flags of the copies whose
/// checksum verified. Returns `None` if neither did.
pub(crate) fn pick_redundant(primary: Option<u8>, secondary: Option<u8>) -> Option<Slot> {
    match (primary, secondary) {
        (None, None) => None,
        (Some(_), None) => Some(Slot::Primary),
        (None, Some(_)) => Some(Slot::Secondary),
        // the serial wrapped around
        (Some(u8::MAX), Some(0)) => Some(Slot::Secondary),
        (Some(0), Some(u8::MAX)) => Some(Slot::Primary),
        (Some(p), Some(s)) if s > p => Some(Slot::Secondary),
        // equal serials shouldn't happen, the primary wins
        (Some(_), Some(_)) => Some(Slot::Primary),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum Slot {
    Primary,
    Secondary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn crc32(data: &[u8]) -> u32 {
        unsafe { libz_sys::crc32(0, data.as_ptr(), data.len() as u32) as u32 }
    }

    #[test]
    fn pick_newer_copy() {
        assert_eq!(pick_redundant(None, None), None);
        assert_eq!(pick_redundant(Some(3), None), Some(Slot::Primary));
        assert_eq!(pick_redundant(None, Some(3)), Some(Slot::Secondary));
        assert_eq!(pick_redundant(Some(3), Some(4)), Some(Slot::Secondary));
        assert_eq!(pick_redundant(Some(4), Some(3)), Some(Slot::Primary));
        assert_eq!(pick_redundant(Some(5), Some(5)), Some(Slot::Primary));
    }

    #[test]
    fn pick_after_wrap() {
        assert_eq!(pick_redundant(Some(0xFF), Some(0)), Some(Slot::Secondary));
        assert_eq!(pick_redundant(Some(0), Some(0xFF)), Some(Slot::Primary));
        assert_eq!(pick_redundant(Some(0xFE), Some(0xFF)), Some(Slot::Secondary));
    }

    #[test]
    fn redundant_header() {
        let table: EnvTable = [("a", "1")].into_iter().collect();
        let image = EnvImage::encode(&table, 32, Layout::Redundant, 9, 0xFF, crc32).unwrap();

        assert_eq!(image[4], 9);
        assert_eq!(&image[5..10], b"a=1\0\0");
        assert!(image[10..].iter().all(|&b| b == 0xFF));

        let parsed = EnvImage::from_bytes(&image, Layout::Redundant, crc32).unwrap();
        assert_eq!(parsed.flags(), Some(9));
        assert_eq!(parsed.crc(), crc32(&image[5..]));
        assert_eq!(parsed.to_table().unwrap(), table);

        // the flags byte is not covered by the checksum
        let mut image = image;
        image[4] = 10;
        let parsed = EnvImage::from_bytes(&image, Layout::Redundant, crc32).unwrap();
        assert_eq!(parsed.flags(), Some(10));
    }

    #[test]
    fn corrupted_image() {
        let table: EnvTable = [("a", "1")].into_iter().collect();
        let mut image = EnvImage::encode(&table, 16, Layout::Single, 0, 0, crc32).unwrap();
        image[7] ^= 0x10;

        assert_eq!(
            EnvImage::from_bytes(&image, Layout::Single, crc32),
            Err(Error::BadCrc)
        );
        assert_eq!(
            EnvImage::from_bytes(&image[..4], Layout::Single, crc32),
            Err(Error::InvalidSize)
        );
    }

    #[test]
    fn encode_too_large() {
        let table: EnvTable = [("name", "value")].into_iter().collect();
        assert_eq!(
            EnvImage::encode(&table, 12, Layout::Single, 0, 0, crc32),
            Err(Error::EnvironmentTooLarge)
        );
    }
}
