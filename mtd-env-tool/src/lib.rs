//! Host side generator and parser for `mtd-env` environment images.
//!
//! The text form holds one `name=value` per line. Empty lines and lines starting with `#` are
//! ignored, CRLF line endings are accepted.

pub mod error;

use std::fs;
use std::path::Path;

use crc::{
    Crc,
    CRC_32_ISO_HDLC,
};
pub use error::Error;
use mtd_env::{
    EnvImage,
    Import,
};
pub use mtd_env::{
    EnvTable,
    Layout,
};

/// Flags byte of a generated redundant image. A freshly flashed board only has this copy, the
/// first save on the target goes to the other one.
pub const REDUNDANT_FLAGS: u8 = 1;

/// Value the data region behind the variables is filled with unless told otherwise.
pub const DEFAULT_PAD: u8 = 0xFF;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// CRC32 as stored in the image header, identical to zlib's `crc32(0, data)`.
pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// The variables of one environment image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    pub table: EnvTable,
}

impl EnvFile {
    /// Parse the text form.
    pub fn from_text(content: &[u8]) -> Result<Self, Error> {
        let mut table = EnvTable::new();
        table.import(content, &Import::text().crlf_is_lf(true))?;
        Ok(Self { table })
    }

    pub fn from_text_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let content = fs::read(path)?;
        Self::from_text(&content)
    }

    /// Text form, sorted by name. Hidden variables are included.
    pub fn to_text(&self) -> String {
        self.table.export_text(true)
    }

    pub fn to_text_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        fs::write(path, self.to_text())?;
        Ok(())
    }

    /// Build an image of `size` bytes, ready to be written to the environment offset.
    pub fn generate(&self, size: usize, layout: Layout, pad: u8) -> Result<Vec<u8>, Error> {
        let header = layout.header_size();
        if size <= header {
            return Err(Error::InvalidImageSize(size, header));
        }

        let image = EnvImage::encode(&self.table, size, layout, REDUNDANT_FLAGS, pad, crc32)?;
        Ok(image)
    }

    pub fn generate_image_file<P: AsRef<Path>>(
        &self,
        path: P,
        size: usize,
        layout: Layout,
        pad: u8,
    ) -> Result<(), Error> {
        let image = self.generate(size, layout, pad)?;
        fs::write(path, image)?;
        Ok(())
    }

    /// Verify and parse an image. The whole buffer is taken as the image.
    pub fn parse(image: &[u8], layout: Layout) -> Result<Self, Error> {
        let header = layout.header_size();
        if image.len() <= header {
            return Err(Error::InvalidImageSize(image.len(), header));
        }

        let table = EnvImage::from_bytes(image, layout, crc32)?.to_table()?;
        Ok(Self { table })
    }

    pub fn parse_image_file<P: AsRef<Path>>(path: P, layout: Layout) -> Result<Self, Error> {
        let image = fs::read(path)?;
        Self::parse(&image, layout)
    }

    /// Like [`EnvFile::parse`], additionally checking the image has the expected size.
    pub fn parse_sized(image: &[u8], size: usize, layout: Layout) -> Result<Self, Error> {
        if image.len() != size {
            return Err(Error::SizeMismatch {
                expected: size,
                actual: image.len(),
            });
        }
        Self::parse(image, layout)
    }
}
