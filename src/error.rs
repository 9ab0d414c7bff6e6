use thiserror::Error;

/// Errors that can occur during environment operations. Marked as non-exhaustive to allow for
/// future additions without breaking the API. A caller usually only has to tell the I/O class
/// (`DeviceNotFound`, `FlashError`, `NoGoodBlocks`) apart from the table errors.
#[derive(Error, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The configured MTD device could not be probed or looked up by name.
    #[error("mtd device not found")]
    DeviceNotFound,

    /// The environment offset has to be aligned to the erase size of the device
    #[error("invalid environment offset")]
    InvalidOffset,

    /// The environment size has to hold the image header and be a multiple of the write size
    #[error("invalid environment size")]
    InvalidSize,

    /// The environment range has to be a multiple of the erase size, cover the environment
    /// sectors and fit into the device.
    #[error("invalid environment range")]
    InvalidRange,

    /// The internal error value is returned from the provided flash device
    #[error("internal flash error")]
    FlashError,

    /// The walk left the environment range before enough good blocks were found.
    #[error("no good blocks left in environment range")]
    NoGoodBlocks,

    /// A temporary buffer could not be allocated. Nothing was touched on flash.
    #[error("out of memory")]
    OutOfMemory,

    /// The stored checksum doesn't match the image data.
    #[error("bad crc")]
    BadCrc,

    /// Environment data is corrupted or not valid text
    #[error("corrupted data")]
    CorruptedData,

    /// The serialized table doesn't fit into the data region of the image.
    #[error("environment too large")]
    EnvironmentTooLarge,

    /// Names must not be empty and must not contain `=` or NUL.
    #[error("key malformed")]
    KeyMalformed,

    /// Values must not contain NUL.
    #[error("value malformed")]
    ValueMalformed,

    /// The variable is not defined.
    #[error("key not found")]
    KeyNotFound,

    /// The value exists but can't be interpreted as the requested type.
    #[error("value parse error")]
    ValueParse,
}
