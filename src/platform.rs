use embedded_storage::nor_flash::{ErrorType, NorFlash};

/// A flash device the environment can live on. See README.md for an example implementation.
pub trait Platform: Crc + BadBlocks + NorFlash {}

impl<T: Crc + BadBlocks + NorFlash> Platform for T {}

pub type FnCrc32 = fn(data: &[u8]) -> u32;

/// IEEE 802.3 CRC32 as computed by zlib's `crc32(0, data)`.
pub trait Crc {
    fn crc32(data: &[u8]) -> u32;
}

impl<T: Crc> Crc for &mut T {
    fn crc32(data: &[u8]) -> u32 {
        T::crc32(data)
    }
}

/// Bad block bookkeeping of the device. NOR flash has no bad blocks, which is what the default
/// implementation reports.
pub trait BadBlocks: ErrorType {
    /// `offset` is always aligned to `NorFlash::ERASE_SIZE`.
    fn is_bad_block(&mut self, offset: u32) -> Result<bool, Self::Error> {
        let _ = offset;
        Ok(false)
    }
}

impl<T: BadBlocks> BadBlocks for &mut T {
    fn is_bad_block(&mut self, offset: u32) -> Result<bool, Self::Error> {
        T::is_bad_block(self, offset)
    }
}

/// Lookup of MTD devices by name.
///
/// A device handle is only held for the duration of a single environment operation. Dropping the
/// handle releases the device again.
pub trait MtdRegistry {
    type Device<'a>: Platform
    where
        Self: 'a;

    /// Called before every lookup, gives the registry a chance to bring up its devices.
    fn probe_devices(&mut self) {}

    fn get_device(&mut self, name: &str) -> Option<Self::Device<'_>>;
}

/// Registry holding exactly one named device.
///
/// Usage: `SingleDevice::new("nor0", flash)`
pub struct SingleDevice<T> {
    name: &'static str,
    device: T,
}

impl<T> SingleDevice<T> {
    pub fn new(name: &'static str, device: T) -> Self {
        Self { name, device }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn device(&self) -> &T {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut T {
        &mut self.device
    }

    pub fn into_inner(self) -> T {
        self.device
    }
}

impl<T: Platform> MtdRegistry for SingleDevice<T> {
    type Device<'a>
        = &'a mut T
    where
        Self: 'a;

    fn get_device(&mut self, name: &str) -> Option<Self::Device<'_>> {
        if self.name == name {
            Some(&mut self.device)
        } else {
            None
        }
    }
}

pub trait AlignedOps: Platform {
    /// Bytes of whole erase blocks needed to hold `size` bytes.
    fn align_erase_ceil(size: usize) -> usize {
        align_ceil(size, Self::ERASE_SIZE)
    }
}

#[inline(always)]
const fn align_ceil(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size.saturating_add(alignment - 1) & !(alignment - 1)
    } else {
        size.saturating_add(alignment - 1) / alignment * alignment
    }
}

impl<T: Platform> AlignedOps for T {}

#[cfg(any(
    feature = "esp32",
    feature = "esp32s2",
    feature = "esp32s3",
    feature = "esp32c2",
    feature = "esp32c3",
    feature = "esp32c6",
    feature = "esp32h2",
))]
mod chip {
    use esp_storage::FlashStorage;

    use crate::platform::{BadBlocks, Crc};

    impl Crc for FlashStorage<'_> {
        fn crc32(data: &[u8]) -> u32 {
            esp_hal::rom::crc::crc32_le(0, data)
        }
    }

    // SPI NOR, no bad block table
    impl BadBlocks for FlashStorage<'_> {}
}
