use mtd_env::platform::{
    Crc,
    SingleDevice,
};
use mtd_env::{
    EnvConfig,
    EnvValidity,
    Environment,
};
use mtd_env_tool::{
    EnvFile,
    Layout,
    DEFAULT_PAD,
};
use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

#[test]
fn test_text_binary_text() {
    let env = EnvFile::from_text_file("tests/assets/board.env").unwrap();

    let bin_file = NamedTempFile::new().unwrap();
    env.generate_image_file(bin_file.path(), 0x2000, Layout::Redundant, DEFAULT_PAD)
        .unwrap();
    let parsed = EnvFile::parse_image_file(bin_file.path(), Layout::Redundant).unwrap();
    assert_eq!(parsed, env);

    let text_file = NamedTempFile::new().unwrap();
    parsed.to_text_file(text_file.path()).unwrap();
    let reparsed = EnvFile::from_text_file(text_file.path()).unwrap();
    assert_eq!(reparsed, env);
}

#[test]
fn test_corrupted_image() {
    let env = EnvFile::from_text_file("tests/assets/board.env").unwrap();
    let mut image = env.generate(0x2000, Layout::Single, DEFAULT_PAD).unwrap();
    image[0x100] ^= 0x01;

    let result = EnvFile::parse(&image, Layout::Single);
    assert!(matches!(
        result,
        Err(mtd_env_tool::Error::EnvError(mtd_env::error::Error::BadCrc))
    ));
}

/// NOR flash backed by a plain buffer, just enough to load a generated image.
struct Ram(Vec<u8>);

#[derive(Debug)]
struct RamError;

impl embedded_storage::nor_flash::NorFlashError for RamError {
    fn kind(&self) -> embedded_storage::nor_flash::NorFlashErrorKind {
        embedded_storage::nor_flash::NorFlashErrorKind::Other
    }
}

impl embedded_storage::nor_flash::ErrorType for Ram {
    type Error = RamError;
}

impl embedded_storage::nor_flash::ReadNorFlash for Ram {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let offset = offset as usize;
        bytes.copy_from_slice(&self.0[offset..offset + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.0.len()
    }
}

impl embedded_storage::nor_flash::NorFlash for Ram {
    const WRITE_SIZE: usize = 1;
    const ERASE_SIZE: usize = 0x1000;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        self.0[from as usize..to as usize].fill(0xFF);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let offset = offset as usize;
        self.0[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

impl mtd_env::platform::BadBlocks for Ram {}

impl Crc for Ram {
    fn crc32(data: &[u8]) -> u32 {
        mtd_env_tool::crc32(data)
    }
}

#[test]
fn test_generated_image_loads() {
    let env = EnvFile::from_text_file("tests/assets/board.env").unwrap();
    let image = env.generate(0x2000, Layout::Redundant, DEFAULT_PAD).unwrap();

    let mut flash = vec![0xFFu8; 0x8000];
    flash[0x2000..0x4000].copy_from_slice(&image);
    let mut mtd = SingleDevice::new("nor0", Ram(flash));

    let config = EnvConfig::new("nor0", 0x2000, 0x2000).with_redundant(0x4000);
    let mut target = Environment::new(config).unwrap();
    assert_eq!(target.load(&mut mtd), Ok(EnvValidity::Valid));
    assert_eq!(target.get::<u32>("loadaddr").unwrap(), 0x8200_0000);
    assert_eq!(target.table(), &env.table);

    // the first save on the target goes to the other copy
    target.save(&mut mtd).unwrap();
    assert_eq!(target.validity(), EnvValidity::Redund);
    assert_eq!(mtd.device().0[0x4004], 2);
}
