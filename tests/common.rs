#![allow(dead_code)]

// filename according to https://doc.rust-lang.org/book/ch11-03-test-organization.html
use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};
use mtd_env::platform::{BadBlocks, SingleDevice};
use std::collections::BTreeSet;

pub const DEVICE: &str = "nand0";

/// Small NOR flash: 4k sectors, word writes.
pub type Nor = Flash<4096, 4>;
/// Large page NAND: 16k blocks, 2k pages.
pub type Nand = Flash<16384, 2048>;
/// Small page NAND: 4k blocks, 512 byte pages.
pub type SmallNand = Flash<4096, 512>;

/// RAM backed flash recording every operation. Accessing a block marked bad panics.
#[derive(Default)]
pub struct Flash<const ERASE: usize, const WRITE: usize> {
    pub buf: Vec<u8>,
    pub bad_blocks: BTreeSet<usize>,
    pub fail_after_operation: usize,
    pub operations: Vec<Operation>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Read { offset: u32, len: usize },
    Write { offset: u32, len: usize },
    Erase { offset: u32, len: usize },
}

impl<const ERASE: usize, const WRITE: usize> Flash<ERASE, WRITE> {
    pub fn new(blocks: usize) -> Self {
        Self {
            buf: vec![0xffu8; ERASE * blocks],
            fail_after_operation: usize::MAX,
            ..Default::default()
        }
    }

    pub fn new_with_fault(blocks: usize, fail_after_operation: usize) -> Self {
        Self {
            fail_after_operation,
            ..Self::new(blocks)
        }
    }

    /// Wraps the flash into a registry under the name [`DEVICE`].
    pub fn into_mtd(self) -> SingleDevice<Self> {
        SingleDevice::new(DEVICE, self)
    }

    pub fn mark_bad(&mut self, block: usize) {
        self.bad_blocks.insert(block);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
    }

    pub fn fail_after(&mut self, operations: usize) {
        self.fail_after_operation = self.operations.len() + operations;
    }

    pub fn erases(&self) -> Vec<Operation> {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Erase { .. }))
            .cloned()
            .collect()
    }

    pub fn writes(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Write { .. }))
            .count()
    }

    fn assert_good(&self, offset: usize, len: usize) {
        let first = offset / ERASE;
        let last = (offset + len - 1) / ERASE;
        for block in first..=last {
            assert!(
                !self.bad_blocks.contains(&block),
                "access to bad block {block} @0x{offset:06X}[0x{len:04X}]"
            );
        }
    }

    fn fault(&self) -> bool {
        if self.operations.len() >= self.fail_after_operation {
            println!("    flash: FAULT");
            return true;
        }
        false
    }

    pub fn dump_operations(&self) {
        println!("Operations:");
        for op in &self.operations {
            println!("  {:?}", op);
        }
    }
}

#[derive(Debug)]
pub struct FlashError;

impl NorFlashError for FlashError {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::Other
    }
}

impl<const ERASE: usize, const WRITE: usize> ErrorType for Flash<ERASE, WRITE> {
    type Error = FlashError;
}

impl<const ERASE: usize, const WRITE: usize> ReadNorFlash for Flash<ERASE, WRITE> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        println!(
            "    flash: read:  0x{offset:06X}[0x{:04X}] #{:>2}",
            bytes.len(),
            self.operations.len()
        );
        if self.fault() {
            return Err(FlashError);
        }
        let offset = offset as usize;
        self.assert_good(offset, bytes.len());
        self.operations.push(Operation::Read {
            offset: offset as u32,
            len: bytes.len(),
        });

        bytes.copy_from_slice(&self.buf[offset..offset + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl<const ERASE: usize, const WRITE: usize> NorFlash for Flash<ERASE, WRITE> {
    const WRITE_SIZE: usize = WRITE;

    const ERASE_SIZE: usize = ERASE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        assert!(from.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(to.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(to > from);

        println!(
            "    flash: erase: 0x{from:06X} - 0x{to:06X} #{:>2}",
            self.operations.len()
        );
        if self.fault() {
            return Err(FlashError);
        }
        self.assert_good(from as usize, (to - from) as usize);
        self.operations.push(Operation::Erase {
            offset: from,
            len: (to - from) as usize,
        });

        self.buf[from as usize..to as usize].fill(0xff);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::WRITE_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::WRITE_SIZE));
        assert!(!bytes.is_empty());

        println!(
            "    flash: write: 0x{offset:06X}[0x{:04X}] #{:>2}",
            bytes.len(),
            self.operations.len()
        );
        if self.fault() {
            return Err(FlashError);
        }
        let offset = offset as usize;
        self.assert_good(offset, bytes.len());
        self.operations.push(Operation::Write {
            offset: offset as u32,
            len: bytes.len(),
        });

        for (i, &val) in bytes.iter().enumerate() {
            // programming can only flip bits from 1 to 0
            self.buf[offset + i] &= val;
        }
        Ok(())
    }
}

impl<const ERASE: usize, const WRITE: usize> BadBlocks for Flash<ERASE, WRITE> {
    fn is_bad_block(&mut self, offset: u32) -> Result<bool, Self::Error> {
        assert!(offset.is_multiple_of(ERASE as u32));
        Ok(self.bad_blocks.contains(&(offset as usize / ERASE)))
    }
}

impl<const ERASE: usize, const WRITE: usize> mtd_env::platform::Crc for Flash<ERASE, WRITE> {
    fn crc32(data: &[u8]) -> u32 {
        unsafe { libz_sys::crc32(0, data.as_ptr(), data.len() as u32) as u32 }
    }
}

/// CRC32 as used for the environment image.
pub fn crc32(data: &[u8]) -> u32 {
    unsafe { libz_sys::crc32(0, data.as_ptr(), data.len() as u32) as u32 }
}
