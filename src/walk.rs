//! Bad block aware traversal of the environment range.
//!
//! The environment is a logical byte stream laid over the good blocks of its range in ascending
//! order. Bad blocks contribute nothing to the stream: they are never read, written or erased.

use crate::error::Error;
use crate::platform::Platform;
use core::ops::Range;
#[cfg(feature = "defmt")]
use defmt::{trace, warn};

/// Geometry of one environment copy on a concrete device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) struct Region {
    /// Erase block aligned start of the copy.
    pub(crate) start: usize,
    /// End of the range the walk may use, erase block aligned.
    pub(crate) limit: usize,
    /// Number of erase blocks the environment occupies.
    pub(crate) sectors: usize,
}

/// Returns the first offset at or behind `offset` that doesn't lie in a bad block.
///
/// Only offsets on an erase block boundary are checked, within a block the previous answer
/// holds.
pub(crate) fn next_good_offset<T: Platform>(
    hal: &mut T,
    mut offset: usize,
    limit: usize,
) -> Result<usize, Error> {
    while offset < limit {
        if !offset.is_multiple_of(T::ERASE_SIZE) {
            return Ok(offset);
        }

        let bad = hal
            .is_bad_block(offset as u32)
            .map_err(|_| Error::FlashError)?;
        if !bad {
            return Ok(offset);
        }

        #[cfg(feature = "defmt")]
        warn!("skipping bad block @{:#08x}", offset);

        #[cfg(feature = "debug-logs")]
        println!("  walk: skipping bad block {offset:#08x}");

        offset += T::ERASE_SIZE;
    }

    Err(Error::NoGoodBlocks)
}

/// Walks `len` logical bytes in `WRITE_SIZE` steps and calls `op` with the flash offset and the
/// logical range of every step. `len` has to be a multiple of `WRITE_SIZE`.
fn walk<T, F>(hal: &mut T, region: &Region, len: usize, mut op: F) -> Result<(), Error>
where
    T: Platform,
    F: FnMut(&mut T, u32, Range<usize>) -> Result<(), Error>,
{
    let step = T::WRITE_SIZE;
    let mut offset = region.start;
    let mut done = 0;

    while done < len {
        offset = next_good_offset(hal, offset, region.limit)?;
        op(hal, offset as u32, done..done + step)?;
        done += step;
        offset += step;
    }

    Ok(())
}

/// Fill `buf` from the good blocks of `region`.
pub(crate) fn read<T: Platform>(hal: &mut T, region: &Region, buf: &mut [u8]) -> Result<(), Error> {
    #[cfg(feature = "defmt")]
    trace!("walk::read @{:#08x}: [{}]", region.start, buf.len());

    walk(hal, region, buf.len(), |hal, offset, range| {
        hal.read(offset, &mut buf[range])
            .map_err(|_| Error::FlashError)
    })
}

/// Write `buf` into the good blocks of `region`. The blocks have to be erased.
pub(crate) fn write<T: Platform>(hal: &mut T, region: &Region, buf: &[u8]) -> Result<(), Error> {
    #[cfg(feature = "defmt")]
    trace!("walk::write @{:#08x}: [{}]", region.start, buf.len());

    walk(hal, region, buf.len(), |hal, offset, range| {
        hal.write(offset, &buf[range])
            .map_err(|_| Error::FlashError)
    })
}

/// Erase the first `region.sectors` good blocks of `region`, one request per run of adjacent
/// good blocks. Nothing is erased if the range doesn't hold enough good blocks.
pub(crate) fn erase<T: Platform>(hal: &mut T, region: &Region) -> Result<(), Error> {
    let end = last_block_end(hal, region)?;

    let mut run = region.start..region.start;
    let mut block = region.start;
    while block < end {
        let good = next_good_offset(hal, block, end)?;
        if good != run.end {
            if !run.is_empty() {
                erase_run(hal, run.clone())?;
            }
            run = good..good;
        }
        run.end = good + T::ERASE_SIZE;
        block = run.end;
    }

    if run.is_empty() {
        return Ok(());
    }
    erase_run(hal, run)
}

/// End of the erase block holding the last sector of the environment.
fn last_block_end<T: Platform>(hal: &mut T, region: &Region) -> Result<usize, Error> {
    let mut block = region.start;
    for _ in 0..region.sectors {
        block = next_good_offset(hal, block, region.limit)? + T::ERASE_SIZE;
    }
    Ok(block)
}

fn erase_run<T: Platform>(hal: &mut T, run: Range<usize>) -> Result<(), Error> {
    #[cfg(feature = "defmt")]
    trace!("walk::erase {:#08x} - {:#08x}", run.start, run.end);

    #[cfg(feature = "debug-logs")]
    println!("  walk: erase {:#08x} - {:#08x}", run.start, run.end);

    hal.erase(run.start as u32, run.end as u32)
        .map_err(|_| Error::FlashError)
}
