use crate::error::Error;
use crate::platform::{AlignedOps, MtdRegistry, Platform};
use crate::raw::{self, EnvImage, Layout, Slot};
use crate::walk::{self, Region};
use crate::{EnvValidity, Environment};
use alloc::vec::Vec;
#[cfg(feature = "defmt")]
use defmt::{trace, warn};

/// Value of erased flash, used to pad write buffers.
const ERASED: u8 = 0xFF;

/// Allocates a temporary buffer without aborting on allocation failure.
fn buffer(len: usize, fill: u8) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| Error::OutOfMemory)?;
    buf.resize(len, fill);
    Ok(buf)
}

impl Environment {
    pub(crate) fn load_env<R: MtdRegistry>(
        &mut self,
        registry: &mut R,
    ) -> Result<EnvValidity, Error> {
        registry.probe_devices();
        let mut hal = registry
            .get_device(self.config.device)
            .ok_or(Error::DeviceNotFound)?;

        let validity = self.load_from(&mut hal)?;
        self.validity = validity;
        Ok(validity)
    }

    pub(crate) fn save_env<R: MtdRegistry>(&mut self, registry: &mut R) -> Result<(), Error> {
        registry.probe_devices();
        let mut hal = registry
            .get_device(self.config.device)
            .ok_or(Error::DeviceNotFound)?;

        self.save_to(&mut hal)
    }

    pub(crate) fn erase_env<R: MtdRegistry>(&mut self, registry: &mut R) -> Result<(), Error> {
        registry.probe_devices();
        let mut hal = registry
            .get_device(self.config.device)
            .ok_or(Error::DeviceNotFound)?;

        self.erase_from(&mut hal)
    }

    /// Geometry of the copy starting at `start` on the device `hal`.
    fn region<T: Platform>(&self, hal: &T, start: usize) -> Result<Region, Error> {
        let size = self.config.size;
        if !start.is_multiple_of(T::ERASE_SIZE) {
            return Err(Error::InvalidOffset);
        }
        if size <= self.config.layout().header_size() || !size.is_multiple_of(T::WRITE_SIZE) {
            return Err(Error::InvalidSize);
        }

        let span = T::align_erase_ceil(size);
        let range = self.config.range.unwrap_or(span);
        if !range.is_multiple_of(T::ERASE_SIZE) || range < span {
            return Err(Error::InvalidRange);
        }
        let limit = start
            .checked_add(range)
            .filter(|&limit| limit <= hal.capacity() && limit <= u32::MAX as usize)
            .ok_or(Error::InvalidRange)?;

        Ok(Region {
            start,
            limit,
            sectors: span / T::ERASE_SIZE,
        })
    }

    fn load_from<T: Platform>(&mut self, hal: &mut T) -> Result<EnvValidity, Error> {
        let layout = self.config.layout();
        let primary = self.region(hal, self.config.offset)?;

        let Some(offset_redund) = self.config.offset_redund else {
            let mut buf = buffer(self.config.size, 0)?;
            walk::read(hal, &primary, &mut buf)?;

            return Ok(match EnvImage::from_bytes(&buf, layout, T::crc32) {
                Ok(image) => self.apply(&image, EnvValidity::Valid),
                Err(_) => self.reject("bad CRC"),
            });
        };

        let secondary = self.region(hal, offset_redund)?;
        let mut first_buf = buffer(self.config.size, 0)?;
        let mut second_buf = buffer(self.config.size, 0)?;
        let (first, second) = read_copies(
            hal,
            (&primary, &secondary),
            (first_buf.as_mut_slice(), second_buf.as_mut_slice()),
            layout,
        )?;

        let picked = raw::pick_redundant(
            first.and_then(|image| image.flags()),
            second.and_then(|image| image.flags()),
        );

        #[cfg(feature = "defmt")]
        trace!("load: picked {}", picked);

        Ok(match (picked, first, second) {
            (Some(Slot::Primary), Some(image), _) => self.apply(&image, EnvValidity::Valid),
            (Some(Slot::Secondary), _, Some(image)) => self.apply(&image, EnvValidity::Redund),
            _ => self.reject("bad CRC in both copies"),
        })
    }

    /// Replace the table with the content of a verified image.
    fn apply(&mut self, image: &EnvImage<'_>, validity: EnvValidity) -> EnvValidity {
        match image.to_table() {
            Ok(table) => {
                self.table = table;
                self.serial = image.flags().unwrap_or(0);
                self.ready = true;
                self.using_default = false;
                validity
            }
            Err(_) => self.reject("import failed"),
        }
    }

    fn reject(&mut self, _reason: &str) -> EnvValidity {
        #[cfg(feature = "defmt")]
        warn!("load: {}, using default environment", _reason);

        #[cfg(feature = "debug-logs")]
        println!("internal: load: {_reason}, using default environment");

        self.set_default();
        EnvValidity::Invalid
    }

    fn save_to<T: Platform>(&mut self, hal: &mut T) -> Result<(), Error> {
        // redundant copies alternate, the one not in use gets overwritten
        let (target, validity, serial) = match self.config.offset_redund {
            None => (self.config.offset, self.validity, self.serial),
            Some(offset_redund) => match self.current_copy(hal, offset_redund)? {
                Some((Slot::Primary, serial)) => (offset_redund, EnvValidity::Redund, serial),
                Some((Slot::Secondary, serial)) => {
                    (self.config.offset, EnvValidity::Valid, serial)
                }
                None => (self.config.offset, EnvValidity::Valid, self.serial),
            },
        };
        let region = self.region(hal, target)?;
        let serial = serial.wrapping_add(1);

        #[cfg(feature = "defmt")]
        trace!("save: @{:#08x} serial {}", target, serial);

        #[cfg(feature = "debug-logs")]
        println!("internal: save: {target:#08x} serial {serial}");

        let mut buf = self.write_buffer(hal, &region)?;
        EnvImage::encode_into(
            &mut buf[..self.config.size],
            &self.table,
            self.config.layout(),
            serial,
            0,
            T::crc32,
        )?;

        walk::erase(hal, &region)?;
        walk::write(hal, &region, &buf)?;

        self.serial = serial;
        self.validity = validity;
        Ok(())
    }

    /// The redundant copy holding the newest environment and its serial. Without a previous
    /// load or save the flags of both copies on flash decide.
    fn current_copy<T: Platform>(
        &self,
        hal: &mut T,
        offset_redund: usize,
    ) -> Result<Option<(Slot, u8)>, Error> {
        match self.validity {
            EnvValidity::Valid => return Ok(Some((Slot::Primary, self.serial))),
            EnvValidity::Redund => return Ok(Some((Slot::Secondary, self.serial))),
            EnvValidity::Invalid => return Ok(None),
            EnvValidity::Unknown => {}
        }

        let layout = self.config.layout();
        let primary = self.region(hal, self.config.offset)?;
        let secondary = self.region(hal, offset_redund)?;
        let mut first_buf = buffer(self.config.size, 0)?;
        let mut second_buf = buffer(self.config.size, 0)?;
        let (first, second) = read_copies(
            hal,
            (&primary, &secondary),
            (first_buf.as_mut_slice(), second_buf.as_mut_slice()),
            layout,
        )?;

        let first = first.and_then(|image| image.flags());
        let second = second.and_then(|image| image.flags());
        let current = match raw::pick_redundant(first, second) {
            Some(Slot::Primary) => first.map(|serial| (Slot::Primary, serial)),
            Some(Slot::Secondary) => second.map(|serial| (Slot::Secondary, serial)),
            None => None,
        };

        #[cfg(feature = "defmt")]
        trace!("save: current copy on flash {}", current);

        Ok(current)
    }

    fn erase_from<T: Platform>(&mut self, hal: &mut T) -> Result<(), Error> {
        for start in [Some(self.config.offset), self.config.offset_redund]
            .into_iter()
            .flatten()
        {
            let region = self.region(hal, start)?;

            #[cfg(feature = "defmt")]
            trace!("erase: @{:#08x}", start);

            #[cfg(feature = "debug-logs")]
            println!("internal: erase: {start:#08x}");

            let mut buf = self.write_buffer(hal, &region)?;
            buf[..self.config.size].fill(0);

            walk::erase(hal, &region)?;
            walk::write(hal, &region, &buf)?;
        }
        Ok(())
    }

    /// Buffer for writing one copy. If the environment shares its erase block with other data,
    /// the buffer spans the whole block and holds its current content.
    fn write_buffer<T: Platform>(&self, hal: &mut T, region: &Region) -> Result<Vec<u8>, Error> {
        let carry_over = T::ERASE_SIZE > self.config.size;
        let len = if carry_over {
            T::align_erase_ceil(self.config.size)
        } else {
            self.config.size
        };

        let mut buf = buffer(len, ERASED)?;
        if carry_over {
            walk::read(hal, region, &mut buf)?;
        }
        Ok(buf)
    }
}

/// Read both redundant copies and verify them. A copy that can't be read is treated like one
/// with a bad checksum, the error is only returned if both are unreadable.
fn read_copies<'a, T: Platform>(
    hal: &mut T,
    regions: (&Region, &Region),
    bufs: (&'a mut [u8], &'a mut [u8]),
    layout: Layout,
) -> Result<(Option<EnvImage<'a>>, Option<EnvImage<'a>>), Error> {
    let (first_buf, second_buf) = bufs;
    let first_read = walk::read(hal, regions.0, first_buf);
    let second_read = walk::read(hal, regions.1, second_buf);

    let (first_ok, second_ok) = match (first_read, second_read) {
        (Err(e), Err(_)) => {
            #[cfg(feature = "defmt")]
            warn!("no valid environment area found");

            return Err(e);
        }
        (first_read, second_read) => {
            if first_read.is_err() || second_read.is_err() {
                #[cfg(feature = "defmt")]
                warn!("problems reading one environment copy, recovered");

                #[cfg(feature = "debug-logs")]
                println!("internal: one copy unreadable, using the other");
            }
            (first_read.is_ok(), second_read.is_ok())
        }
    };

    let verify = |ok: bool, buf: &'a [u8]| {
        if ok {
            EnvImage::from_bytes(buf, layout, T::crc32).ok()
        } else {
            None
        }
    };
    Ok((verify(first_ok, first_buf), verify(second_ok, second_buf)))
}
