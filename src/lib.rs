#![doc = include_str ! ("../README.md")]
#![cfg_attr(not(target_arch = "x86_64"), no_std)]

pub mod config;
pub mod error;
mod get;
mod internal;
pub mod platform;
pub mod raw;
mod set;
pub mod table;
mod walk;

pub use config::EnvConfig;
pub use get::Get;
pub use raw::{EnvImage, Layout};
pub use set::Set;
pub use table::{EnvTable, Import};

extern crate alloc;

use crate::error::Error;
use crate::platform::MtdRegistry;
use alloc::string::String;
use core::fmt;

/// Tells where the content of the in-memory table came from. It describes the table, not the
/// flash: a failed save leaves it untouched, only the next load re-evaluates it.
#[derive(strum::Display, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EnvValidity {
    /// Nothing has been loaded yet.
    #[default]
    #[strum(serialize = "unknown")]
    Unknown,

    /// Loading failed or the stored checksum didn't match, the table holds the defaults.
    #[strum(serialize = "invalid")]
    Invalid,

    /// Loaded from the primary copy.
    #[strum(serialize = "valid")]
    Valid,

    /// Loaded from the redundant copy.
    #[strum(serialize = "redundant")]
    Redund,
}

/// Status summary, as printed by `env info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EnvInfo {
    pub validity: EnvValidity,
    /// The table has been populated, either from flash or from the defaults.
    pub ready: bool,
    /// The table holds the default environment.
    pub using_default: bool,
    /// Bytes the table occupies in the data region of the image.
    pub used: usize,
    /// Size of the data region of the image.
    pub capacity: usize,
}

impl fmt::Display for EnvInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "env_valid = {}", self.validity)?;
        writeln!(f, "env_ready = {}", self.ready)?;
        writeln!(f, "env_use_default = {}", self.using_default)?;
        write!(f, "Environment size: {}/{} bytes", self.used, self.capacity)
    }
}

/// The environment of one boot: the key/value table, where it came from and where it goes.
///
/// The flash device is not held by the environment. Every load, save and erase looks it up in
/// the given [`MtdRegistry`] and releases it before returning.
pub struct Environment {
    pub(crate) config: EnvConfig,
    pub(crate) table: EnvTable,
    pub(crate) validity: EnvValidity,
    /// Serial of the redundant copy the table was loaded from or last saved to.
    pub(crate) serial: u8,
    pub(crate) ready: bool,
    pub(crate) using_default: bool,
}

impl Environment {
    /// Creates an empty environment. Geometry related checks happen once the device is known,
    /// on every load, save or erase.
    pub fn new(config: EnvConfig) -> Result<Environment, Error> {
        if config.size <= config.layout().header_size() {
            return Err(Error::InvalidSize);
        }
        if let Some(offset_redund) = config.offset_redund {
            // each copy may spread over its whole range, the ranges must not overlap
            let extent = config.range.unwrap_or(config.size).max(config.size);
            if offset_redund < config.offset.saturating_add(extent)
                && config.offset < offset_redund.saturating_add(extent)
            {
                return Err(Error::InvalidOffset);
            }
        }

        Ok(Self {
            config,
            table: EnvTable::new(),
            validity: EnvValidity::Unknown,
            serial: 0,
            ready: false,
            using_default: false,
        })
    }

    /// Read the environment from flash, skipping bad blocks, and replace the table with it.
    ///
    /// A checksum mismatch is not an error: the default environment is used and
    /// `EnvValidity::Invalid` is returned. If the device is missing or can't be read, the default
    /// environment is used as well and the error is returned.
    pub fn load<R: MtdRegistry>(&mut self, registry: &mut R) -> Result<EnvValidity, Error> {
        match self.load_env(registry) {
            Ok(validity) => Ok(validity),
            Err(e) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("load failed: {}, using default environment", e);

                #[cfg(feature = "debug-logs")]
                println!("load failed: {e}, using default environment");

                self.set_default();
                self.validity = EnvValidity::Invalid;
                Err(e)
            }
        }
    }

    /// Write the table to flash.
    ///
    /// The environment blocks are erased before they are written. If writing fails afterwards
    /// the stored environment is left erased or incomplete, which the next load detects by its
    /// checksum. Data sharing an erase block with the environment is preserved.
    pub fn save<R: MtdRegistry>(&mut self, registry: &mut R) -> Result<(), Error> {
        self.save_env(registry)
    }

    /// Invalidate the stored environment by overwriting it with zeros. Data sharing an erase
    /// block with the environment is preserved. The table and its validity are left untouched.
    pub fn erase<R: MtdRegistry>(&mut self, registry: &mut R) -> Result<(), Error> {
        self.erase_env(registry)
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn validity(&self) -> EnvValidity {
        self.validity
    }

    pub fn info(&self) -> EnvInfo {
        EnvInfo {
            validity: self.validity,
            ready: self.ready,
            using_default: self.using_default,
            used: self.table.binary_len(),
            capacity: self.config.size - self.config.layout().header_size(),
        }
    }

    pub fn table(&self) -> &EnvTable {
        &self.table
    }

    /// Get a variable.
    ///
    /// Supported types are String, bool (`y`/`n`, `t`/`f`, `1`/`0`) and unsigned integers given
    /// in decimal or as `0x` prefixed hex.
    pub fn get<R>(&self, name: &str) -> Result<R, Error>
    where
        Environment: Get<R>,
    {
        Get::get(self, name)
    }

    /// Set a variable in the table. Nothing is written to flash until [`Environment::save`].
    ///
    /// Setting an empty string deletes the variable.
    pub fn set<R>(&mut self, name: &str, value: R) -> Result<(), Error>
    where
        Environment: Set<R>,
    {
        Set::set(self, name, value)
    }

    /// Delete a variable from the table.
    pub fn delete(&mut self, name: &str) -> Result<(), Error> {
        self.table.remove(name)
    }

    /// Replace the table with the default environment of the configuration.
    pub fn set_default(&mut self) {
        self.table = self.config.defaults.iter().copied().collect();
        self.ready = true;
        self.using_default = true;
    }

    /// Import variables from a text or binary buffer into the table, see [`Import`].
    pub fn import(&mut self, data: &[u8], opts: &Import<'_>) -> Result<usize, Error> {
        let count = self.table.import(data, opts)?;
        self.ready = true;
        Ok(count)
    }

    /// All variables as `name=value` lines, sorted by name.
    pub fn export_text(&self, include_hidden: bool) -> String {
        self.table.export_text(include_hidden)
    }
}
