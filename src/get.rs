//! The `Get<T>` trait and its implementation in this module allows providing a single generic,
//! overloaded function `get<T>()` for all supported types of the environment.

use crate::Environment;
use crate::error::Error;
use alloc::string::{String, ToString};

pub trait Get<T> {
    fn get(&self, name: &str) -> Result<T, Error>;
}

impl<T, G: Get<T>> Get<T> for &G {
    fn get(&self, name: &str) -> Result<T, Error> {
        (*self).get(name)
    }
}

impl Get<String> for Environment {
    fn get(&self, name: &str) -> Result<String, Error> {
        self.raw(name).map(ToString::to_string)
    }
}

impl Get<bool> for Environment {
    fn get(&self, name: &str) -> Result<bool, Error> {
        match self.raw(name)?.as_bytes().first() {
            Some(b'y' | b'Y' | b't' | b'T' | b'1') => Ok(true),
            Some(b'n' | b'N' | b'f' | b'F' | b'0') => Ok(false),
            _ => Err(Error::ValueParse),
        }
    }
}

impl Get<u8> for Environment {
    fn get(&self, name: &str) -> Result<u8, Error> {
        let value = parse_unsigned(self.raw(name)?)?;
        u8::try_from(value).map_err(|_| Error::ValueParse)
    }
}

impl Get<u16> for Environment {
    fn get(&self, name: &str) -> Result<u16, Error> {
        let value = parse_unsigned(self.raw(name)?)?;
        u16::try_from(value).map_err(|_| Error::ValueParse)
    }
}

impl Get<u32> for Environment {
    fn get(&self, name: &str) -> Result<u32, Error> {
        let value = parse_unsigned(self.raw(name)?)?;
        u32::try_from(value).map_err(|_| Error::ValueParse)
    }
}

impl Get<u64> for Environment {
    fn get(&self, name: &str) -> Result<u64, Error> {
        parse_unsigned(self.raw(name)?)
    }
}

impl Get<usize> for Environment {
    fn get(&self, name: &str) -> Result<usize, Error> {
        let value = parse_unsigned(self.raw(name)?)?;
        usize::try_from(value).map_err(|_| Error::ValueParse)
    }
}

impl Environment {
    /// Get a variable stored as hex, with or without `0x` prefix. Counterpart of
    /// [`Environment::set_hex`].
    pub fn get_hex(&self, name: &str) -> Result<u64, Error> {
        let value = self.raw(name)?.trim();
        let hex = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .unwrap_or(value);
        u64::from_str_radix(hex, 16).map_err(|_| Error::ValueParse)
    }

    fn raw(&self, name: &str) -> Result<&str, Error> {
        self.table.get(name).ok_or(Error::KeyNotFound)
    }
}

/// Decimal, or hex with a `0x` prefix.
fn parse_unsigned(value: &str) -> Result<u64, Error> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse::<u64>(),
    };
    parsed.map_err(|_| Error::ValueParse)
}
