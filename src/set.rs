use crate::Environment;
use crate::error::Error;
use alloc::format;

pub trait Set<T> {
    fn set(&mut self, name: &str, value: T) -> Result<(), Error>;
}

impl<T, S: Set<T>> Set<T> for &mut S {
    fn set(&mut self, name: &str, value: T) -> Result<(), Error> {
        (*self).set(name, value)
    }
}

impl Set<&str> for Environment {
    fn set(&mut self, name: &str, value: &str) -> Result<(), Error> {
        self.table.set(name, value)
    }
}

impl Set<bool> for Environment {
    fn set(&mut self, name: &str, value: bool) -> Result<(), Error> {
        self.table.set(name, if value { "y" } else { "n" })
    }
}

impl Set<u8> for Environment {
    fn set(&mut self, name: &str, value: u8) -> Result<(), Error> {
        self.table.set(name, &format!("{value}"))
    }
}

impl Set<u16> for Environment {
    fn set(&mut self, name: &str, value: u16) -> Result<(), Error> {
        self.table.set(name, &format!("{value}"))
    }
}

impl Set<u32> for Environment {
    fn set(&mut self, name: &str, value: u32) -> Result<(), Error> {
        self.table.set(name, &format!("{value}"))
    }
}

impl Set<u64> for Environment {
    fn set(&mut self, name: &str, value: u64) -> Result<(), Error> {
        self.table.set(name, &format!("{value}"))
    }
}

impl Set<usize> for Environment {
    fn set(&mut self, name: &str, value: usize) -> Result<(), Error> {
        self.table.set(name, &format!("{value}"))
    }
}

impl Environment {
    /// Set a variable to `value` formatted as hex without prefix, the way addresses and sizes
    /// like `filesize` are stored.
    pub fn set_hex(&mut self, name: &str, value: u64) -> Result<(), Error> {
        self.table.set(name, &format!("{value:x}"))
    }
}
