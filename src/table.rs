//! In-memory environment table and its two linear representations.
//!
//! The binary form is what gets stored on flash: `name=value` entries separated by NUL bytes,
//! the list being terminated by an empty entry (`\0\0`). The text form separates entries by
//! newlines and is used for printing and for editing the environment on a host.

use crate::error::Error;
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use core::str;
#[cfg(feature = "defmt")]
use defmt::warn;

const SEP_BINARY: u8 = b'\0';
const SEP_TEXT: u8 = b'\n';

/// Names starting with a dot are hidden from listings unless explicitly requested.
const HIDDEN_PREFIX: char = '.';

/// Options for [`EnvTable::import`].
///
/// Usage: `Import::text().clear(true).crlf_is_lf(true)`
#[derive(Debug, Clone, Copy)]
pub struct Import<'a> {
    sep: u8,
    clear: bool,
    crlf_is_lf: bool,
    only: Option<&'a [&'a str]>,
}

impl<'a> Import<'a> {
    /// NUL separated entries, terminated by an empty entry.
    pub const fn binary() -> Self {
        Self {
            sep: SEP_BINARY,
            clear: false,
            crlf_is_lf: false,
            only: None,
        }
    }

    /// Newline separated entries. A NUL byte ends the input.
    pub const fn text() -> Self {
        Self {
            sep: SEP_TEXT,
            clear: false,
            crlf_is_lf: false,
            only: None,
        }
    }

    /// Drop the current content before importing. If combined with [`Import::only`], only the
    /// listed names are dropped.
    pub const fn clear(mut self, clear: bool) -> Self {
        self.clear = clear;
        self
    }

    /// Strip a trailing `\r` from every line. Only has an effect on text imports.
    pub const fn crlf_is_lf(mut self, crlf_is_lf: bool) -> Self {
        self.crlf_is_lf = crlf_is_lf;
        self
    }

    /// Restrict the import to the given names, everything else in the input is ignored.
    pub const fn only(mut self, names: &'a [&'a str]) -> Self {
        self.only = Some(names);
        self
    }

    fn accepts(&self, name: &str) -> bool {
        match self.only {
            None => true,
            Some(names) => names.iter().any(|&allowed| allowed == name),
        }
    }
}

/// The environment variables, kept sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvTable {
    entries: BTreeMap<String, String>,
}

impl EnvTable {
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Set a variable. An empty value deletes the variable.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), Error> {
        validate_name(name)?;
        if value.contains('\0') {
            return Err(Error::ValueMalformed);
        }

        if value.is_empty() {
            self.entries.remove(name);
        } else {
            self.entries.insert(name.to_string(), value.to_string());
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<(), Error> {
        match self.entries.remove(name) {
            Some(_) => Ok(()),
            None => Err(Error::KeyNotFound),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of bytes [`EnvTable::export_binary`] needs, including the list terminator.
    pub fn binary_len(&self) -> usize {
        self.entries
            .iter()
            .map(|(k, v)| k.len() + 1 + v.len() + 1)
            .sum::<usize>()
            + 1
    }

    /// Import entries from `data`. Returns the number of variables that were set or deleted.
    ///
    /// Lines starting with `#` are comments, `name` without `=` or with an empty value deletes
    /// the variable. Nothing is changed if the input turns out to be malformed.
    pub fn import(&mut self, data: &[u8], opts: &Import<'_>) -> Result<usize, Error> {
        let mut staged = if opts.clear {
            match opts.only {
                None => BTreeMap::new(),
                Some(names) => {
                    let mut kept = self.entries.clone();
                    for name in names {
                        kept.remove(*name);
                    }
                    kept
                }
            }
        } else {
            self.entries.clone()
        };

        let data = if opts.sep == SEP_TEXT {
            // text input ends at the first NUL byte
            let end = data.iter().position(|&b| b == b'\0').unwrap_or(data.len());
            &data[..end]
        } else {
            data
        };

        let mut changed = 0;
        for raw in data.split(|&b| b == opts.sep) {
            let mut line = raw;

            if opts.sep == SEP_BINARY {
                if line.is_empty() {
                    break;
                }
            } else {
                if opts.crlf_is_lf {
                    line = line.strip_suffix(b"\r").unwrap_or(line);
                }
                while let [b' ' | b'\t', rest @ ..] = line {
                    line = rest;
                }
                if line.is_empty() {
                    continue;
                }
            }

            if line.starts_with(b"#") {
                continue;
            }

            let line = str::from_utf8(line).map_err(|_| Error::CorruptedData)?;
            let (name, value) = line.split_once('=').unwrap_or((line, ""));

            if validate_name(name).is_err() {
                #[cfg(feature = "defmt")]
                warn!("import: skipping malformed name");

                #[cfg(feature = "debug-logs")]
                println!("table: import: skipping malformed name {name:?}");

                continue;
            }
            if !opts.accepts(name) {
                continue;
            }

            if value.is_empty() {
                staged.remove(name);
            } else {
                staged.insert(name.to_string(), value.to_string());
            }
            changed += 1;
        }

        self.entries = staged;
        Ok(changed)
    }

    /// Serialize into `buf` as NUL separated entries followed by an empty entry. Returns the
    /// number of bytes used, the rest of `buf` is left untouched.
    pub fn export_binary(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let needed = self.binary_len();
        if needed > buf.len() {
            return Err(Error::EnvironmentTooLarge);
        }

        let mut pos = 0;
        for (name, value) in &self.entries {
            let parts: [&[u8]; 4] = [name.as_bytes(), b"=", value.as_bytes(), &[SEP_BINARY]];
            for part in parts {
                buf[pos..pos + part.len()].copy_from_slice(part);
                pos += part.len();
            }
        }
        buf[pos] = SEP_BINARY;
        Ok(pos + 1)
    }

    /// Serialize as one `name=value` line per variable. Hidden variables (name starting with a
    /// dot) are only included if `include_hidden` is set.
    pub fn export_text(&self, include_hidden: bool) -> String {
        let mut out = String::new();
        for (name, value) in &self.entries {
            if !include_hidden && name.starts_with(HIDDEN_PREFIX) {
                continue;
            }
            out.push_str(name);
            out.push('=');
            out.push_str(value);
            out.push(SEP_TEXT as char);
        }
        out
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for EnvTable {
    /// Entries with a malformed name or value are dropped.
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut table = EnvTable::new();
        for (name, value) in iter {
            let _ = table.set(name, value);
        }
        table
    }
}

pub(crate) fn validate_name(name: &str) -> Result<(), Error> {
    if name.is_empty() || name.contains(['=', '\0']) {
        return Err(Error::KeyMalformed);
    }
    Ok(())
}
