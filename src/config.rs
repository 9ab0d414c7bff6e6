use crate::raw::Layout;

/// Where and how the environment is stored.
///
/// All fields are plain values so a board can keep its configuration in a `const`:
///
/// ```rust,ignore
/// const ENV: EnvConfig = EnvConfig::new("nand0", 0x10_0000, 0x2000)
///     .with_range(0x8_0000)
///     .with_defaults(&[("bootdelay", "3"), ("baudrate", "115200")]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub(crate) device: &'static str,
    pub(crate) offset: usize,
    pub(crate) size: usize,
    pub(crate) range: Option<usize>,
    pub(crate) offset_redund: Option<usize>,
    pub(crate) defaults: &'static [(&'static str, &'static str)],
}

impl EnvConfig {
    /// `offset` has to be aligned to the erase size of the device, `size` is the size of the
    /// image including its header and has to be a multiple of the write size.
    pub const fn new(device: &'static str, offset: usize, size: usize) -> Self {
        Self {
            device,
            offset,
            size,
            range: None,
            offset_redund: None,
            defaults: &[],
        }
    }

    /// Size of the window each copy may spread over when skipping bad blocks. Defaults to the
    /// erase blocks covered by the environment, which leaves no room for bad blocks.
    pub const fn with_range(mut self, range: usize) -> Self {
        self.range = Some(range);
        self
    }

    /// Keep a second copy at `offset_redund`. Saves alternate between the two copies.
    pub const fn with_redundant(mut self, offset_redund: usize) -> Self {
        self.offset_redund = Some(offset_redund);
        self
    }

    /// The environment used when nothing valid could be loaded.
    pub const fn with_defaults(mut self, defaults: &'static [(&'static str, &'static str)]) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn device(&self) -> &'static str {
        self.device
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn range(&self) -> Option<usize> {
        self.range
    }

    pub fn offset_redund(&self) -> Option<usize> {
        self.offset_redund
    }

    pub fn defaults(&self) -> &'static [(&'static str, &'static str)] {
        self.defaults
    }

    pub fn layout(&self) -> Layout {
        match self.offset_redund {
            None => Layout::Single,
            Some(_) => Layout::Redundant,
        }
    }
}
