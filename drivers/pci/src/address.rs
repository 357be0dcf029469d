use core::fmt::{Debug, Display};

use bit_field::BitField;

/// Bus, device and function of a PCI configuration-space target.
///
/// ```ignore
///  15        8 7     3 2    0
///  +----------+-------+------+
///  |   bus    |device | func |
///  +----------+-------+------+
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Locator {
    bus: u8,
    device: u8,
    function: u8,
}

impl Locator {
    pub const MAX_DEVICE: u8 = 31;
    pub const MAX_FUNCTION: u8 = 7;

    /// Panics if `device > 31` or `function > 7`.
    pub const fn new(bus: u8, device: u8, function: u8) -> Self {
        match Self::try_new(bus, device, function) {
            Some(locator) => locator,
            None => panic!("pci device must be < 32 and function < 8"),
        }
    }

    pub const fn try_new(bus: u8, device: u8, function: u8) -> Option<Self> {
        if device > Self::MAX_DEVICE || function > Self::MAX_FUNCTION {
            return None;
        }
        Some(Self {
            bus,
            device,
            function,
        })
    }

    pub const fn bus(&self) -> u8 {
        self.bus
    }

    pub const fn device(&self) -> u8 {
        self.device
    }

    pub const fn function(&self) -> u8 {
        self.function
    }

    /// Configuration address of the dword containing `offset`.
    pub fn address(&self, offset: u8) -> ConfigAddress {
        ConfigAddress::new(*self, offset)
    }

    /// The locator after this one in ascending (bus, device, function) order.
    pub(crate) fn successor(&self) -> Option<Self> {
        if self.function < Self::MAX_FUNCTION {
            Some(Self::new(self.bus, self.device, self.function + 1))
        } else if self.device < Self::MAX_DEVICE {
            Some(Self::new(self.bus, self.device + 1, 0))
        } else {
            let bus = self.bus.checked_add(1)?;
            Some(Self::new(bus, 0, 0))
        }
    }
}

impl Display for Locator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:02x}:{:02x}.{}", self.bus, self.device, self.function)
    }
}

impl Debug for Locator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        Display::fmt(self, f)
    }
}

/// The word written to the `CONFIG_ADDRESS` port.
///
/// ```ignore
///  31 30      24 23     16 15    11 10    8 7          2 1  0
///  +-+----------+---------+--------+-------+------------+----+
///  |E| reserved |   bus   | device | func  |  register  | 00 |
///  +-+----------+---------+--------+-------+------------+----+
/// ```
///
/// Configuration space is only dword addressable, so the two low bits of the
/// offset are always cleared.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigAddress(u32);

impl ConfigAddress {
    const ENABLE_BIT: usize = 31;
    const BUS: core::ops::Range<usize> = 16..24;
    const DEVICE: core::ops::Range<usize> = 11..16;
    const FUNCTION: core::ops::Range<usize> = 8..11;
    const OFFSET_MASK: u8 = 0xfc;

    pub fn new(locator: Locator, offset: u8) -> Self {
        let mut address: u32 = 0;
        address
            .set_bit(Self::ENABLE_BIT, true)
            .set_bits(Self::BUS, locator.bus.into())
            .set_bits(Self::DEVICE, locator.device.into())
            .set_bits(Self::FUNCTION, locator.function.into())
            .set_bits(0..8, (offset & Self::OFFSET_MASK).into());
        Self(address)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }

    pub fn locator(&self) -> Locator {
        Locator::new(
            self.0.get_bits(Self::BUS) as u8,
            self.0.get_bits(Self::DEVICE) as u8,
            self.0.get_bits(Self::FUNCTION) as u8,
        )
    }

    /// Register offset, always dword aligned.
    pub fn offset(&self) -> u8 {
        self.0.get_bits(0..8) as u8
    }
}

impl Debug for ConfigAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConfigAddress")
            .field("locator", &self.locator())
            .field("offset", &format_args!("0x{:02x}", self.offset()))
            .finish()
    }
}
