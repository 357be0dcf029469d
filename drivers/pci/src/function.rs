use core::fmt::Debug;

use bit_field::BitField;
use bitflags::bitflags;
use x86_64::PhysAddr;

use crate::{
    address::Locator,
    cap::CapabilityIter,
    error::{PciError, Result},
    transport::ConfigSpaceTransport,
};

pub type VendorId = u16;
pub type DeviceId = u16;
pub type HasMultipleFunctions = bool;

/// Byte offsets into the type 0 configuration header.
pub mod offset {
    pub const VENDOR_ID: u8 = 0x00;
    pub const DEVICE_ID: u8 = 0x02;
    pub const COMMAND: u8 = 0x04;
    pub const STATUS: u8 = 0x06;
    pub const HEADER_TYPE: u8 = 0x0e;
    pub const BAR0: u8 = 0x10;
    pub const CAP_PTR: u8 = 0x34;
}

const BAR_COUNT: u8 = 6;

bitflags! {
    /// PCI status register
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Status: u16 {
        const INTERRUPT_STATUS = 1 << 3;
        /// A capability list is reachable through the pointer at 0x34
        const CAPABILITIES_LIST = 1 << 4;
        const CAPABLE_66MHZ = 1 << 5;
        const FAST_BACK_TO_BACK_CAPABLE = 1 << 7;
        const MASTER_DATA_PARITY_ERROR = 1 << 8;
        const SIGNALED_TARGET_ABORT = 1 << 11;
        const RECEIVED_TARGET_ABORT = 1 << 12;
        const RECEIVED_MASTER_ABORT = 1 << 13;
        const SIGNALED_SYSTEM_ERROR = 1 << 14;
        const DETECTED_PARITY_ERROR = 1 << 15;
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HeaderType {
    Endpoint,
    PciPciBridge,
    CardBusBridge,
    Unknown(u8),
}

/// One function's configuration space, reached through a transport.
///
/// ```ignore
///       31          24 23         16 15          8 7                0
///       +-------------+-------------+-------------+-----------------+
/// 0x00  |        Device ID          |         Vendor ID             |
/// 0x04  |          Status           |          Command              |
/// 0x08  |        Class Code                       | Revision ID     |
/// 0x0c  |     BIST    | Header Type |  Latency    | Cache Line Size |
/// 0x10  |                      BAR0 .. BAR5                         |
/// 0x34  |                    reserved               |  Cap Pointer  |
///       +-------------+-------------+-------------+-----------------+
/// ```
///
/// Every accessor re-reads the device; nothing is cached.
pub struct PciFunction<'a, T: ConfigSpaceTransport> {
    transport: &'a T,
    locator: Locator,
}

impl<'a, T: ConfigSpaceTransport> Clone for PciFunction<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T: ConfigSpaceTransport> Copy for PciFunction<'a, T> {}

impl<'a, T: ConfigSpaceTransport> PciFunction<'a, T> {
    pub const fn new(transport: &'a T, locator: Locator) -> Self {
        Self { transport, locator }
    }

    pub fn locator(&self) -> Locator {
        self.locator
    }

    /// Reads the dword containing `offset`.
    #[inline]
    pub fn read32(&self, offset: u8) -> u32 {
        self.transport.read32(self.locator.address(offset))
    }

    /// Writes the dword containing `offset`.
    #[inline]
    pub fn write32(&self, offset: u8, value: u32) {
        self.transport.write32(self.locator.address(offset), value)
    }

    #[inline]
    pub fn read16(&self, offset: u8) -> u16 {
        let shift = half_shift(offset);
        self.read32(offset).get_bits(shift..shift + 16) as u16
    }

    /// Read-modify-write of the containing dword; the other half is preserved.
    pub fn write16(&self, offset: u8, value: u16) {
        let shift = half_shift(offset);
        let mut dword = self.read32(offset);
        dword.set_bits(shift..shift + 16, value.into());
        self.write32(offset, dword);
    }

    #[inline]
    pub fn read8(&self, offset: u8) -> u8 {
        let shift = usize::from(offset & 0b11) * 8;
        self.read32(offset).get_bits(shift..shift + 8) as u8
    }

    pub fn vendor_id(&self) -> VendorId {
        self.read32(offset::VENDOR_ID).get_bits(0..16) as VendorId
    }

    pub fn device_id(&self) -> DeviceId {
        self.read32(offset::DEVICE_ID).get_bits(16..32) as DeviceId
    }

    /// Vendor and device ID from a single read, `None` if nothing responds.
    pub fn id(&self) -> Option<(VendorId, DeviceId)> {
        let data = self.read32(offset::VENDOR_ID);
        let vendor_id = data.get_bits(0..16) as VendorId;
        if vendor_id == 0xffff {
            return None;
        }
        let device_id = data.get_bits(16..32) as DeviceId;
        Some((vendor_id, device_id))
    }

    pub fn is_present(&self) -> bool {
        self.vendor_id() != 0xffff
    }

    /// Raw BAR0. Memory/IO/prefetchable flags are left in place.
    pub fn bar0(&self) -> u32 {
        self.read32(offset::BAR0)
    }

    pub fn bar(&self, index: u8) -> Result<u32> {
        if index >= BAR_COUNT {
            return Err(PciError::UnsupportedBar(index));
        }
        Ok(self.read32(offset::BAR0 + index * 4))
    }

    /// Decodes a memory BAR into its base address.
    ///
    /// A 64-bit BAR takes its high dword from the following BAR. I/O BARs
    /// and reserved types are rejected.
    pub fn bar_address(&self, index: u8) -> Result<PhysAddr> {
        let low = self.bar(index)?;
        if low.get_bit(0) {
            return Err(PciError::UnsupportedBar(index));
        }
        let base = u64::from(low & 0xffff_fff0);
        let address = match low.get_bits(1..3) {
            0b00 => base,
            0b10 => {
                let high = self
                    .bar(index + 1)
                    .map_err(|_| PciError::UnsupportedBar(index))?;
                (u64::from(high) << 32) | base
            }
            _ => return Err(PciError::UnsupportedBar(index)),
        };
        PhysAddr::try_new(address).map_err(|_| PciError::UnsupportedBar(index))
    }

    pub fn status(&self) -> Status {
        Status::from_bits_retain(self.read16(offset::STATUS))
    }

    pub fn header_type(&self) -> (HasMultipleFunctions, HeaderType) {
        let data = self.read8(offset::HEADER_TYPE);
        let header_type = match data.get_bits(0..7) {
            0x00 => HeaderType::Endpoint,
            0x01 => HeaderType::PciPciBridge,
            0x02 => HeaderType::CardBusBridge,
            v => HeaderType::Unknown(v),
        };
        (data.get_bit(7), header_type)
    }

    /// Offset of the first capability record, if the status register
    /// advertises a list.
    pub fn capabilities_pointer(&self) -> Option<u8> {
        if !self.status().contains(Status::CAPABILITIES_LIST) {
            return None;
        }
        Some(self.read8(offset::CAP_PTR))
    }

    pub fn capabilities(&self) -> CapabilityIter<'a, T> {
        CapabilityIter::new(*self)
    }

    /// Offset of the first capability with `id`.
    pub fn find_capability(&self, id: u8) -> Result<Option<u8>> {
        for cap in self.capabilities() {
            let cap = cap?;
            if cap.id == id {
                return Ok(Some(cap.offset));
            }
        }
        Ok(None)
    }
}

impl<'a, T: ConfigSpaceTransport> Debug for PciFunction<'a, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PciFunction")
            .field("locator", &self.locator)
            .finish()
    }
}

fn half_shift(offset: u8) -> usize {
    usize::from(offset & 0b10) * 8
}
