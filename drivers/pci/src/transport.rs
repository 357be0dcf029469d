use crate::address::ConfigAddress;

/// Indirect access to PCI configuration space.
///
/// Implementations must perform the address write and the matching data
/// access as one unit. A read from a location with no device behind it
/// returns `0xffff_ffff`.
pub trait ConfigSpaceTransport {
    fn read32(&self, address: ConfigAddress) -> u32;

    fn write32(&self, address: ConfigAddress, value: u32);
}

impl<T: ConfigSpaceTransport + ?Sized> ConfigSpaceTransport for &T {
    fn read32(&self, address: ConfigAddress) -> u32 {
        (**self).read32(address)
    }

    fn write32(&self, address: ConfigAddress, value: u32) {
        (**self).write32(address, value)
    }
}
