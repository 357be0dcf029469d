use core::{fmt::Debug, iter::FusedIterator};

use crate::{
    address::Locator,
    function::{DeviceId, PciFunction, VendorId},
    transport::ConfigSpaceTransport,
};

/// Probes every bus/device/function in ascending order and yields the ones
/// that respond.
///
/// All 65536 locators are probed, including functions 1-7 of devices that
/// do not advertise multiple functions.
pub struct PciDeviceIterator<'a, T: ConfigSpaceTransport> {
    transport: &'a T,
    next: Option<Locator>,
}

impl<'a, T: ConfigSpaceTransport> PciDeviceIterator<'a, T> {
    pub(crate) fn new(transport: &'a T) -> Self {
        Self {
            transport,
            next: Some(Locator::new(0, 0, 0)),
        }
    }
}

impl<'a, T: ConfigSpaceTransport> Iterator for PciDeviceIterator<'a, T> {
    type Item = PciDevice<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(locator) = self.next {
            self.next = locator.successor();

            let function = PciFunction::new(self.transport, locator);
            if let Some((vendor_id, device_id)) = function.id() {
                return Some(PciDevice {
                    function,
                    vendor_id,
                    device_id,
                });
            }
        }
        None
    }
}

impl<'a, T: ConfigSpaceTransport> FusedIterator for PciDeviceIterator<'a, T> {}

/// A function that answered the vendor ID probe.
pub struct PciDevice<'a, T: ConfigSpaceTransport> {
    pub function: PciFunction<'a, T>,
    pub vendor_id: VendorId,
    pub device_id: DeviceId,
}

impl<'a, T: ConfigSpaceTransport> PciDevice<'a, T> {
    pub fn locator(&self) -> Locator {
        self.function.locator()
    }
}

impl<'a, T: ConfigSpaceTransport> Debug for PciDevice<'a, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PciDevice")
            .field("locator", &self.locator())
            .field("vendor_id", &format_args!("0x{:04x}", self.vendor_id))
            .field("device_id", &format_args!("0x{:04x}", self.device_id))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec::Vec;

    use super::*;
    use crate::tests::MockConfigSpace;

    #[test]
    pub fn test_empty_bus() {
        let mock = MockConfigSpace::new();

        assert_eq!(0, PciDeviceIterator::new(&mock).count());
        assert_eq!(65536, mock.reads());
    }

    #[test]
    pub fn test_yields_exactly_present_functions() {
        let mock = MockConfigSpace::new();
        let present = [
            Locator::new(0, 0, 0),
            Locator::new(0, 1, 3),
            Locator::new(0, 31, 7),
            Locator::new(7, 2, 0),
            Locator::new(255, 31, 7),
        ];
        for (i, locator) in present.iter().enumerate() {
            mock.set(*locator, 0x00, 0x1000_8000 + i as u32);
        }
        // vendor 0xffff with a device ID still counts as absent
        mock.set(Locator::new(3, 3, 3), 0x00, 0x1234_ffff);

        let devices: Vec<_> = PciDeviceIterator::new(&mock).collect();

        let locators: Vec<Locator> = devices.iter().map(|d| d.locator()).collect();
        assert_eq!(present.as_slice(), locators.as_slice());
        for (i, device) in devices.iter().enumerate() {
            assert_eq!(0x8000 + i as u16, device.vendor_id);
            assert_eq!(0x1000, device.device_id);
        }
    }

    #[test]
    pub fn test_restartable() {
        let mock = MockConfigSpace::new();
        mock.set(Locator::new(0, 2, 0), 0x00, 0x1111_8086);
        mock.set(Locator::new(1, 0, 0), 0x00, 0x2222_8086);

        let first: Vec<Locator> = PciDeviceIterator::new(&mock).map(|d| d.locator()).collect();
        let second: Vec<Locator> = PciDeviceIterator::new(&mock).map(|d| d.locator()).collect();

        assert_eq!(first, second);
        assert_eq!(2, first.len());
    }
}
