//! PCI capabilities list
//!
//! Walks the singly linked list of capability records in a function's
//! configuration space. The walk is bounded: config space is 256 bytes, so a
//! chain that has not ended after 256 records is cyclic or corrupt and is
//! reported as [`PciError::MalformedCapabilityChain`] instead of looping.

use core::iter::FusedIterator;

use bit_field::BitField;

use crate::{
    error::PciError, function::PciFunction, transport::ConfigSpaceTransport,
};

/// Message signalled interrupts
pub const MSI_ID: u8 = 0x05;
/// Vendor specific
pub const VENDOR_ID: u8 = 0x09;
/// Extended message signalled interrupts
pub const MSIX_ID: u8 = 0x11;

/// Upper bound on records visited in one walk.
pub const MAX_CAPABILITY_RECORDS: usize = 256;

/// One record of the capability chain.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Capability {
    pub offset: u8,
    pub id: u8,
    /// Offset of the next record, 0 at the end of the chain.
    pub next: u8,
}

impl Capability {
    pub fn name(&self) -> &'static str {
        capability_name(self.id)
    }
}

/// Human readable name of a capability ID.
pub fn capability_name(id: u8) -> &'static str {
    match id {
        0x01 => "Power Management",
        0x02 => "AGP",
        0x03 => "Vital Product Data",
        0x04 => "Slot Identification",
        MSI_ID => "MSI",
        0x06 => "CompactPCI Hot Swap",
        0x07 => "PCI-X",
        0x08 => "HyperTransport",
        VENDOR_ID => "Vendor Specific",
        0x0a => "Debug Port",
        0x0b => "CompactPCI Central Resource Control",
        0x0c => "PCI Hot-Plug",
        0x0d => "Bridge Subsystem Vendor ID",
        0x0e => "AGP 8x",
        0x0f => "Secure Device",
        0x10 => "PCI Express",
        MSIX_ID => "MSI-X",
        0x12 => "SATA Data/Index Configuration",
        0x13 => "Advanced Features",
        _ => "Unknown",
    }
}

/// Lazy walk over a function's capability records.
///
/// Yields `Err(MalformedCapabilityChain)` once if the bound is exceeded,
/// then nothing.
pub struct CapabilityIter<'a, T: ConfigSpaceTransport> {
    function: PciFunction<'a, T>,
    cur: u8,
    visited: usize,
    done: bool,
}

impl<'a, T: ConfigSpaceTransport> CapabilityIter<'a, T> {
    pub(crate) fn new(function: PciFunction<'a, T>) -> Self {
        let cur = function.capabilities_pointer().unwrap_or(0) & 0xfc;
        Self {
            function,
            cur,
            visited: 0,
            done: cur == 0,
        }
    }
}

impl<'a, T: ConfigSpaceTransport> Iterator for CapabilityIter<'a, T> {
    type Item = Result<Capability, PciError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.visited >= MAX_CAPABILITY_RECORDS {
            self.done = true;
            log::warn!(
                "{}: capability chain exceeds {} records",
                self.function.locator(),
                MAX_CAPABILITY_RECORDS
            );
            return Some(Err(PciError::MalformedCapabilityChain));
        }

        let header = self.function.read32(self.cur);
        let cap = Capability {
            offset: self.cur,
            id: header.get_bits(0..8) as u8,
            next: header.get_bits(8..16) as u8 & 0xfc,
        };
        log::trace!(
            "{}: capability 0x{:02x} at 0x{:02x}",
            self.function.locator(),
            cap.id,
            cap.offset
        );

        self.visited += 1;
        self.cur = cap.next;
        if self.cur == 0 {
            self.done = true;
        }
        Some(Ok(cap))
    }
}

impl<'a, T: ConfigSpaceTransport> FusedIterator for CapabilityIter<'a, T> {}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec::Vec;

    use super::*;
    use crate::{address::Locator, tests::MockConfigSpace};

    const LOCATOR: Locator = Locator::new(0, 4, 0);

    /// Builds a chain from `(offset, id)` pairs, linked in order.
    fn chain(mock: &MockConfigSpace, records: &[(u8, u8)]) {
        mock.set(LOCATOR, 0x00, 0x1000_1af4);
        mock.set(LOCATOR, 0x04, 0x0010_0000);
        mock.set(LOCATOR, 0x34, records.first().map(|r| r.0).unwrap_or(0).into());
        for (i, (offset, id)) in records.iter().enumerate() {
            let next = records.get(i + 1).map(|r| r.0).unwrap_or(0);
            mock.set(LOCATOR, *offset, (u32::from(next) << 8) | u32::from(*id));
        }
    }

    #[test]
    pub fn test_no_capability_list() {
        let mock = MockConfigSpace::new();
        mock.set(LOCATOR, 0x04, 0x0000_0000);
        mock.set(LOCATOR, 0x34, 0x40);
        let function = PciFunction::new(&mock, LOCATOR);

        assert_eq!(0, function.capabilities().count());
        assert_eq!(Ok(None), function.find_capability(MSIX_ID));
    }

    #[test]
    pub fn test_walk() {
        let mock = MockConfigSpace::new();
        chain(&mock, &[(0x40, 0x01), (0x50, MSI_ID), (0x70, MSIX_ID)]);
        let function = PciFunction::new(&mock, LOCATOR);

        let caps: Vec<Capability> = function.capabilities().map(|c| c.unwrap()).collect();
        assert_eq!(3, caps.len());
        assert_eq!(
            Capability {
                offset: 0x50,
                id: MSI_ID,
                next: 0x70
            },
            caps[1]
        );
        assert_eq!("MSI-X", caps[2].name());
        assert_eq!(Ok(Some(0x70)), function.find_capability(MSIX_ID));
        assert_eq!(Ok(None), function.find_capability(0x10));
    }

    #[test]
    pub fn test_record_reads() {
        let offsets = [0x40u8, 0x48, 0x50, 0x60, 0x80, 0x90, 0xa0, 0xc0];
        for links in 0..offsets.len() {
            let mock = MockConfigSpace::new();
            let records: Vec<(u8, u8)> = offsets[..=links].iter().map(|o| (*o, 0x09)).collect();
            chain(&mock, &records);
            let function = PciFunction::new(&mock, LOCATOR);

            mock.reset_counts();
            assert_eq!(Ok(None), function.find_capability(MSIX_ID));
            // status + capability pointer + one read per record
            assert_eq!(2 + links + 1, mock.reads());
            assert_eq!(0, mock.writes());
        }
    }

    #[test]
    pub fn test_cycle_is_malformed() {
        let mock = MockConfigSpace::new();
        mock.set(LOCATOR, 0x04, 0x0010_0000);
        // 0x34 doubles as a record: id 0x40 (the pointer itself), next 0x40
        mock.set(LOCATOR, 0x34, 0x0000_4040);
        mock.set(LOCATOR, 0x40, 0x0000_3401);
        let function = PciFunction::new(&mock, LOCATOR);

        assert_eq!(
            Err(PciError::MalformedCapabilityChain),
            function.find_capability(MSIX_ID)
        );

        let results: Vec<_> = function.capabilities().collect();
        assert_eq!(MAX_CAPABILITY_RECORDS + 1, results.len());
        assert_eq!(
            Some(&Err(PciError::MalformedCapabilityChain)),
            results.last()
        );
    }

    #[test]
    pub fn test_self_loop_is_malformed() {
        let mock = MockConfigSpace::new();
        mock.set(LOCATOR, 0x04, 0x0010_0000);
        mock.set(LOCATOR, 0x34, 0x60);
        mock.set(LOCATOR, 0x60, 0x0000_6009);
        let function = PciFunction::new(&mock, LOCATOR);

        assert_eq!(
            Err(PciError::MalformedCapabilityChain),
            function.find_capability(MSIX_ID)
        );
    }

    #[test]
    pub fn test_match_in_cycle_still_found() {
        let mock = MockConfigSpace::new();
        mock.set(LOCATOR, 0x04, 0x0010_0000);
        mock.set(LOCATOR, 0x34, 0x60);
        mock.set(LOCATOR, 0x60, 0x0000_7009);
        mock.set(LOCATOR, 0x70, 0x0000_6011);
        let function = PciFunction::new(&mock, LOCATOR);

        assert_eq!(Ok(Some(0x70)), function.find_capability(MSIX_ID));
    }

    #[test]
    pub fn test_capability_names() {
        assert_eq!("MSI", capability_name(0x05));
        assert_eq!("PCI Express", capability_name(0x10));
        assert_eq!("Unknown", capability_name(0xee));
    }
}
