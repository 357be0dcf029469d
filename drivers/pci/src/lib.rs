//! PCI configuration space driver for x86
//!
//! Enumerates functions through configuration mechanism #1 (ports 0xcf8 and
//! 0xcfc), walks capability lists and programs MSI-X. Only the legacy 256
//! byte configuration space is reachable; there is no PCIe extended access.

#![no_std]

use crate::{
    address::Locator,
    function::PciFunction,
    iter::PciDeviceIterator,
    memory::MemoryAccess,
    msix::{MsixCapabilityState, MsixSetup},
    transport::ConfigSpaceTransport,
};

pub mod address;
pub mod cap;
pub mod error;
pub mod function;
pub mod iter;
pub mod memory;
pub mod msix;
pub mod report;
pub mod transport;
pub mod x86;

pub use error::{PciError, Result};

pub struct PciDriver<'a, T: ConfigSpaceTransport> {
    transport: &'a T,
}

impl<'a, T: ConfigSpaceTransport> PciDriver<'a, T> {
    pub const fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    /// A fresh scan of every bus/device/function; call again to restart.
    pub fn devices(&self) -> PciDeviceIterator<'a, T> {
        PciDeviceIterator::new(self.transport)
    }

    pub fn function(&self, locator: Locator) -> PciFunction<'a, T> {
        PciFunction::new(self.transport, locator)
    }

    pub fn find_capability(&self, locator: Locator, id: u8) -> Result<Option<u8>> {
        self.function(locator).find_capability(id)
    }

    pub fn enable_msix<M: MemoryAccess>(
        &self,
        locator: Locator,
        vector_count: u16,
        setup: &MsixSetup,
        memory: &M,
    ) -> Result<MsixCapabilityState> {
        msix::enable_msix(&self.function(locator), vector_count, setup, memory)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    extern crate std;

    use core::cell::{Cell, RefCell};
    use std::{collections::BTreeMap, format, string::String, vec::Vec};

    use common::{Color, Reporter};
    use x86_64::PhysAddr;

    use crate::{
        address::{ConfigAddress, Locator},
        memory::MemoryAccess,
        transport::ConfigSpaceTransport,
    };

    /// Simulated configuration space. Unset dwords read as all ones.
    pub struct MockConfigSpace {
        regs: RefCell<BTreeMap<(Locator, u8), u32>>,
        reads: Cell<usize>,
        writes: Cell<usize>,
    }

    impl MockConfigSpace {
        pub fn new() -> Self {
            Self {
                regs: RefCell::new(BTreeMap::new()),
                reads: Cell::new(0),
                writes: Cell::new(0),
            }
        }

        pub fn set(&self, locator: Locator, offset: u8, value: u32) {
            self.regs
                .borrow_mut()
                .insert((locator, offset & 0xfc), value);
        }

        pub fn get(&self, locator: Locator, offset: u8) -> u32 {
            *self
                .regs
                .borrow()
                .get(&(locator, offset & 0xfc))
                .unwrap_or(&0xffff_ffff)
        }

        pub fn reads(&self) -> usize {
            self.reads.get()
        }

        pub fn writes(&self) -> usize {
            self.writes.get()
        }

        pub fn reset_counts(&self) {
            self.reads.set(0);
            self.writes.set(0);
        }
    }

    impl ConfigSpaceTransport for MockConfigSpace {
        fn read32(&self, address: ConfigAddress) -> u32 {
            self.reads.set(self.reads.get() + 1);
            self.get(address.locator(), address.offset())
        }

        fn write32(&self, address: ConfigAddress, value: u32) {
            self.writes.set(self.writes.get() + 1);
            self.set(address.locator(), address.offset(), value);
        }
    }

    /// Byte addressed memory, zero where never written.
    pub struct MockMemory {
        bytes: RefCell<BTreeMap<u64, u8>>,
        writes: Cell<usize>,
    }

    impl MockMemory {
        pub fn new() -> Self {
            Self {
                bytes: RefCell::new(BTreeMap::new()),
                writes: Cell::new(0),
            }
        }

        pub fn writes(&self) -> usize {
            self.writes.get()
        }

        fn load(&self, address: u64, len: u64) -> u64 {
            let bytes = self.bytes.borrow();
            (0..len).fold(0, |acc, i| {
                acc | u64::from(*bytes.get(&(address + i)).unwrap_or(&0)) << (i * 8)
            })
        }

        fn store(&self, address: u64, len: u64, value: u64) {
            self.writes.set(self.writes.get() + 1);
            let mut bytes = self.bytes.borrow_mut();
            for i in 0..len {
                bytes.insert(address + i, (value >> (i * 8)) as u8);
            }
        }

        pub fn get32(&self, address: u64) -> u32 {
            self.load(address, 4) as u32
        }

        pub fn get64(&self, address: u64) -> u64 {
            self.load(address, 8)
        }
    }

    impl MemoryAccess for MockMemory {
        fn read32(&self, address: PhysAddr) -> u32 {
            self.get32(address.as_u64())
        }

        fn write32(&self, address: PhysAddr, value: u32) {
            self.store(address.as_u64(), 4, value.into())
        }

        fn read64(&self, address: PhysAddr) -> u64 {
            self.get64(address.as_u64())
        }

        fn write64(&self, address: PhysAddr, value: u64) {
            self.store(address.as_u64(), 8, value)
        }
    }

    /// Collects reported text, rendering hex and decimals like the console.
    pub struct RecordingReporter {
        pub text: String,
        pub colors: Vec<(Color, Color)>,
    }

    impl RecordingReporter {
        pub fn new() -> Self {
            Self {
                text: String::new(),
                colors: Vec::new(),
            }
        }
    }

    impl Reporter for RecordingReporter {
        fn write_text(&mut self, text: &str, fg: Color, bg: Color) {
            self.text.push_str(text);
            self.colors.push((fg, bg));
        }

        fn write_hex(&mut self, value: u32) {
            self.text.push_str(&format!("{value:08X}"));
        }

        fn write_decimal(&mut self, value: i64) {
            self.text.push_str(&format!("{value}"));
        }

        fn newline(&mut self) {
            self.text.push('\n');
        }
    }

    #[test]
    pub fn test_driver_find_capability() {
        let locator = Locator::new(0, 1, 0);
        let mock = MockConfigSpace::new();
        mock.set(locator, 0x04, 0x0010_0000);
        mock.set(locator, 0x34, 0x60);
        mock.set(locator, 0x60, 0x0000_0011);
        let driver = crate::PciDriver::new(&mock);

        assert_eq!(Ok(Some(0x60)), driver.find_capability(locator, crate::cap::MSIX_ID));
        assert_eq!(Ok(None), driver.find_capability(locator, crate::cap::MSI_ID));
    }
}
