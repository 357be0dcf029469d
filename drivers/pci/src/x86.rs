use spin::Mutex;
use x86_64::instructions::port::{PortGeneric, ReadWriteAccess};

use crate::{address::ConfigAddress, transport::ConfigSpaceTransport};

pub static PCI_CONFIG_PORT: X86ConfigSpaceTransport = X86ConfigSpaceTransport::new();

const PCI_CONFIG_ADDRESS: u16 = 0xcf8;
const PCI_CONFIG_DATA: u16 = 0xcfc;

/// Configuration mechanism #1: `CONFIG_ADDRESS` at 0xcf8, `CONFIG_DATA` at 0xcfc.
pub struct X86ConfigSpaceTransport {
    inner: Mutex<X86ConfigSpaceTransportInner>,
}

impl X86ConfigSpaceTransport {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(X86ConfigSpaceTransportInner::new()),
        }
    }
}

impl ConfigSpaceTransport for X86ConfigSpaceTransport {
    fn read32(&self, address: ConfigAddress) -> u32 {
        // the lock spans both port accesses; the address port is machine global
        let mut inner = self.inner.lock();
        unsafe {
            inner.address_port.write(address.raw());
            inner.data_port.read()
        }
    }

    fn write32(&self, address: ConfigAddress, value: u32) {
        let mut inner = self.inner.lock();
        unsafe {
            inner.address_port.write(address.raw());
            inner.data_port.write(value);
        }
    }
}

struct X86ConfigSpaceTransportInner {
    address_port: PortGeneric<u32, ReadWriteAccess>,
    data_port: PortGeneric<u32, ReadWriteAccess>,
}

impl X86ConfigSpaceTransportInner {
    const fn new() -> Self {
        Self {
            address_port: PortGeneric::new(PCI_CONFIG_ADDRESS),
            data_port: PortGeneric::new(PCI_CONFIG_DATA),
        }
    }
}
