use x86_64::PhysAddr;

/// Access to device memory (MSI-X table and PBA) by physical address.
pub trait MemoryAccess {
    fn read32(&self, address: PhysAddr) -> u32;

    fn write32(&self, address: PhysAddr, value: u32);

    fn read64(&self, address: PhysAddr) -> u64;

    fn write64(&self, address: PhysAddr, value: u64);
}

/// Physical memory reached through a linear mapping at a fixed offset, as
/// set up by the bootloader.
pub struct PhysicalMemory {
    offset: u64,
}

impl PhysicalMemory {
    /// # Safety
    ///
    /// All physical memory that will be accessed, including device MMIO
    /// ranges, must be mapped at `offset`. The mapping's page attributes are
    /// not changed here: MMIO is only uncached if the firmware's MTRRs mark
    /// the PCI hole uncacheable, as PC firmware does.
    pub const unsafe fn new(offset: u64) -> Self {
        Self { offset }
    }

    fn ptr<U>(&self, address: PhysAddr) -> *mut U {
        (self.offset + address.as_u64()) as *mut U
    }
}

impl MemoryAccess for PhysicalMemory {
    fn read32(&self, address: PhysAddr) -> u32 {
        unsafe { core::ptr::read_volatile(self.ptr(address)) }
    }

    fn write32(&self, address: PhysAddr, value: u32) {
        unsafe { core::ptr::write_volatile(self.ptr(address), value) }
    }

    fn read64(&self, address: PhysAddr) -> u64 {
        unsafe { core::ptr::read_volatile(self.ptr(address)) }
    }

    fn write64(&self, address: PhysAddr, value: u64) {
        unsafe { core::ptr::write_volatile(self.ptr(address), value) }
    }
}
