#![no_std]
#![no_main]

use bootloader_api::BootInfo;
use core::panic::PanicInfo;

use pci::{
    PciDriver,
    function::PciFunction,
    memory::{MemoryAccess, PhysicalMemory},
    msix::{self, MsixCapabilityState, MsixSetup},
    report,
    transport::ConfigSpaceTransport,
    x86::PCI_CONFIG_PORT,
};
use vga_console::{VGA_TEXT_BUFFER, VgaTextBuffer, console::Console};

mod config;

bootloader_api::entry_point!(kernel_main, config = &config::BOOTLOADER_CONFIG);

fn kernel_main(boot_info: &'static mut BootInfo) -> ! {
    unsafe { serial_port::init_logger(config::LOG_LEVEL) }.expect("serial logger failed to init");

    let physical_memory_offset = boot_info
        .physical_memory_offset
        .into_option()
        .expect("physical memory is not mapped");

    let vga = unsafe { VgaTextBuffer::new((physical_memory_offset + VGA_TEXT_BUFFER) as *mut u16) };
    let mut console = Console::new(vga);
    console.clear();

    let driver = PciDriver::new(&PCI_CONFIG_PORT);
    let memory = unsafe { PhysicalMemory::new(physical_memory_offset) };

    report::header(&mut console);
    let mut found = 0;
    for device in driver.devices() {
        found += 1;
        log::info!("{device:?}");
        report::device(&device, &mut console);
        if report::capabilities(&device.function, &mut console).is_err() {
            continue;
        }
        let result = bring_up_msix(&device.function, &memory);
        if let Err(err) = &result {
            log::debug!("{}: msix not enabled: {err}", device.locator());
        }
        report::msix(device.locator(), &result, &mut console);
    }
    log::info!("{found} pci functions");

    loop {
        x86_64::instructions::hlt();
    }
}

/// Enables MSI-X keeping the table and PBA where the device put them.
fn bring_up_msix<T: ConfigSpaceTransport, M: MemoryAccess>(
    function: &PciFunction<'_, T>,
    memory: &M,
) -> pci::Result<MsixCapabilityState> {
    let layout = msix::read_msix_layout(function)?;
    let setup = MsixSetup {
        table: layout.table,
        pba: layout.pba,
        message: config::MSIX_MESSAGE,
        pba_access: config::PBA_ACCESS,
        unmasked: false,
    };
    let vectors = config::MSIX_VECTORS.min(layout.table_size);
    msix::enable_msix(function, vectors, &setup, memory)
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    log::error!("{info}");
    loop {
        x86_64::instructions::hlt();
    }
}
