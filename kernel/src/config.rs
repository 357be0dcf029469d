use bootloader_api::{BootloaderConfig, config::Mapping};
use log::LevelFilter;
use pci::msix::{MsixMessage, PbaAccess};

pub static BOOTLOADER_CONFIG: BootloaderConfig = {
    let mut config = BootloaderConfig::new_default();
    // VGA text memory and MSI-X tables are reached through this mapping
    config.mappings.physical_memory = Some(Mapping::Dynamic);
    config
};

#[cfg(feature = "verbose")]
pub const LOG_LEVEL: LevelFilter = LevelFilter::Trace;
#[cfg(not(feature = "verbose"))]
pub const LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Vectors requested from every MSI-X capable function, capped at the
/// function's table size.
pub const MSIX_VECTORS: u16 = 4;

/// Fixed delivery to the bootstrap processor's local APIC, vectors from 0x40.
pub const MSIX_MESSAGE: MsixMessage = MsixMessage {
    address: 0xfee0_0000,
    data: 0x40,
};

pub const PBA_ACCESS: PbaAccess = PbaAccess::Qword;
