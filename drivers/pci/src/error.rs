use core::fmt::Display;

use crate::msix::MAX_VECTORS;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PciError {
    /// Vendor ID read back as 0xffff. Routine for unpopulated locators.
    DeviceAbsent,
    /// Capability list missing or no record with the requested ID.
    CapabilityNotFound,
    /// The capability chain did not terminate within the config space bound,
    /// or a capability structure runs past the end of config space.
    MalformedCapabilityChain,
    /// MSI-X vector counts are limited to 1..=2048.
    InvalidVectorCount(u16),
    /// BAR index out of range or not a decodable memory BAR.
    UnsupportedBar(u8),
    /// MSI-X table/PBA offset not 8 byte aligned, or BIR out of range.
    InvalidRegion,
}

impl Display for PciError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PciError::DeviceAbsent => f.write_str("no device present"),
            PciError::CapabilityNotFound => f.write_str("capability not found"),
            PciError::MalformedCapabilityChain => f.write_str("malformed capability chain"),
            PciError::InvalidVectorCount(count) => {
                write!(f, "invalid vector count {count} (expected 1..={MAX_VECTORS})")
            }
            PciError::UnsupportedBar(index) => write!(f, "unsupported BAR{index}"),
            PciError::InvalidRegion => f.write_str("invalid MSI-X table/PBA region"),
        }
    }
}

impl core::error::Error for PciError {}

pub type Result<T> = core::result::Result<T, PciError>;
