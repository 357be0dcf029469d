//! Text reports of enumeration and capability results.

use common::{Color, Reporter};

use crate::{
    PciDriver,
    address::Locator,
    error::{PciError, Result},
    function::PciFunction,
    iter::PciDevice,
    msix::MsixCapabilityState,
    transport::ConfigSpaceTransport,
};

const BG: Color = Color::Black;

/// Prints every responding device and returns how many were found.
pub fn devices<T: ConfigSpaceTransport, R: Reporter + ?Sized>(
    driver: &PciDriver<'_, T>,
    reporter: &mut R,
) -> usize {
    header(reporter);

    let mut count = 0;
    for found in driver.devices() {
        device(&found, reporter);
        count += 1;
    }
    count
}

/// The line printed before the first device.
pub fn header<R: Reporter + ?Sized>(reporter: &mut R) {
    reporter.write_text("Enumerating PCI Devices...", Color::Yellow, BG);
    reporter.newline();
}

/// One "Found PCI Device" line, for callers that enumerate themselves.
pub fn device<T: ConfigSpaceTransport, R: Reporter + ?Sized>(
    device: &PciDevice<'_, T>,
    reporter: &mut R,
) {
    let locator = device.locator();
    reporter.write_text("Found PCI Device: Bus ", Color::Green, BG);
    reporter.write_decimal(locator.bus().into());
    reporter.write_text(" Device ", Color::Green, BG);
    reporter.write_decimal(locator.device().into());
    reporter.write_text(" Function ", Color::Green, BG);
    reporter.write_decimal(locator.function().into());
    reporter.write_text(" - Vendor ID: 0x", Color::White, BG);
    reporter.write_hex(device.vendor_id.into());
    reporter.write_text(" Device ID: 0x", Color::White, BG);
    reporter.write_hex(device.device_id.into());
    reporter.newline();
}

/// Prints one line per capability record.
///
/// A malformed chain is printed and then returned to the caller.
pub fn capabilities<T: ConfigSpaceTransport, R: Reporter + ?Sized>(
    function: &PciFunction<'_, T>,
    reporter: &mut R,
) -> Result<usize> {
    let mut count = 0;
    for cap in function.capabilities() {
        match cap {
            Ok(cap) => {
                reporter.write_text("  Capability 0x", Color::LightCyan, BG);
                reporter.write_hex(cap.id.into());
                reporter.write_text(" at 0x", Color::LightCyan, BG);
                reporter.write_hex(cap.offset.into());
                reporter.write_text(": ", Color::LightCyan, BG);
                reporter.write_text(cap.name(), Color::White, BG);
                reporter.newline();
                count += 1;
            }
            Err(err) => {
                error_line(function.locator(), err, reporter);
                return Err(err);
            }
        }
    }
    Ok(count)
}

/// Prints the outcome of an MSI-X setup. An absent device prints nothing.
pub fn msix<R: Reporter + ?Sized>(
    locator: Locator,
    result: &Result<MsixCapabilityState>,
    reporter: &mut R,
) {
    match result {
        Ok(state) => {
            location(locator, Color::LightGreen, reporter);
            reporter.write_text("MSI-X enabled, ", Color::LightGreen, BG);
            reporter.write_decimal(state.vector_count.into());
            reporter.write_text(" vectors, table 0x", Color::LightGreen, BG);
            write_hex64(state.table_base.as_u64(), reporter);
            reporter.write_text(" PBA 0x", Color::LightGreen, BG);
            write_hex64(state.pba_base.as_u64(), reporter);
            reporter.newline();
        }
        Err(PciError::DeviceAbsent) => {}
        Err(PciError::CapabilityNotFound) => {
            location(locator, Color::LightGray, reporter);
            reporter.write_text("no MSI-X capability", Color::LightGray, BG);
            reporter.newline();
        }
        Err(err) => error_line(locator, *err, reporter),
    }
}

fn error_line<R: Reporter + ?Sized>(locator: Locator, err: PciError, reporter: &mut R) {
    location(locator, Color::LightRed, reporter);
    match err {
        PciError::DeviceAbsent => reporter.write_text("no device present", Color::LightRed, BG),
        PciError::CapabilityNotFound => {
            reporter.write_text("capability not found", Color::LightRed, BG)
        }
        PciError::MalformedCapabilityChain => {
            reporter.write_text("malformed capability chain", Color::LightRed, BG)
        }
        PciError::InvalidVectorCount(count) => {
            reporter.write_text("invalid vector count ", Color::LightRed, BG);
            reporter.write_decimal(count.into());
        }
        PciError::UnsupportedBar(index) => {
            reporter.write_text("unsupported BAR", Color::LightRed, BG);
            reporter.write_decimal(index.into());
        }
        PciError::InvalidRegion => {
            reporter.write_text("invalid MSI-X table/PBA region", Color::LightRed, BG)
        }
    }
    reporter.newline();
}

fn location<R: Reporter + ?Sized>(locator: Locator, fg: Color, reporter: &mut R) {
    reporter.write_text("  ", fg, BG);
    reporter.write_decimal(locator.bus().into());
    reporter.write_text(":", fg, BG);
    reporter.write_decimal(locator.device().into());
    reporter.write_text(".", fg, BG);
    reporter.write_decimal(locator.function().into());
    reporter.write_text(" ", fg, BG);
}

fn write_hex64<R: Reporter + ?Sized>(value: u64, reporter: &mut R) {
    reporter.write_hex((value >> 32) as u32);
    reporter.write_hex(value as u32);
}

#[cfg(test)]
mod tests {
    extern crate std;

    use x86_64::PhysAddr;

    use super::*;
    use crate::{
        msix::MsixRegion,
        tests::{MockConfigSpace, RecordingReporter},
    };

    #[test]
    pub fn test_devices() {
        let mock = MockConfigSpace::new();
        mock.set(Locator::new(0, 3, 0), 0x00, 0x100e_8086);
        mock.set(Locator::new(1, 0, 2), 0x00, 0x1041_1af4);
        let driver = PciDriver::new(&mock);
        let mut reporter = RecordingReporter::new();

        assert_eq!(2, devices(&driver, &mut reporter));

        assert_eq!(
            "Enumerating PCI Devices...\n\
             Found PCI Device: Bus 0 Device 3 Function 0 - Vendor ID: 0x00008086 Device ID: 0x0000100E\n\
             Found PCI Device: Bus 1 Device 0 Function 2 - Vendor ID: 0x00001AF4 Device ID: 0x00001041\n",
            reporter.text
        );
        assert_eq!(Some(&(Color::Yellow, Color::Black)), reporter.colors.first());
    }

    #[test]
    pub fn test_single_pass_matches_devices() {
        let mock = MockConfigSpace::new();
        let locator = Locator::new(0, 4, 0);
        mock.set(locator, 0x00, 0x1041_1af4);
        mock.set(locator, 0x04, 0x0010_0000);
        mock.set(locator, 0x34, 0x40);
        mock.set(locator, 0x40, 0x0000_0011);
        mock.set(Locator::new(2, 0, 0), 0x00, 0x100e_8086);
        mock.set(Locator::new(2, 0, 0), 0x04, 0x0000_0000);
        let driver = PciDriver::new(&mock);

        let mut expected = RecordingReporter::new();
        devices(&driver, &mut expected);

        let mut reporter = RecordingReporter::new();
        mock.reset_counts();
        header(&mut reporter);
        for found in driver.devices() {
            device(&found, &mut reporter);
        }
        // one vendor ID read per locator
        assert_eq!(65536, mock.reads());
        assert_eq!(expected.text, reporter.text);

        let mut reporter = RecordingReporter::new();
        header(&mut reporter);
        for found in driver.devices() {
            device(&found, &mut reporter);
            capabilities(&found.function, &mut reporter).unwrap();
        }
        assert_eq!(
            "Enumerating PCI Devices...\n\
             Found PCI Device: Bus 0 Device 4 Function 0 - Vendor ID: 0x00001AF4 Device ID: 0x00001041\n\
             \x20 Capability 0x00000011 at 0x00000040: MSI-X\n\
             Found PCI Device: Bus 2 Device 0 Function 0 - Vendor ID: 0x00008086 Device ID: 0x0000100E\n",
            reporter.text
        );
    }

    #[test]
    pub fn test_capabilities() {
        let locator = Locator::new(0, 4, 0);
        let mock = MockConfigSpace::new();
        mock.set(locator, 0x04, 0x0010_0000);
        mock.set(locator, 0x34, 0x40);
        mock.set(locator, 0x40, 0x0000_7005);
        mock.set(locator, 0x70, 0x0000_0011);
        let driver = PciDriver::new(&mock);
        let mut reporter = RecordingReporter::new();

        assert_eq!(Ok(2), capabilities(&driver.function(locator), &mut reporter));
        assert_eq!(
            "  Capability 0x00000005 at 0x00000040: MSI\n  Capability 0x00000011 at 0x00000070: MSI-X\n",
            reporter.text
        );
    }

    #[test]
    pub fn test_malformed_capabilities() {
        let locator = Locator::new(0, 4, 0);
        let mock = MockConfigSpace::new();
        mock.set(locator, 0x04, 0x0010_0000);
        mock.set(locator, 0x34, 0x40);
        mock.set(locator, 0x40, 0x0000_4001);
        let driver = PciDriver::new(&mock);
        let mut reporter = RecordingReporter::new();

        assert_eq!(
            Err(PciError::MalformedCapabilityChain),
            capabilities(&driver.function(locator), &mut reporter)
        );
        assert!(reporter.text.ends_with("  0:4.0 malformed capability chain\n"));
        assert_eq!(Some(&(Color::LightRed, Color::Black)), reporter.colors.last());
    }

    #[test]
    pub fn test_msix_outcomes() {
        let locator = Locator::new(0, 5, 0);
        let state = MsixCapabilityState {
            cap_offset: 0x70,
            vector_count: 4,
            table: MsixRegion::new(0, 0).unwrap(),
            pba: MsixRegion::new(0, 0x800).unwrap(),
            table_base: PhysAddr::new(0xfebd_0000),
            pba_base: PhysAddr::new(0xfebd_0800),
            enabled: true,
        };

        let mut reporter = RecordingReporter::new();
        msix(locator, &Ok(state), &mut reporter);
        assert_eq!(
            "  0:5.0 MSI-X enabled, 4 vectors, table 0x00000000FEBD0000 PBA 0x00000000FEBD0800\n",
            reporter.text
        );

        let mut reporter = RecordingReporter::new();
        msix(locator, &Err(PciError::DeviceAbsent), &mut reporter);
        assert!(reporter.text.is_empty());

        let mut reporter = RecordingReporter::new();
        msix(locator, &Err(PciError::InvalidVectorCount(0)), &mut reporter);
        assert_eq!("  0:5.0 invalid vector count 0\n", reporter.text);
    }
}
