#![no_std]

//! COM1 output and a `log` backend on top of it.

use core::fmt::Write;

use bitflags::bitflags;
use conquer_once::{TryInitError, spin::OnceCell};
use log::{LevelFilter, Log, Metadata, Record};
use port::SerialPort;
use spin::Mutex;

use crate::error::InitError;

pub mod error;
pub mod port;

pub const SERIAL1_ADDR: u16 = 0x03f8;

static SERIAL1: OnceCell<Mutex<SerialPort>> = OnceCell::uninit();
static LOGGER: SerialLogger = SerialLogger;

/// # Safety
///
/// COM1 must exist and nothing else may drive it.
pub unsafe fn serial1_init() -> Result<(), TryInitError> {
    SERIAL1.try_init_once(|| {
        let mut serial_port = unsafe { SerialPort::new(SERIAL1_ADDR) };
        serial_port.init();
        Mutex::new(serial_port)
    })
}

/// Brings up COM1 and installs [`SerialLogger`] as the global logger.
///
/// # Safety
///
/// Same as [`serial1_init`].
pub unsafe fn init_logger(level: LevelFilter) -> Result<(), InitError> {
    unsafe { serial1_init() }?;
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

bitflags! {
    /// Line status flags
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct LineStsFlags: u8 {
        const INPUT_FULL = 1;
        // 1 to 4 unknown
        const OUTPUT_EMPTY = 1 << 5;
        // 6 and 7 unknown
    }
}

#[macro_export]
macro_rules! retry_until_ok {
    ($cond:expr) => {
        loop {
            if let Ok(ok) = $cond {
                break ok;
            }
            core::hint::spin_loop();
        }
    };
}

/// Writes one line per record to COM1. Records logged before
/// [`serial1_init`] are dropped.
pub struct SerialLogger;

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Ok(serial1) = SERIAL1.try_get() {
            let _ = write_record(&mut *serial1.lock(), record);
        }
    }

    fn flush(&self) {}
}

/// `[LEVEL target] message`
pub fn write_record<W: Write>(writer: &mut W, record: &Record) -> core::fmt::Result {
    writeln!(
        writer,
        "[{:<5} {}] {}",
        record.level(),
        record.target(),
        record.args()
    )
}
