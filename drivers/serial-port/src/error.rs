use conquer_once::TryInitError;
use log::SetLoggerError;

/// The `WouldBlockError` error indicates that the serial device was not ready immediately.
#[non_exhaustive]
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct WouldBlockError;

impl core::fmt::Display for WouldBlockError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("serial device not ready")
    }
}

#[derive(Debug)]
pub enum InitError {
    /// COM1 was already set up.
    Serial(TryInitError),
    /// Another logger was installed first.
    Logger(SetLoggerError),
}

impl From<TryInitError> for InitError {
    fn from(value: TryInitError) -> Self {
        Self::Serial(value)
    }
}

impl From<SetLoggerError> for InitError {
    fn from(value: SetLoggerError) -> Self {
        Self::Logger(value)
    }
}

impl core::fmt::Display for InitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            InitError::Serial(_) => f.write_str("serial port already initialized"),
            InitError::Logger(_) => f.write_str("logger already installed"),
        }
    }
}
