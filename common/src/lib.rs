#![no_std]

/// The 16 colors of the VGA text mode palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0x0,
    Blue = 0x1,
    Green = 0x2,
    Cyan = 0x3,
    Red = 0x4,
    Magenta = 0x5,
    Brown = 0x6,
    LightGray = 0x7,
    DarkGray = 0x8,
    LightBlue = 0x9,
    LightGreen = 0xa,
    LightCyan = 0xb,
    LightRed = 0xc,
    LightMagenta = 0xd,
    Yellow = 0xe,
    White = 0xf,
}

/// Sink for human readable diagnostics.
///
/// Every method is fire-and-forget: a reporter that cannot display something
/// drops it rather than failing the caller.
pub trait Reporter {
    fn write_text(&mut self, text: &str, fg: Color, bg: Color);

    /// Writes `value` as 8 upper case hex digits, without a prefix.
    fn write_hex(&mut self, value: u32);

    fn write_decimal(&mut self, value: i64);

    fn newline(&mut self);
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn write_text(&mut self, text: &str, fg: Color, bg: Color) {
        (**self).write_text(text, fg, bg)
    }

    fn write_hex(&mut self, value: u32) {
        (**self).write_hex(value)
    }

    fn write_decimal(&mut self, value: i64) {
        (**self).write_decimal(value)
    }

    fn newline(&mut self) {
        (**self).newline()
    }
}
