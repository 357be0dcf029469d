#![no_std]

pub mod console;

pub use common::Color;

pub const COLUMNS: usize = 80;
pub const ROWS: usize = 25;

/// Physical address of the colour text mode buffer.
pub const VGA_TEXT_BUFFER: u64 = 0xb8000;

/// One character cell: a code page 437 byte and its colour attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct ScreenChar {
    pub ascii: u8,
    /// `(background << 4) | foreground`
    pub attribute: u8,
}

impl ScreenChar {
    pub const fn new(ascii: u8, fg: Color, bg: Color) -> Self {
        Self {
            ascii,
            attribute: ((bg as u8) << 4) | fg as u8,
        }
    }

    pub const fn blank(bg: Color) -> Self {
        Self::new(b' ', bg, bg)
    }

    /// The value stored in text mode memory.
    pub const fn to_u16(&self) -> u16 {
        ((self.attribute as u16) << 8) | self.ascii as u16
    }
}

/// Receives every cell the console changes.
pub trait CellSink {
    fn write_cell(&mut self, row: usize, column: usize, cell: ScreenChar);
}

/// Discards output; the console's own grid still records it.
pub struct NullSink;

impl CellSink for NullSink {
    fn write_cell(&mut self, _row: usize, _column: usize, _cell: ScreenChar) {}
}

/// The 80x25 text mode buffer.
pub struct VgaTextBuffer {
    base: *mut u16,
}

impl VgaTextBuffer {
    /// # Safety
    ///
    /// `base` must point at mapped VGA text memory, `COLUMNS * ROWS` cells
    /// long, with no other writer.
    pub const unsafe fn new(base: *mut u16) -> Self {
        Self { base }
    }
}

impl CellSink for VgaTextBuffer {
    fn write_cell(&mut self, row: usize, column: usize, cell: ScreenChar) {
        if row >= ROWS || column >= COLUMNS {
            return;
        }
        unsafe {
            self.base
                .add(row * COLUMNS + column)
                .write_volatile(cell.to_u16());
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_hex::assert_eq_hex;

    use super::*;

    #[test]
    pub fn test_attribute() {
        let cell = ScreenChar::new(b'A', Color::Yellow, Color::Blue);
        assert_eq_hex!(0x1e, cell.attribute);
        assert_eq_hex!(0x1e41, cell.to_u16());

        assert_eq_hex!(0x0020, ScreenChar::blank(Color::Black).to_u16());
    }
}
