use x86::io::{inb, outb};

use crate::{LineStsFlags, error::WouldBlockError, retry_until_ok};

/// A 16550 compatible UART driven through I/O ports.
pub struct SerialPort(u16);

impl SerialPort {
    /// Data register, or divisor low byte while DLAB is set.
    fn port_data(&self) -> u16 {
        self.0
    }

    /// Interrupt enable register, or divisor high byte while DLAB is set.
    fn port_int_en(&self) -> u16 {
        self.0 + 1
    }

    fn port_fifo_ctrl(&self) -> u16 {
        self.0 + 2
    }

    fn port_line_ctrl(&self) -> u16 {
        self.0 + 3
    }

    fn port_modem_ctrl(&self) -> u16 {
        self.0 + 4
    }

    fn port_line_sts(&self) -> u16 {
        self.0 + 5
    }

    /// Creates a serial port interface on the given I/O base port.
    ///
    /// # Safety
    ///
    /// `base` must be the base port of a UART and the caller must have the
    /// right to perform I/O on it.
    pub const unsafe fn new(base: u16) -> Self {
        Self(base)
    }

    /// 38400 baud, 8N1, FIFOs on, interrupts off.
    pub fn init(&mut self) {
        unsafe {
            outb(self.port_int_en(), 0x00);
            // DLAB on, divisor 3
            outb(self.port_line_ctrl(), 0x80);
            outb(self.port_data(), 0x03);
            outb(self.port_int_en(), 0x00);
            // DLAB off, 8 bits, no parity, one stop bit
            outb(self.port_line_ctrl(), 0x03);
            outb(self.port_fifo_ctrl(), 0xc7);
            // DTR, RTS, OUT2
            outb(self.port_modem_ctrl(), 0x0b);
        }
    }

    /// Sends a byte, translating `\n` to `\r\n` and backspace to an erase.
    pub fn send(&mut self, data: u8) {
        match data {
            b'\n' => {
                self.send_raw(b'\r');
                self.send_raw(b'\n');
            }
            8 | 0x7f => {
                self.send_raw(8);
                self.send_raw(b' ');
                self.send_raw(8);
            }
            data => self.send_raw(data),
        }
    }

    /// Sends a raw byte, spinning until the transmitter is free.
    pub fn send_raw(&mut self, data: u8) {
        retry_until_ok!(self.try_send_raw(data))
    }

    pub fn try_send_raw(&mut self, data: u8) -> Result<(), WouldBlockError> {
        if !self.line_sts().contains(LineStsFlags::OUTPUT_EMPTY) {
            return Err(WouldBlockError);
        }
        unsafe { outb(self.port_data(), data) };
        Ok(())
    }

    fn line_sts(&mut self) -> LineStsFlags {
        LineStsFlags::from_bits_truncate(unsafe { inb(self.port_line_sts()) })
    }
}

impl core::fmt::Write for SerialPort {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for byte in s.bytes() {
            self.send(byte);
        }
        Ok(())
    }
}
