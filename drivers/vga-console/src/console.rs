use core::fmt::Write;

use common::Reporter;
use heapless::String;

use crate::{COLUMNS, CellSink, Color, ROWS, ScreenChar};

const TAB_WIDTH: usize = 4;
/// Rendered for anything outside printable ASCII.
const UNPRINTABLE: u8 = 0xfe;

const DEFAULT_FG_COLOR: Color = Color::White;
const DEFAULT_BG_COLOR: Color = Color::Black;

/// Text console over an 80x25 character grid.
///
/// Owns the grid and the cursor; every changed cell is forwarded to the
/// sink. Single writer only: interleaved callers get interleaved characters.
pub struct Console<S: CellSink> {
    sink: S,
    cells: [[ScreenChar; COLUMNS]; ROWS],
    column: usize,
    row: usize,
}

impl<S: CellSink> Console<S> {
    /// The sink is not touched until the first write or [`Console::clear`].
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            cells: [[ScreenChar::blank(DEFAULT_BG_COLOR); COLUMNS]; ROWS],
            column: 0,
            row: 0,
        }
    }

    /// Cursor as `(x, y)`.
    pub fn cursor(&self) -> (usize, usize) {
        (self.column, self.row)
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<ScreenChar> {
        self.cells.get(y)?.get(x).copied()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn set_cell(&mut self, x: usize, y: usize, cell: ScreenChar) {
        self.cells[y][x] = cell;
        self.sink.write_cell(y, x, cell);
    }

    /// Draws `ch` at `(x, y)` without moving the cursor.
    pub fn put_char(&mut self, x: usize, y: usize, fg: Color, bg: Color, ch: u8) {
        if x >= COLUMNS || y >= ROWS {
            return;
        }
        self.set_cell(x, y, ScreenChar::new(ch, fg, bg));
    }

    /// Blanks the screen and homes the cursor.
    pub fn clear(&mut self) {
        self.column = 0;
        self.row = 0;
        for y in 0..ROWS {
            self.fill_row(y, ScreenChar::blank(DEFAULT_BG_COLOR));
        }
    }

    pub fn clear_line(&mut self, line: usize) {
        if line >= ROWS {
            return;
        }
        self.fill_row(line, ScreenChar::blank(DEFAULT_BG_COLOR));
    }

    /// Moves the cursor; out of range positions are ignored.
    pub fn set_cursor(&mut self, x: usize, y: usize) {
        if x < COLUMNS && y < ROWS {
            self.column = x;
            self.row = y;
        }
    }

    pub fn print_char(&mut self, fg: Color, bg: Color, ch: char) {
        match ch {
            '\n' => {
                self.column = 0;
                self.row += 1;
            }
            '\t' => {
                self.column += TAB_WIDTH - (self.column % TAB_WIDTH);
            }
            ch => {
                self.put_char(self.column, self.row, fg, bg, encode(ch));
                self.column += 1;
            }
        }

        if self.column >= COLUMNS {
            self.column = 0;
            self.row += 1;
        }
        if self.row >= ROWS {
            self.row = ROWS - 1;
            self.scroll_up(bg);
        }
    }

    /// Prints in the default colours.
    pub fn print(&mut self, s: &str) {
        self.print_colored(s, DEFAULT_FG_COLOR, DEFAULT_BG_COLOR);
    }

    pub fn print_colored(&mut self, s: &str, fg: Color, bg: Color) {
        for ch in s.chars() {
            self.print_char(fg, bg, ch);
        }
    }

    /// Moves the cursor to the start of `line` and prints there.
    pub fn print_on(&mut self, line: usize, s: &str) {
        if line >= ROWS {
            return;
        }
        self.column = 0;
        self.row = line;
        self.print(s);
    }

    pub fn print_decimal(&mut self, value: i64) {
        // "-9223372036854775808"
        let mut buf: String<20> = String::new();
        if write!(buf, "{value}").is_ok() {
            self.print(&buf);
        }
    }

    /// Eight upper case hex digits, no prefix.
    pub fn print_hex(&mut self, value: u32) {
        let mut buf: String<8> = String::new();
        if write!(buf, "{value:08X}").is_ok() {
            self.print(&buf);
        }
    }

    pub fn newline(&mut self) {
        self.print_char(DEFAULT_FG_COLOR, DEFAULT_BG_COLOR, '\n');
    }

    fn fill_row(&mut self, y: usize, cell: ScreenChar) {
        for x in 0..COLUMNS {
            self.set_cell(x, y, cell);
        }
    }

    fn scroll_up(&mut self, bg: Color) {
        self.cells.copy_within(1.., 0);
        for y in 0..ROWS - 1 {
            for x in 0..COLUMNS {
                self.sink.write_cell(y, x, self.cells[y][x]);
            }
        }
        self.fill_row(ROWS - 1, ScreenChar::blank(bg));
    }
}

fn encode(ch: char) -> u8 {
    match ch {
        ' '..='~' => ch as u8,
        _ => UNPRINTABLE,
    }
}

impl<S: CellSink> Write for Console<S> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.print(s);
        Ok(())
    }
}

impl<S: CellSink> Reporter for Console<S> {
    fn write_text(&mut self, text: &str, fg: Color, bg: Color) {
        self.print_colored(text, fg, bg);
    }

    fn write_hex(&mut self, value: u32) {
        self.print_hex(value);
    }

    fn write_decimal(&mut self, value: i64) {
        self.print_decimal(value);
    }

    fn newline(&mut self) {
        Console::newline(self);
    }
}
