//! Byte-level grammar shared by the batch parser and the cell stream.
//!
//! A [`Grammar`] only tracks quoting state, the pending carriage return and the
//! bytes of the cell in progress. It reports where cells and rows end; what to
//! do with a finished cell is up to the driver. Each driver owns its own
//! instance, so batch loads and streams never share state.

/// Quoting state of the cell in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseState {
    /// Outside quotes; separators and line breaks are structural
    #[default]
    Normal,
    /// Inside a quoted field; everything but `"` is literal
    InQuotes,
    /// Saw a `"` inside a quoted field: either an escape or the closing quote
    QuoteInQuotes,
}

/// What a single byte completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Boundary {
    /// Still inside the current cell
    None,
    /// The current cell ended; the row continues
    Cell,
    /// The current cell and its row ended
    Row,
}

#[derive(Debug, Clone)]
pub(crate) struct Grammar {
    separator: u8,
    state: ParseState,
    pending_cr: bool,
    cell: Vec<u8>,
}

impl Grammar {
    pub(crate) fn new(separator: u8) -> Self {
        Self {
            separator,
            state: ParseState::Normal,
            pending_cr: false,
            cell: Vec::new(),
        }
    }

    /// Advance by one byte.
    ///
    /// A `\r` ends the row at once; an `\n` directly after it is swallowed so a
    /// CRLF pair yields one row break even when split across reads.
    #[inline]
    pub(crate) fn feed(&mut self, byte: u8) -> Boundary {
        if std::mem::take(&mut self.pending_cr) && byte == b'\n' {
            return Boundary::None;
        }

        match self.state {
            ParseState::Normal => match byte {
                b'"' => {
                    self.state = ParseState::InQuotes;
                    Boundary::None
                },
                b'\n' => Boundary::Row,
                b'\r' => {
                    self.pending_cr = true;
                    Boundary::Row
                },
                b if b == self.separator => Boundary::Cell,
                b => {
                    self.cell.push(b);
                    Boundary::None
                },
            },
            ParseState::InQuotes => {
                if byte == b'"' {
                    self.state = ParseState::QuoteInQuotes;
                } else {
                    self.cell.push(byte);
                }
                Boundary::None
            },
            ParseState::QuoteInQuotes => match byte {
                b'"' => {
                    // Doubled quote
                    self.cell.push(b'"');
                    self.state = ParseState::InQuotes;
                    Boundary::None
                },
                b'\n' => {
                    self.state = ParseState::Normal;
                    Boundary::Row
                },
                b'\r' => {
                    self.state = ParseState::Normal;
                    self.pending_cr = true;
                    Boundary::Row
                },
                b if b == self.separator => {
                    self.state = ParseState::Normal;
                    Boundary::Cell
                },
                b => {
                    // Stray byte after a closing quote: keep it and leave quoting
                    self.cell.push(b);
                    self.state = ParseState::Normal;
                    Boundary::None
                },
            },
        }
    }

    pub(crate) fn state(&self) -> ParseState {
        self.state
    }

    pub(crate) fn has_pending_cell(&self) -> bool {
        !self.cell.is_empty()
    }

    /// Take the finished cell, replacing invalid UTF-8 sequences.
    pub(crate) fn take_cell(&mut self) -> String {
        let bytes = std::mem::take(&mut self.cell);
        match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }
}
