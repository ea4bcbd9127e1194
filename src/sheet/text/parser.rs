//! Chunked batch parser that fills a [`CellStore`]

use std::io::{ErrorKind, Read};

use tracing::warn;

use super::grammar::{Boundary, Grammar, ParseState};
use crate::common::Result;
use crate::sheet::coordinate::cell_key;
use crate::sheet::store::CellStore;

/// Outcome of a completed batch parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseSummary {
    /// Non-empty cells committed to the store
    pub cells: usize,
    /// Rows seen, including rows whose cells were all empty
    pub rows: u64,
    /// Widest row seen, counted in cells
    pub columns: u64,
    /// Non-empty cells past the last addressable row or column, not stored
    pub dropped: usize,
    /// The input ended inside a quoted field
    pub unterminated_quote: bool,
}

/// Batch parser that accepts input in arbitrary slices.
///
/// All state survives between [`feed`](Self::feed) calls, so a separator,
/// line break or quote split across two slices parses exactly like the
/// unsplit input. Call [`finish`](Self::finish) once after the last slice.
///
/// Rows and columns are counted past `u32::MAX`, but cells there have no key;
/// they are dropped and reported in [`ParseSummary::dropped`].
pub struct ChunkParser<'a> {
    store: &'a mut CellStore,
    grammar: Grammar,
    row: u64,
    col: u64,
    max_col: Option<u64>,
    cells: usize,
    dropped: usize,
}

impl<'a> ChunkParser<'a> {
    /// Create a parser committing into `store`.
    pub fn new(store: &'a mut CellStore, separator: u8) -> Self {
        ChunkParser {
            store,
            grammar: Grammar::new(separator),
            row: 0,
            col: 0,
            max_col: None,
            cells: 0,
            dropped: 0,
        }
    }

    /// Parse the next slice of input
    pub fn feed(&mut self, data: &[u8]) {
        for &byte in data {
            match self.grammar.feed(byte) {
                Boundary::None => {},
                Boundary::Cell => self.end_cell(),
                Boundary::Row => {
                    self.end_cell();
                    self.end_row();
                },
            }
        }
    }

    /// Flush the trailing cell and row after the final slice.
    ///
    /// Input ending inside a quoted field is accepted; the partial field is
    /// kept and a warning is logged.
    pub fn finish(mut self) -> ParseSummary {
        let unterminated_quote = self.grammar.state() == ParseState::InQuotes;
        if unterminated_quote {
            warn!(row = self.row + 1, "input ended inside a quoted field");
        }

        if self.grammar.has_pending_cell() {
            self.end_cell();
        }
        // Last line without a terminator
        if self.col > 0 {
            self.end_row();
        }

        ParseSummary {
            cells: self.cells,
            rows: self.row,
            columns: self.max_col.map_or(0, |c| c + 1),
            dropped: self.dropped,
            unterminated_quote,
        }
    }

    fn end_cell(&mut self) {
        self.max_col = Some(self.max_col.map_or(self.col, |c| c.max(self.col)));

        let value = self.grammar.take_cell();
        if !value.is_empty() {
            match (u32::try_from(self.row), u32::try_from(self.col)) {
                (Ok(row), Ok(col)) => {
                    self.store.insert(cell_key(row, col), value);
                    self.cells += 1;
                },
                _ => {
                    if self.dropped == 0 {
                        warn!(
                            row = self.row + 1,
                            column = self.col + 1,
                            "cell lies outside the addressable grid; dropping"
                        );
                    }
                    self.dropped += 1;
                },
            }
        }
        self.col += 1;
    }

    fn end_row(&mut self) {
        self.row += 1;
        self.col = 0;
    }
}

/// Parse everything `reader` yields into `store`, `chunk_size` bytes at a time.
///
/// The store is not cleared first.
pub fn parse_reader<R: Read>(
    mut reader: R,
    store: &mut CellStore,
    separator: u8,
    chunk_size: usize,
) -> Result<ParseSummary> {
    let mut parser = ChunkParser::new(store, separator);
    let mut buffer = vec![0u8; chunk_size.max(1)];

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        parser.feed(&buffer[..read]);
    }

    Ok(parser.finish())
}

/// Parse an in-memory buffer into `store`.
pub fn parse_bytes(data: &[u8], store: &mut CellStore, separator: u8) -> ParseSummary {
    let mut parser = ChunkParser::new(store, separator);
    parser.feed(data);
    parser.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn parse(input: &str) -> (CellStore, ParseSummary) {
        let mut store = CellStore::new();
        let summary = parse_bytes(input.as_bytes(), &mut store, b',');
        (store, summary)
    }

    #[test]
    fn test_simple_csv_parsing() {
        let (store, summary) = parse("name,age,city\nJohn,25,New York\nJane,30,London");

        assert_eq!(store.get("A1"), "name");
        assert_eq!(store.get("B2"), "25");
        assert_eq!(store.get("C2"), "New York");
        assert_eq!(store.get("C3"), "London");
        assert_eq!(summary.cells, 9);
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.columns, 3);
        assert!(!summary.unterminated_quote);
    }

    #[test]
    fn test_quoted_fields() {
        let (store, _) = parse("a,b\n\"x,y\",z\n");
        assert_eq!(store.get("A1"), "a");
        assert_eq!(store.get("B1"), "b");
        assert_eq!(store.get("A2"), "x,y");
        assert_eq!(store.get("B2"), "z");
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_escaped_quotes_and_newlines() {
        let (store, _) = parse("\"Value with \"\"quotes\"\"\",\"two\nlines\"\n");
        assert_eq!(store.get("A1"), "Value with \"quotes\"");
        assert_eq!(store.get("B1"), "two\nlines");
    }

    #[test]
    fn test_empty_cells_are_not_stored() {
        let (store, summary) = parse("a,,c\n,,\n");
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("B1"), "");
        assert_eq!(store.get("C1"), "c");
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.columns, 3);
    }

    #[test]
    fn test_empty_input() {
        let (store, summary) = parse("");
        assert!(store.is_empty());
        assert_eq!(summary, ParseSummary::default());
    }

    #[test]
    fn test_crlf_line_endings() {
        let (store, summary) = parse("a,b\r\nc,d\r\n");
        assert_eq!(store.get("A2"), "c");
        assert_eq!(store.get("B2"), "d");
        assert_eq!(summary.rows, 2);
    }

    #[test]
    fn test_blank_lines_advance_rows() {
        let (store, summary) = parse("a\n\nb\n");
        assert_eq!(store.get("A1"), "a");
        assert_eq!(store.get("A3"), "b");
        assert_eq!(summary.rows, 3);
    }

    #[test]
    fn test_unterminated_quote_is_kept() {
        let (store, summary) = parse("a,\"open field\nstill open");
        assert!(summary.unterminated_quote);
        assert_eq!(store.get("B1"), "open field\nstill open");
        assert_eq!(summary.rows, 1);
    }

    #[test]
    fn test_lenient_quote_recovery() {
        let (store, _) = parse("\"ab\"cd,e\n");
        assert_eq!(store.get("A1"), "abcd");
        assert_eq!(store.get("B1"), "e");
    }

    #[test]
    fn test_custom_separator() {
        let mut store = CellStore::new();
        parse_bytes(b"A1;B1;C1\nX;Y;Z\n", &mut store, b';');
        assert_eq!(store.get("C1"), "C1");
        assert_eq!(store.get("B2"), "Y");
    }

    #[test]
    fn test_search_index_is_filled() {
        let (store, _) = parse("x,y\ny,x\n");
        let mut keys = store.search("x");
        keys.sort();
        assert_eq!(keys, vec!["A1", "B2"]);
    }

    #[test]
    fn test_parse_reader_tiny_chunks() {
        let input = "\"a\r\nb\",\"c\"\"d\"\r\ne,f";
        let mut store = CellStore::new();
        let summary = parse_reader(Cursor::new(input), &mut store, b',', 1).unwrap();
        assert_eq!(store.get("A1"), "a\r\nb");
        assert_eq!(store.get("B1"), "c\"d");
        assert_eq!(store.get("B2"), "f");
        assert_eq!(summary.rows, 2);
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let input = "größe,naïve\n".as_bytes();
        let mut store = CellStore::new();
        let mut parser = ChunkParser::new(&mut store, b',');
        for byte in input {
            parser.feed(std::slice::from_ref(byte));
        }
        parser.finish();
        assert_eq!(store.get("A1"), "größe");
        assert_eq!(store.get("B1"), "naïve");
    }

    #[test]
    fn test_cells_past_last_row_are_dropped() {
        let mut store = CellStore::new();
        let mut parser = ChunkParser::new(&mut store, b',');
        parser.row = u64::from(u32::MAX);
        parser.feed(b"last,row\nbeyond,\n");
        let summary = parser.finish();

        assert_eq!(summary.cells, 2);
        assert_eq!(summary.dropped, 1);
        assert_eq!(summary.rows, u64::from(u32::MAX) + 2);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&cell_key(u32::MAX, 0)), "last");
        assert_eq!(store.get(&cell_key(u32::MAX, 1)), "row");
        assert!(store.search("beyond").is_empty());
    }

    #[test]
    fn test_cells_past_last_column_are_dropped() {
        let mut store = CellStore::new();
        let mut parser = ChunkParser::new(&mut store, b',');
        parser.col = u64::from(u32::MAX);
        parser.feed(b"edge,over,");
        let summary = parser.finish();

        assert_eq!(store.get(&cell_key(0, u32::MAX)), "edge");
        assert_eq!(store.len(), 1);
        assert_eq!(summary.dropped, 1);
        assert_eq!(summary.columns, u64::from(u32::MAX) + 2);
    }

    proptest! {
        #[test]
        fn prop_split_point_does_not_matter(
            cells in prop::collection::vec("[a-c,\"\r\n ]{0,6}", 1..12),
            split in any::<prop::sample::Index>(),
        ) {
            let input = cells.join(",");
            let bytes = input.as_bytes();

            let mut whole = CellStore::new();
            let whole_summary = parse_bytes(bytes, &mut whole, b',');

            let at = split.index(bytes.len() + 1);
            let mut parts = CellStore::new();
            let mut parser = ChunkParser::new(&mut parts, b',');
            parser.feed(&bytes[..at]);
            parser.feed(&bytes[at..]);
            let parts_summary = parser.finish();

            prop_assert_eq!(whole.cells(), parts.cells());
            prop_assert_eq!(whole_summary, parts_summary);
        }
    }
}
