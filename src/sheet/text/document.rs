//! Document facade over a single delimited text file

use std::fs::{File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};

use super::config::TextConfig;
use super::parser::{ParseSummary, parse_reader};
use super::stream::CellStream;
use super::writer;
use crate::common::{Error, Result};
use crate::sheet::coordinate::{canonical_key, cell_key, parse_key};
use crate::sheet::store::CellStore;

/// A delimited text file exposed as a sparse grid of "A1"-addressed cells.
///
/// The document owns its cell store, search index and any open stream. It is
/// not synchronized; callers serialize access themselves. Moving a document
/// out with [`std::mem::take`] leaves a closed, empty document behind.
///
/// Two independent views exist over the bound file:
///
/// - the random-access store, filled by [`load`](Self::load) and edited with
///   [`set_value`](Self::set_value);
/// - a cell stream, read with [`next_cell`](Self::next_cell).
///
/// Neither view refreshes the other.
#[derive(Debug, Default)]
pub struct CsvDocument {
    path: Option<PathBuf>,
    store: CellStore,
    config: TextConfig,
    stream: Option<CellStream<File>>,
}

impl CsvDocument {
    /// Create an unbound, empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an unbound, empty document with a custom configuration.
    pub fn with_config(config: TextConfig) -> Self {
        CsvDocument {
            config,
            ..Self::default()
        }
    }

    /// Bind to `path`, creating an empty file if none exists. Nothing is loaded.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, TextConfig::default())
    }

    /// Bind to `path` with a custom configuration.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: TextConfig) -> Result<Self> {
        let mut doc = Self::with_config(config);
        doc.reopen(path)?;
        Ok(doc)
    }

    /// Parse everything `reader` yields into a new unbound document.
    pub fn from_reader<R: Read>(reader: R, config: TextConfig) -> Result<Self> {
        let mut doc = Self::with_config(config);
        parse_reader(
            reader,
            &mut doc.store,
            doc.config.separator,
            doc.config.effective_chunk_size(),
        )?;
        Ok(doc)
    }

    /// Close the current file, then bind to `path` (created if absent).
    pub fn reopen<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.close();

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::file_open(path, e))?;

        self.path = Some(path.to_path_buf());
        Ok(())
    }

    /// Unbind the file, drop every cell and close the stream.
    pub fn close(&mut self) {
        self.path = None;
        self.store.clear();
        self.stream = None;
    }

    /// Whether a file path is bound.
    pub fn is_open(&self) -> bool {
        self.path.is_some()
    }

    /// The bound file path, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn config(&self) -> &TextConfig {
        &self.config
    }

    fn bound_path(&self) -> Result<&Path> {
        self.path.as_deref().ok_or(Error::UnboundDocument)
    }

    /// Replace the in-memory cells with the bound file's content.
    ///
    /// The store is cleared before the file is opened. If opening or reading
    /// fails, the document stays empty; earlier content is not restored.
    pub fn load(&mut self) -> Result<ParseSummary> {
        let path = self.bound_path()?.to_path_buf();
        self.store.clear();

        let file = File::open(&path).map_err(|e| Error::file_open(&path, e))?;
        let result = parse_reader(
            file,
            &mut self.store,
            self.config.separator,
            self.config.effective_chunk_size(),
        );

        match result {
            Ok(summary) => {
                debug!(
                    path = %path.display(),
                    cells = summary.cells,
                    rows = summary.rows,
                    columns = summary.columns,
                    "loaded cells"
                );
                Ok(summary)
            },
            Err(e) => {
                self.store.clear();
                Err(e)
            },
        }
    }

    /// Rewrite the bound file in place.
    pub fn save(&self) -> Result<()> {
        let path = self.bound_path()?;
        writer::save_direct(path, self.store.cells(), &self.config)
    }

    /// Write the cells to `path` in place. The bound path does not change.
    pub fn save_as<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        writer::save_direct(path.as_ref(), self.store.cells(), &self.config)
    }

    /// Replace the bound file through a write-then-rename.
    pub fn atomic_save(&self) -> Result<()> {
        let path = self.bound_path()?;
        writer::save_atomic(path, self.store.cells(), &self.config)
    }

    /// Replace `path` through a write-then-rename. The bound path does not change.
    pub fn atomic_save_as<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        writer::save_atomic(path.as_ref(), self.store.cells(), &self.config)
    }

    /// Save a snapshot of the cells on a background thread.
    ///
    /// Nothing is reported back: failures, including an unbound document, are
    /// only logged. The returned handle may be joined or dropped; dropping it
    /// detaches the worker. Returns `None` if the worker could not be started.
    /// Callers that need to know the outcome should call [`save`](Self::save).
    pub fn sync(&self) -> Option<JoinHandle<()>> {
        let path = self.path.clone();
        let cells = self.store.cells().clone();
        let config = self.config.clone();

        let spawned = thread::Builder::new()
            .name("cellcsv-sync".to_string())
            .spawn(move || {
                let result = match path.as_deref() {
                    Some(path) => writer::save_direct(path, &cells, &config),
                    None => Err(Error::UnboundDocument),
                };
                if let Err(e) = result {
                    warn!(error = %e, "background sync failed");
                }
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "could not start background sync");
                None
            },
        }
    }

    /// Save in place, then close. On a failed save the document stays open.
    pub fn finalize(&mut self) -> Result<()> {
        self.save()?;
        self.close();
        Ok(())
    }

    /// Drop every cell. The bound path and stream are kept.
    pub fn clear(&mut self) {
        self.store.clear();
    }

    /// Value of the cell at `key` ("A1", case-insensitive), or `""`.
    pub fn value(&self, key: &str) -> &str {
        match canonical_key(key) {
            Some(key) => self.store.get(&key),
            None => "",
        }
    }

    /// Value of the cell at 0-based `(row, col)`, or `""`.
    pub fn value_at(&self, row: u32, col: u32) -> &str {
        self.store.get(&cell_key(row, col))
    }

    /// Set the cell at `key`. An empty value removes the cell.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let key = canonical_key(key).ok_or_else(|| Error::InvalidKey(key.to_string()))?;
        self.store.set(&key, value);
        Ok(())
    }

    /// Keys of every cell whose value is exactly `value`.
    pub fn search(&self, value: &str) -> Vec<String> {
        self.store.search(value)
    }

    /// Change the separator used by later loads, saves and streams.
    ///
    /// Cells already loaded are not re-parsed; call [`load`](Self::load) again.
    pub fn set_separator(&mut self, separator: u8) {
        if separator == self.config.separator {
            return;
        }
        self.config.separator = separator;
        if !self.store.is_empty() {
            warn!(
                separator = %char::from(separator),
                "separator changed after loading data; reload to re-parse"
            );
        }
    }

    pub fn separator(&self) -> u8 {
        self.config.separator
    }

    /// Number of non-empty cells.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// 1-based `(rows, columns)` the next save will write.
    pub fn dimensions(&self) -> (u32, u32) {
        writer::bounds(self.store.cells())
    }

    /// Read-only access to the cell store.
    pub fn store(&self) -> &CellStore {
        &self.store
    }

    /// Read the next cell from the bound file, opening a stream on first use.
    ///
    /// Returns `None` once the file is exhausted. The stream reads the file as
    /// it is on disk and ignores the in-memory cells.
    pub fn next_cell(&mut self) -> Result<Option<String>> {
        self.stream_mut()?.next_cell()
    }

    /// Key of the cell most recently returned by [`next_cell`](Self::next_cell).
    pub fn stream_key(&self) -> Option<String> {
        self.stream.as_ref().and_then(CellStream::key)
    }

    /// Position the stream so the next [`next_cell`](Self::next_cell) returns `key`.
    pub fn seek_stream(&mut self, key: &str) -> Result<bool> {
        let (row, col) = parse_key(key).ok_or_else(|| Error::InvalidKey(key.to_string()))?;
        self.stream_mut()?.seek_to(row, col)
    }

    /// Reopen the stream at the start of the bound file.
    pub fn reset_stream(&mut self) -> Result<()> {
        self.stream = None;
        self.stream_mut().map(|_| ())
    }

    /// Close the stream, discarding unread input.
    pub fn close_stream(&mut self) {
        self.stream = None;
    }

    fn stream_mut(&mut self) -> Result<&mut CellStream<File>> {
        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => {
                let path = self.bound_path()?;
                let file = File::open(path).map_err(|e| Error::file_open(path, e))?;
                trace!(path = %path.display(), "opened cell stream");
                CellStream::with_config(file, &self.config)
            },
        };
        Ok(self.stream.insert(stream))
    }
}
