//! Serialization of a sparse cell map back to delimited text.
//!
//! Output is always rectangular: every row is padded to the widest column
//! present anywhere in the map, and every row, including the last, ends with
//! `\n`. Keys are expected in canonical form ("B3"); malformed keys are
//! skipped, and when differently-cased spellings of one cell collide, the
//! canonical one wins. Both cases are logged. Two commit strategies are
//! provided:
//!
//! - [`save_direct`] truncates and rewrites the destination in place.
//! - [`save_atomic`] writes a side file next to the destination and renames it
//!   over the destination, so readers see either the old or the new content.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use memchr::{memchr, memchr3};
use tracing::{debug, warn};

use super::config::TextConfig;
use crate::common::{Error, Result};
use crate::sheet::coordinate::parse_key;

/// 1-based `(rows, columns)` of the rectangle covering every key in `cells`.
///
/// An empty map still covers one empty cell. Keys that are not valid cell
/// coordinates are ignored.
pub fn bounds(cells: &HashMap<String, String>) -> (u32, u32) {
    let mut max_row = 1u32;
    let mut max_col = 1u32;

    for (row, col) in cells.keys().filter_map(|key| parse_key(key)) {
        max_row = max_row.max(row.saturating_add(1));
        max_col = max_col.max(col.saturating_add(1));
    }

    (max_row, max_col)
}

/// Whether a field must be wrapped in quotes.
#[inline]
fn needs_quoting(field: &[u8], separator: u8) -> bool {
    memchr3(separator, b'"', b'\n', field).is_some() || memchr(b'\r', field).is_some()
}

fn write_field<W: Write>(writer: &mut W, field: &str, separator: u8) -> std::io::Result<usize> {
    let bytes = field.as_bytes();
    if !needs_quoting(bytes, separator) {
        writer.write_all(bytes)?;
        return Ok(bytes.len());
    }

    let mut written = 2;
    writer.write_all(b"\"")?;
    for (i, part) in bytes.split(|&b| b == b'"').enumerate() {
        if i > 0 {
            writer.write_all(b"\"\"")?;
            written += 2;
        }
        writer.write_all(part)?;
        written += part.len();
    }
    writer.write_all(b"\"")?;
    Ok(written)
}

/// Write `cells` as delimited text, returning the number of bytes written.
pub fn write_cells<W: Write>(
    cells: &HashMap<String, String>,
    writer: &mut W,
    separator: u8,
) -> Result<u64> {
    let (rows, cols) = bounds(cells);

    let mut placed: Vec<(u32, u32, &str, &str)> = Vec::with_capacity(cells.len());
    for (key, value) in cells {
        match parse_key(key) {
            Some((row, col)) => placed.push((row, col, key.as_str(), value.as_str())),
            None => warn!(key = %key, "skipping malformed cell key"),
        }
    }
    // Upper case sorts first, so the canonical spelling leads each position
    placed.sort_unstable_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));
    let mut placed = placed.into_iter().peekable();

    let mut written = 0u64;
    for row in 0..rows {
        for col in 0..cols {
            if col > 0 {
                writer.write_all(&[separator])?;
                written += 1;
            }
            if let Some((_, _, _, value)) = placed.next_if(|&(r, c, _, _)| r == row && c == col) {
                written += write_field(writer, value, separator)? as u64;
                while let Some((_, _, key, _)) = placed.next_if(|&(r, c, _, _)| r == row && c == col) {
                    warn!(key = %key, "dropping duplicate spelling of cell key");
                }
            }
        }
        writer.write_all(b"\n")?;
        written += 1;
    }

    Ok(written)
}

/// Truncate `path` and write `cells` into it.
///
/// A failure part-way leaves a partially written file behind.
pub fn save_direct(path: &Path, cells: &HashMap<String, String>, config: &TextConfig) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| Error::file_open(path, e))?;

    let mut writer = BufWriter::new(file);
    let written = write_cells(cells, &mut writer, config.separator)?;
    writer.flush()?;
    if config.sync_all {
        writer.get_ref().sync_all()?;
    }

    debug!(path = %path.display(), bytes = written, "saved cells");
    Ok(())
}

/// Write `cells` to a side file and atomically rename it over `path`.
pub fn save_atomic(path: &Path, cells: &HashMap<String, String>, config: &TextConfig) -> Result<()> {
    commit_atomic(path, config.sync_all, |writer| {
        let written = write_cells(cells, writer, config.separator)?;
        debug!(path = %path.display(), bytes = written, "staged cells for atomic save");
        Ok(())
    })
}

/// Stage whatever `write` produces in a side file, then rename it over `path`.
///
/// The side file lives in the destination's directory so the rename never
/// crosses filesystems. If `write` fails, or the process dies before the
/// rename, the destination keeps its previous content.
pub fn commit_atomic<F>(path: &Path, sync_all: bool, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let prefix = match path.file_name() {
        Some(name) => format!(".{}.", name.to_string_lossy()),
        None => ".cellcsv.".to_string(),
    };

    // The side file replaces the destination, so it must carry the same mode
    let existing = fs::metadata(path).ok().map(|meta| meta.permissions());

    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix).suffix(".tmp");
    if existing.is_none() {
        use_creation_permissions(&mut builder);
    }
    let mut staged = builder
        .tempfile_in(dir)
        .map_err(|e| Error::file_open(path, e))?;

    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    if let Some(permissions) = existing {
        staged.as_file().set_permissions(permissions)?;
    }
    if sync_all {
        staged.as_file().sync_all()?;
    }

    staged.persist(path).map_err(|e| Error::AtomicCommit {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    debug!(path = %path.display(), "atomic save committed");
    Ok(())
}

/// Give a new destination the mode a plain create would: 0666 minus umask.
#[cfg(unix)]
fn use_creation_permissions(builder: &mut tempfile::Builder<'_, '_>) {
    use std::os::unix::fs::PermissionsExt;
    builder.permissions(fs::Permissions::from_mode(0o666));
}

#[cfg(not(unix))]
fn use_creation_permissions(_builder: &mut tempfile::Builder<'_, '_>) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn cells(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn render(map: &HashMap<String, String>, separator: u8) -> String {
        let mut out = Vec::new();
        let written = write_cells(map, &mut out, separator).unwrap();
        assert_eq!(written as usize, out.len());
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_bounds() {
        assert_eq!(bounds(&HashMap::new()), (1, 1));
        assert_eq!(bounds(&cells(&[("C2", "x"), ("A5", "y")])), (5, 3));
        assert_eq!(bounds(&cells(&[("bogus", "x")])), (1, 1));
    }

    #[test]
    fn test_empty_map_writes_one_empty_cell() {
        assert_eq!(render(&HashMap::new(), b','), "\n");
    }

    #[test]
    fn test_rectangular_padding() {
        let map = cells(&[("A1", "a"), ("C1", "c"), ("B3", "b")]);
        assert_eq!(render(&map, b','), "a,,c\n,,\n,b,\n");
    }

    #[test]
    fn test_quoting() {
        let map = cells(&[
            ("A1", "x,y"),
            ("B1", "say \"hi\""),
            ("C1", "two\nlines"),
            ("D1", "cr\r"),
            ("E1", "plain"),
        ]);
        assert_eq!(
            render(&map, b','),
            "\"x,y\",\"say \"\"hi\"\"\",\"two\nlines\",\"cr\r\",plain\n"
        );
    }

    #[test]
    fn test_malformed_and_duplicate_keys() {
        let map = cells(&[("b1", "lower"), ("B1", "upper"), ("bogus", "x"), ("A2", "a")]);
        assert_eq!(render(&map, b','), ",upper\na,\n");

        // A lone lower-case key is still placed
        let map = cells(&[("c1", "only")]);
        assert_eq!(render(&map, b','), ",,only\n");
    }

    #[test]
    fn test_quoting_follows_separator() {
        let map = cells(&[("A1", "x,y"), ("B1", "p;q")]);
        assert_eq!(render(&map, b';'), "x,y;\"p;q\"\n");
    }

    #[test]
    fn test_save_direct() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("direct.csv");
        fs::write(&path, "old content that is longer than the new one\n").unwrap();

        save_direct(&path, &cells(&[("A1", "new")]), &TextConfig::default()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
    }

    #[test]
    fn test_save_direct_unwritable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("out.csv");
        let err = save_direct(&path, &HashMap::new(), &TextConfig::default()).unwrap_err();
        assert!(matches!(err, Error::FileOpen { .. }));
    }

    #[test]
    fn test_save_atomic_replaces() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("atomic.csv");
        fs::write(&path, "before\n").unwrap();

        save_atomic(&path, &cells(&[("B1", "after")]), &TextConfig::default()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), ",after\n");

        // No side files left behind
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_atomic_keeps_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("shared.csv");
        fs::write(&path, "a\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        save_atomic(&path, &cells(&[("A1", "b")]), &TextConfig::default()).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);

        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();
        save_atomic(&path, &cells(&[("A1", "c")]), &TextConfig::default()).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
        assert_eq!(fs::read_to_string(&path).unwrap(), "c\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_save_atomic_new_file_matches_direct_save() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let direct = dir.path().join("direct.csv");
        let atomic = dir.path().join("atomic.csv");

        save_direct(&direct, &cells(&[("A1", "x")]), &TextConfig::default()).unwrap();
        save_atomic(&atomic, &cells(&[("A1", "x")]), &TextConfig::default()).unwrap();

        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&atomic), mode(&direct));
    }

    #[test]
    fn test_abort_before_commit_keeps_destination() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keep.csv");
        fs::write(&path, "original,content\r\n").unwrap();

        let result = commit_atomic(&path, true, |writer| {
            writer.write_all(b"half written")?;
            Err(Error::Io(std::io::Error::other("simulated crash")))
        });

        assert!(result.is_err());
        assert_eq!(fs::read(&path).unwrap(), b"original,content\r\n");
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_commit_onto_directory_fails() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("occupied");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("inner"), "x").unwrap();

        let err = save_atomic(&target, &HashMap::new(), &TextConfig::default()).unwrap_err();
        assert!(matches!(err, Error::AtomicCommit { .. }), "{err:?}");
        assert!(target.is_dir());
    }

    #[test]
    fn test_atomic_into_missing_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope").join("out.csv");
        let err = save_atomic(&path, &HashMap::new(), &TextConfig::default()).unwrap_err();
        assert!(matches!(err, Error::FileOpen { .. }));
    }
}
