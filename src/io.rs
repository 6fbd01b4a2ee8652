use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::time::Instant;

use camino::Utf8Path;
use console::Style;

const ANSI_BLUE: Style = Style::new().blue();

pub(crate) fn as_overhead(s: Instant) -> impl Display {
    let e = Instant::now();
    let f = format!("(+{}ms)", e.duration_since(s).as_millis());
    ANSI_BLUE.apply_to(f)
}

/// Write `data` to `path`, creating any missing parent directories.
pub(crate) fn write_file(path: &Utf8Path, data: impl AsRef<[u8]>) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    fs::write(path, data)
}

/// Copy a single file to `path`, creating any missing parent directories.
pub(crate) fn copy_file(from: &Utf8Path, to: &Utf8Path) -> std::io::Result<()> {
    if let Some(dir) = to.parent() {
        fs::create_dir_all(dir)?;
    }

    fs::copy(from, to)?;
    Ok(())
}

/// Recursively copy a directory tree.
pub(crate) fn copy_rec(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> std::io::Result<()> {
    fs::create_dir_all(&dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let filetype = entry.file_type()?;
        if filetype.is_dir() {
            copy_rec(entry.path(), dst.as_ref().join(entry.file_name()))?;
        } else {
            fs::copy(entry.path(), dst.as_ref().join(entry.file_name()))?;
        }
    }
    Ok(())
}

/// Delete a directory tree if it exists.
pub(crate) fn remove_dir(path: &Utf8Path) -> std::io::Result<()> {
    if fs::metadata(path).is_ok() {
        fs::remove_dir_all(path)?;
    }

    Ok(())
}
