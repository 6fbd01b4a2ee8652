//! Per-asset-class build tasks.
//!
//! Every compile task follows the same shape: select files under the source
//! root with the class's glob pattern, push them through an external
//! transformation, and write the results to the temp directory (styles,
//! scripts, pages) or straight to dist (images, fonts, public files).

pub mod bundle;
pub mod clean;
pub mod fonts;
pub mod images;
pub mod pages;
pub mod public;
pub mod scripts;
pub mod styles;

pub use bundle::BundleTask;
pub use clean::CleanTask;
pub use fonts::FontTask;
pub use images::ImageTask;
pub use pages::PageTask;
pub use public::PublicTask;
pub use scripts::ScriptTask;
pub use styles::StyleTask;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::Environment;

/// A named unit of work: file selection, transformation, output writing.
/// Errors propagate to the pipeline runner, which aborts the enclosing
/// pipeline.
pub trait Task: Send + Sync {
    fn name(&self) -> &'static str;
    fn run(&self, env: &Environment) -> anyhow::Result<()>;
}

/// Errors that can occur while selecting source files.
#[derive(Debug, Error)]
pub enum SelectError {
    #[error("Couldn't compile glob pattern.\n{0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),
}

/// Collect the files matching a glob pattern. Directories picked up by `**`
/// patterns are skipped.
pub(crate) fn select(pattern: &str) -> Result<Vec<Utf8PathBuf>, SelectError> {
    let mut paths = Vec::new();

    for entry in glob::glob(pattern)? {
        let path = Utf8PathBuf::try_from(entry?)?;
        if path.is_file() {
            paths.push(path);
        }
    }

    Ok(paths)
}

/// Path of `path` relative to `base`, used to mirror the source layout in
/// the output directories.
pub(crate) fn rel_to<'a>(path: &'a Utf8Path, base: &Utf8Path) -> &'a Utf8Path {
    path.strip_prefix(base).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn select_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("a/b/c.txt"), "x").unwrap();

        let found = select(&format!("{root}/**")).unwrap();

        assert_eq!(found, vec![root.join("a/b/c.txt")]);
    }

    #[test]
    fn rel_to_strips_the_base() {
        assert_eq!(
            rel_to(Utf8Path::new("/proj/src/a.scss"), Utf8Path::new("/proj/src")),
            Utf8Path::new("a.scss")
        );
    }
}
