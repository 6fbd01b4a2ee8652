use std::sync::Arc;

use thiserror::Error;

use crate::Environment;
use crate::config::Config;
use crate::io;
use crate::task::{SelectError, Task, rel_to, select};

#[derive(Debug, Error)]
pub enum FontError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Select(#[from] SelectError),
}

/// Copies font files to the dist directory, preserving their layout.
pub struct FontTask {
    config: Arc<Config>,
}

impl FontTask {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    fn copy(&self) -> Result<(), FontError> {
        let src = self.config.src_dir();
        let dist = self.config.dist_dir();
        let files = select(&self.config.source_glob(&self.config.build.paths.fonts))?;

        for path in files {
            let out = dist.join(rel_to(&path, &src));
            io::copy_file(&path, &out)?;
        }

        Ok(())
    }
}

impl Task for FontTask {
    fn name(&self) -> &'static str {
        "fonts"
    }

    fn run(&self, _: &Environment) -> anyhow::Result<()> {
        Ok(self.copy()?)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::Utf8Path;

    use super::*;

    #[test]
    fn copies_fonts_preserving_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let fonts = root.join("src/assets/fonts");
        fs::create_dir_all(&fonts).unwrap();
        fs::write(fonts.join("pages.woff2"), [0u8, 1, 2]).unwrap();

        let config = Arc::new(Config::defaults(root));
        FontTask::new(config.clone()).copy().unwrap();

        let out = config.dist_dir().join("assets/fonts/pages.woff2");
        assert_eq!(fs::read(out).unwrap(), vec![0u8, 1, 2]);
    }
}
