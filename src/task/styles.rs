use std::sync::Arc;

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use thiserror::Error;

use crate::Environment;
use crate::config::Config;
use crate::io;
use crate::task::{SelectError, Task, rel_to, select};

/// Errors that can occur when compiling stylesheets.
#[derive(Debug, Error)]
pub enum StyleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sass compilation error: {0}")]
    Sass(#[from] Box<grass::Error>),

    #[error(transparent)]
    Select(#[from] SelectError),
}

/// Compiles Sass/SCSS sources into expanded CSS under the temp directory.
/// Partials (files starting with `_`) are imported by other sheets and never
/// compiled on their own.
pub struct StyleTask {
    config: Arc<Config>,
}

impl StyleTask {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    fn compile(&self) -> Result<(), StyleError> {
        let src = self.config.src_dir();
        let temp = self.config.temp_dir();
        let files = select(&self.config.source_glob(&self.config.build.paths.styles))?;

        files
            .into_par_iter()
            .filter(|path| {
                !path
                    .file_name()
                    .is_some_and(|name| name.starts_with('_'))
            })
            .try_for_each(|path| -> Result<(), StyleError> {
                let css = grass::from_path(&path, &grass::Options::default())?;
                let out = temp.join(rel_to(&path, &src)).with_extension("css");

                io::write_file(&out, css)?;
                tracing::debug!("compiled {path} -> {out}");

                Ok(())
            })
    }
}

impl Task for StyleTask {
    fn name(&self) -> &'static str {
        "styles"
    }

    fn run(&self, _: &Environment) -> anyhow::Result<()> {
        Ok(self.compile()?)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::Utf8Path;

    use super::*;

    #[test]
    fn compiles_sheets_and_skips_partials() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let styles = root.join("src/assets/styles");
        fs::create_dir_all(&styles).unwrap();
        fs::write(styles.join("main.scss"), "$c: #abc;\nbody { color: $c; }\n").unwrap();
        fs::write(styles.join("_mixins.scss"), "@mixin hide { display: none; }\n").unwrap();

        let config = Arc::new(Config::defaults(root));
        StyleTask::new(config.clone()).compile().unwrap();

        let out = config.temp_dir().join("assets/styles/main.css");
        let css = fs::read_to_string(out).unwrap();
        assert!(css.contains("color: #abc"));

        assert!(!config.temp_dir().join("assets/styles/_mixins.css").exists());
    }

    #[test]
    fn invalid_sass_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let styles = root.join("src/assets/styles");
        fs::create_dir_all(&styles).unwrap();
        fs::write(styles.join("bad.scss"), "body { color: ; }\n").unwrap();

        let config = Arc::new(Config::defaults(root));
        let err = StyleTask::new(config).compile().unwrap_err();

        assert!(matches!(err, StyleError::Sass(_)));
    }
}
