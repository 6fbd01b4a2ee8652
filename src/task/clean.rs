use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::Environment;
use crate::config::Config;
use crate::io;
use crate::task::Task;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct CleanError(#[from] std::io::Error);

/// Deletes the temp and dist directories before a fresh build. Deletion
/// failures propagate and abort the pipeline.
pub struct CleanTask {
    config: Arc<Config>,
}

impl CleanTask {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    fn clean(&self) -> Result<(), CleanError> {
        let s = Instant::now();

        io::remove_dir(&self.config.dist_dir())?;
        io::remove_dir(&self.config.temp_dir())?;

        tracing::info!("cleaned the output directories {}", io::as_overhead(s));

        Ok(())
    }
}

impl Task for CleanTask {
    fn name(&self) -> &'static str {
        "clean"
    }

    fn run(&self, _: &Environment) -> anyhow::Result<()> {
        Ok(self.clean()?)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::Utf8Path;

    use super::*;

    #[test]
    fn removes_both_output_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        fs::create_dir_all(root.join("dist/deep")).unwrap();
        fs::create_dir_all(root.join("temp")).unwrap();
        fs::write(root.join("dist/deep/a.html"), "x").unwrap();

        let config = Arc::new(Config::defaults(root));
        CleanTask::new(config.clone()).clean().unwrap();

        assert!(!config.dist_dir().exists());
        assert!(!config.temp_dir().exists());
    }

    #[test]
    fn absent_directories_are_fine() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();

        let config = Arc::new(Config::defaults(root));
        CleanTask::new(config).clean().unwrap();
    }
}
