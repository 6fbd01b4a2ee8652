use std::process::{Command, Stdio};
use std::sync::Arc;

use camino::Utf8Path;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use thiserror::Error;

use crate::Environment;
use crate::config::Config;
use crate::io;
use crate::task::{SelectError, Task, rel_to, select};

/// Errors that can occur when compiling scripts.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Esbuild execution failed: {0}")]
    Esbuild(String),

    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error(transparent)]
    Select(#[from] SelectError),
}

/// Transpiles scripts to widely supported JavaScript under the temp
/// directory.
///
/// **Note:** this task requires the `esbuild` binary on the system PATH;
/// when no script matches the configured pattern, it does nothing.
pub struct ScriptTask {
    config: Arc<Config>,
}

impl ScriptTask {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    fn compile(&self) -> Result<(), ScriptError> {
        let src = self.config.src_dir();
        let temp = self.config.temp_dir();
        let files = select(&self.config.source_glob(&self.config.build.paths.scripts))?;

        files
            .into_par_iter()
            .try_for_each(|path| -> Result<(), ScriptError> {
                let data = compile_esbuild(&path)?;
                let out = temp.join(rel_to(&path, &src));

                io::write_file(&out, data)?;
                tracing::debug!("compiled {path} -> {out}");

                Ok(())
            })
    }
}

impl Task for ScriptTask {
    fn name(&self) -> &'static str {
        "scripts"
    }

    fn run(&self, _: &Environment) -> anyhow::Result<()> {
        Ok(self.compile()?)
    }
}

fn compile_esbuild(file: &Utf8Path) -> Result<Vec<u8>, ScriptError> {
    let output = Command::new("esbuild")
        .arg(file.as_str())
        .arg("--target=es2015")
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .output()?;

    if !output.status.success() {
        return Err(ScriptError::Esbuild(String::from_utf8(output.stdout)?));
    }

    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::Utf8Path;

    use super::*;

    #[test]
    fn empty_selection_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        fs::create_dir_all(root.join("src")).unwrap();

        let config = Arc::new(Config::defaults(root));
        ScriptTask::new(config.clone()).compile().unwrap();

        assert!(!config.temp_dir().exists());
    }
}
