use std::sync::Arc;

use crate::Environment;
use crate::config::Config;
use crate::io;
use crate::task::Task;

/// Copies everything under the public directory to dist verbatim. A missing
/// public directory is fine; there is simply nothing to pass through.
pub struct PublicTask {
    config: Arc<Config>,
}

impl PublicTask {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

impl Task for PublicTask {
    fn name(&self) -> &'static str {
        "public"
    }

    fn run(&self, _: &Environment) -> anyhow::Result<()> {
        let public = self.config.public_dir();
        if !public.is_dir() {
            return Ok(());
        }

        io::copy_rec(public, self.config.dist_dir())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::Utf8Path;

    use super::*;
    use crate::Mode;

    #[test]
    fn copies_the_tree_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        fs::create_dir_all(root.join("public/icons")).unwrap();
        fs::write(root.join("public/favicon.ico"), "i").unwrap();
        fs::write(root.join("public/icons/a.svg"), "<svg/>").unwrap();

        let config = Arc::new(Config::defaults(root));
        let env = Environment {
            mode: Mode::Build,
            port: None,
        };
        PublicTask::new(config.clone()).run(&env).unwrap();

        assert!(config.dist_dir().join("favicon.ico").is_file());
        assert!(config.dist_dir().join("icons/a.svg").is_file());
    }

    #[test]
    fn missing_public_directory_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();

        let config = Arc::new(Config::defaults(root));
        let env = Environment {
            mode: Mode::Build,
            port: None,
        };

        PublicTask::new(config).run(&env).unwrap();
    }
}
