use std::fs;
use std::sync::Arc;

use thiserror::Error;

use crate::Environment;
use crate::config::Config;
use crate::io;
use crate::task::{SelectError, Task, rel_to, select};

/// Errors that can occur when rendering page templates.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error(transparent)]
    Select(#[from] SelectError),
}

/// Renders the HTML page templates with the configured template data and
/// writes the results to the temp directory. In watch mode every rendered
/// page additionally embeds the live-reload client script.
pub struct PageTask {
    config: Arc<Config>,
}

impl PageTask {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    fn render(&self, env: &Environment) -> Result<(), PageError> {
        let src = self.config.src_dir();
        let temp = self.config.temp_dir();
        let files = select(&self.config.source_glob(&self.config.build.paths.pages))?;

        let engine = minijinja::Environment::new();
        let data = minijinja::Value::from_serialize(&self.config.data);

        for path in files {
            let text = fs::read_to_string(&path)?;
            let mut html = engine.render_str(&text, &data)?;

            if let Some(script) = env.refresh_script() {
                html.push_str("<script>");
                html.push_str(&script);
                html.push_str("</script>\n");
            }

            let out = temp.join(rel_to(&path, &src));
            io::write_file(&out, html)?;
            tracing::debug!("rendered {path} -> {out}");
        }

        Ok(())
    }
}

impl Task for PageTask {
    fn name(&self) -> &'static str {
        "pages"
    }

    fn run(&self, env: &Environment) -> anyhow::Result<()> {
        Ok(self.render(env)?)
    }
}
