#![forbid(unsafe_code)]

//! `pagesmith` is a build pipeline for conventional static web projects. It
//! compiles styles, scripts and page templates out of a `src` tree, optimizes
//! images, copies fonts and public files, and bundles and minifies everything
//! into `dist`. During development it watches the source tree and reloads
//! connected browsers over a websocket.
//!
//! The work is declared as a directed graph of tasks with two composition
//! primitives, [`series`] and [`parallel`], and executed by a topological
//! scheduler on a thread pool. Two named pipelines are exported:
//!
//! * `build` — clean, then compile + bundle concurrently with the image,
//!   font and passthrough tasks;
//! * `develop` — compile, then serve with file watching and live reload.

mod config;
mod error;
mod graph;
mod io;
pub mod pipeline;
mod serve;
pub mod task;

use std::sync::Arc;

use console::style;

pub use crate::config::{AssetPatterns, BuildConfig, CONFIG_FILE, Config};
pub use crate::error::{PagesmithError, PipelineError, WatchError};
pub use crate::graph::{Pipeline, Step, leaf, parallel, series};
pub use crate::task::Task;

/// This value controls whether the pipeline runs in the `Build` or the
/// `Watch` mode. In `Build` mode every task runs exactly once and the process
/// stops. In `Watch` mode the compiled pages embed a live-reload script, the
/// source tree is watched for changes, and a local server keeps serving the
/// intermediate output until the process is killed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Build,
    Watch,
}

/// Read-only context passed to every task at runtime.
#[derive(Debug, Clone, Copy)]
pub struct Environment {
    /// Current run mode.
    pub mode: Mode,
    /// Port of the live-reload websocket, when one is open.
    pub port: Option<u16>,
}

impl Environment {
    /// Get the JS snippet which enables live reloading.
    pub fn refresh_script(&self) -> Option<String> {
        self.port.map(|port| {
            format!(
                r#"
const socket = new WebSocket("ws://localhost:{port}");
socket.addEventListener("message", event => {{
    window.location.reload();
}});
"#
            )
        })
    }
}

/// Run the `build` pipeline for production output.
pub fn build(config: Arc<Config>) -> Result<(), PagesmithError> {
    eprintln!(
        "Running {} in {} mode.",
        style("pagesmith").red(),
        style("build").blue()
    );

    let env = Environment {
        mode: Mode::Build,
        port: None,
    };

    pipeline::build(config).run(&env)?;

    Ok(())
}

/// Run the `develop` pipeline: compile, then watch and serve. This only
/// returns on error; cancellation is process termination.
pub fn develop(config: Arc<Config>) -> Result<(), PagesmithError> {
    eprintln!(
        "Running {} in {} mode.",
        style("pagesmith").red(),
        style("develop").blue()
    );

    let (listener, port) = serve::reserve_port().map_err(WatchError::Io)?;

    let env = Environment {
        mode: Mode::Watch,
        port: Some(port),
    };

    pipeline::develop(config, listener).run(&env)?;

    Ok(())
}

/// Delete the temp and dist directories.
pub fn clean(config: Arc<Config>) -> Result<(), PagesmithError> {
    let env = Environment {
        mode: Mode::Build,
        port: None,
    };

    pipeline::clean(config).run(&env)?;

    Ok(())
}
