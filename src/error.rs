use std::sync::mpsc::SendError;

use thiserror::Error;

/// Top-level error for a pagesmith run.
#[derive(Debug, Error)]
pub enum PagesmithError {
    #[error("Error while running the pipeline:\n{0}")]
    Pipeline(#[from] PipelineError),

    #[error("Error while watching for file changes:\n{0}")]
    Watch(#[from] WatchError),
}

/// Error raised while executing a task graph.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Cycle detected in the task graph")]
    Cycle,

    #[error("Task '{0}':\n{1}")]
    Task(&'static str, anyhow::Error),
}

/// Error raised by the dev-server task.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Notify(#[from] notify::Error),

    #[error("Couldn't compile glob pattern.\n{0}")]
    Pattern(#[from] glob::PatternError),

    #[error(transparent)]
    Send(#[from] SendError<()>),

    #[error("The serve task was started twice")]
    AlreadyServing,
}
