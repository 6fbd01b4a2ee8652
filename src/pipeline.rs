//! The exported pipelines.
//!
//! `build` produces the production output: clean everything, then run the
//! compile tasks concurrently, bundle their output, and in parallel with all
//! of that optimize images, copy fonts and pass the public files through.
//! `develop` compiles once and hands off to the dev server.

use std::net::TcpListener;
use std::sync::Arc;

use crate::config::Config;
use crate::graph::{Pipeline, Step, leaf, parallel, series};
use crate::serve::ServeTask;
use crate::task::{
    BundleTask, CleanTask, FontTask, ImageTask, PageTask, PublicTask, ScriptTask, StyleTask,
};

/// Full production build.
pub fn build(config: Arc<Config>) -> Pipeline {
    let compile = parallel([
        leaf(StyleTask::new(config.clone())),
        leaf(ScriptTask::new(config.clone())),
        leaf(PageTask::new(config.clone())),
    ]);

    Pipeline::new(
        "build",
        series([
            leaf(CleanTask::new(config.clone())),
            parallel([
                series([compile, leaf(BundleTask::new(config.clone()))]),
                leaf(ImageTask::new(config.clone())),
                leaf(FontTask::new(config.clone())),
                leaf(PublicTask::new(config)),
            ]),
        ]),
    )
}

/// Compile, then watch and serve. The serve task shares the compile tasks
/// so it can rerun exactly the one affected by a file change.
pub fn develop(config: Arc<Config>, listener: TcpListener) -> Pipeline {
    let styles = Arc::new(StyleTask::new(config.clone()));
    let scripts = Arc::new(ScriptTask::new(config.clone()));
    let pages = Arc::new(PageTask::new(config.clone()));

    let serve = ServeTask::new(
        config,
        listener,
        styles.clone(),
        scripts.clone(),
        pages.clone(),
    );

    Pipeline::new(
        "develop",
        series([
            parallel([
                Step::Leaf(styles),
                Step::Leaf(scripts),
                Step::Leaf(pages),
            ]),
            leaf(serve),
        ]),
    )
}

/// Delete the temp and dist directories.
pub fn clean(config: Arc<Config>) -> Pipeline {
    Pipeline::new("clean", leaf(CleanTask::new(config)))
}
