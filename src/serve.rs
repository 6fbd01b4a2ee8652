//! The development server.
//!
//! Serves the intermediate output over HTTP, watches the source tree, reruns
//! the compile task matching each change, and tells connected browsers to
//! reload over a websocket. The websocket port is reserved before the
//! pipeline runs so the compiled pages can embed it in their reload script.

use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use notify::{EventKind, RecursiveMode};
use notify_debouncer_full::new_debouncer;
use tungstenite::WebSocket;

use crate::Environment;
use crate::config::Config;
use crate::error::WatchError;
use crate::io::as_overhead;
use crate::task::{PageTask, ScriptTask, StyleTask, Task};

/// Port the HTTP server listens on.
const HTTP_PORT: u16 = 2080;

/// Reserve a port for the live-reload websocket before any page is compiled.
pub(crate) fn reserve_port() -> std::io::Result<(TcpListener, u16)> {
    let listener = match TcpListener::bind("127.0.0.1:1337") {
        Ok(sock) => sock,
        Err(_) => TcpListener::bind("127.0.0.1:0")?,
    };

    let port = listener.local_addr()?.port();
    Ok((listener, port))
}

/// Asset class a changed file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Changed {
    Styles,
    Scripts,
    Pages,
    /// Anything else; triggers a reload without recompiling.
    Static,
}

struct Matchers {
    styles: glob::Pattern,
    scripts: glob::Pattern,
    pages: glob::Pattern,
}

impl Matchers {
    fn new(config: &Config) -> Result<Self, WatchError> {
        let paths = &config.build.paths;

        Ok(Self {
            styles: glob::Pattern::new(&paths.styles)?,
            scripts: glob::Pattern::new(&paths.scripts)?,
            pages: glob::Pattern::new(&paths.pages)?,
        })
    }
}

/// Terminal task of the `develop` pipeline. Holds the compile tasks it
/// shares with the pipeline so a file change reruns exactly the affected
/// one. Never returns once started; cancellation is process termination.
pub struct ServeTask {
    config: Arc<Config>,
    listener: Mutex<Option<TcpListener>>,
    styles: Arc<StyleTask>,
    scripts: Arc<ScriptTask>,
    pages: Arc<PageTask>,
}

impl ServeTask {
    pub fn new(
        config: Arc<Config>,
        listener: TcpListener,
        styles: Arc<StyleTask>,
        scripts: Arc<ScriptTask>,
        pages: Arc<PageTask>,
    ) -> Self {
        Self {
            config,
            listener: Mutex::new(Some(listener)),
            styles,
            scripts,
            pages,
        }
    }

    fn serve(&self, env: &Environment) -> Result<(), WatchError> {
        let listener = self
            .listener
            .lock()
            .unwrap()
            .take()
            .ok_or(WatchError::AlreadyServing)?;

        let src = self.config.src_dir().canonicalize_utf8()?;
        let public = self.config.public_dir().canonicalize_utf8().ok();
        let matchers = Matchers::new(&self.config)?;

        let (tx, rx) = std::sync::mpsc::channel();
        let mut debouncer = new_debouncer(Duration::from_millis(250), None, tx)?;

        debouncer.watch(src.as_std_path(), RecursiveMode::Recursive)?;
        if let Some(public) = &public {
            debouncer.watch(public.as_std_path(), RecursiveMode::Recursive)?;
        }

        let clients = Arc::new(Mutex::new(vec![]));
        let _thread_i = new_thread_ws_incoming(listener, clients.clone());
        let (tx_reload, _thread_o) = new_thread_ws_reload(clients.clone());
        let _thread_http = new_thread_http(self.config.clone());

        while let Ok(result) = rx.recv() {
            let events = match result {
                Ok(events) => events,
                Err(errors) => {
                    for e in errors {
                        tracing::error!("watch error: {e}");
                    }
                    continue;
                }
            };

            let changed: Vec<Changed> = events
                .iter()
                .filter(|de| {
                    matches!(
                        de.event.kind,
                        EventKind::Create(..) | EventKind::Modify(..) | EventKind::Remove(..)
                    )
                })
                .flat_map(|de| &de.event.paths)
                .filter_map(|path| {
                    let path = Utf8PathBuf::try_from(path.clone()).ok()?;
                    classify(&path, &src, public.as_deref(), &matchers)
                })
                .collect();

            if changed.is_empty() {
                continue;
            }

            let start = Instant::now();
            let mut ok = true;

            if changed.contains(&Changed::Styles) {
                ok &= rerun(self.styles.as_ref(), env);
            }
            if changed.contains(&Changed::Scripts) {
                ok &= rerun(self.scripts.as_ref(), env);
            }
            if changed.contains(&Changed::Pages) {
                ok &= rerun(self.pages.as_ref(), env);
            }

            if ok {
                tx_reload.send(())?;
                tracing::info!("refreshed {}", as_overhead(start));
            }
        }

        Ok(())
    }
}

impl Task for ServeTask {
    fn name(&self) -> &'static str {
        "serve"
    }

    fn run(&self, env: &Environment) -> anyhow::Result<()> {
        Ok(self.serve(env)?)
    }
}

/// Which class a changed path falls into, if it is ours at all. Files
/// under the source tree which match no compile pattern still count as
/// static, same as everything under the public directory.
fn classify(
    path: &Utf8Path,
    src: &Utf8Path,
    public: Option<&Utf8Path>,
    matchers: &Matchers,
) -> Option<Changed> {
    if let Ok(rel) = path.strip_prefix(src) {
        if matchers.styles.matches(rel.as_str()) {
            return Some(Changed::Styles);
        }
        if matchers.scripts.matches(rel.as_str()) {
            return Some(Changed::Scripts);
        }
        if matchers.pages.matches(rel.as_str()) {
            return Some(Changed::Pages);
        }
        return Some(Changed::Static);
    }

    if public.is_some_and(|public| path.starts_with(public)) {
        return Some(Changed::Static);
    }

    None
}

fn rerun(task: &dyn Task, env: &Environment) -> bool {
    match task.run(env) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("error while recompiling {}: {e}", task.name());
            false
        }
    }
}

fn new_thread_ws_incoming(
    server: TcpListener,
    clients: Arc<Mutex<Vec<WebSocket<TcpStream>>>>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for stream in server.incoming().flatten() {
            match tungstenite::accept(stream) {
                Ok(socket) => clients.lock().unwrap().push(socket),
                Err(e) => tracing::error!("websocket handshake failed: {e}"),
            }
        }
    })
}

fn new_thread_ws_reload(
    clients: Arc<Mutex<Vec<WebSocket<TcpStream>>>>,
) -> (Sender<()>, JoinHandle<()>) {
    let (tx, rx) = std::sync::mpsc::channel();

    let thread = std::thread::spawn(move || {
        while rx.recv().is_ok() {
            let mut clients = clients.lock().unwrap();
            let mut broken = vec![];

            for (i, socket) in clients.iter_mut().enumerate() {
                match socket.send("reload".into()) {
                    Ok(_) => {}
                    Err(tungstenite::error::Error::Io(e)) => {
                        if e.kind() == std::io::ErrorKind::BrokenPipe {
                            broken.push(i);
                        }
                    }
                    Err(e) => {
                        tracing::error!("websocket send failed: {e:?}");
                    }
                }
            }

            for i in broken.into_iter().rev() {
                clients.remove(i);
            }

            // Close all but the last 10 connections
            let len = clients.len();
            if len > 10 {
                for mut socket in clients.drain(0..len - 10) {
                    socket.close(None).ok();
                }
            }
        }
    });

    (tx, thread)
}

fn new_thread_http(config: Arc<Config>) -> JoinHandle<Result<(), anyhow::Error>> {
    let url = console::style(format!("http://localhost:{HTTP_PORT}/")).yellow();
    eprintln!("Starting a HTTP server on {url}");

    std::thread::spawn(move || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
            .block_on(http(config))
    })
}

/// Lookup order mirrors the compile tasks: intermediate output first, then
/// raw sources, then public files. `node_modules` stays addressable so
/// vendor references work before bundling.
async fn http(config: Arc<Config>) -> Result<(), anyhow::Error> {
    use axum::Router;
    use tower_http::services::ServeDir;

    let address = std::net::SocketAddr::from(([127, 0, 0, 1], HTTP_PORT));
    let address = tokio::net::TcpListener::bind(address).await?;

    let fallback = ServeDir::new(config.temp_dir())
        .fallback(ServeDir::new(config.src_dir()).fallback(ServeDir::new(config.public_dir())));

    let router = Router::new()
        .nest_service(
            "/node_modules",
            ServeDir::new(config.root.join("node_modules")),
        )
        .fallback_service(fallback);

    axum::serve(address, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn matchers() -> Matchers {
        Matchers::new(&Config::defaults("/proj")).unwrap()
    }

    #[test]
    fn reserve_port_yields_a_bound_listener() {
        let (listener, port) = reserve_port().unwrap();
        assert_eq!(listener.local_addr().unwrap().port(), port);
    }

    #[test]
    fn classifies_changes_by_asset_pattern() {
        let src = Utf8Path::new("/proj/src");
        let public = Utf8Path::new("/proj/public");
        let m = matchers();

        let class = |p: &str| classify(Utf8Path::new(p), src, Some(public), &m);

        assert_eq!(
            class("/proj/src/assets/styles/main.scss"),
            Some(Changed::Styles)
        );
        assert_eq!(
            class("/proj/src/assets/scripts/app.js"),
            Some(Changed::Scripts)
        );
        assert_eq!(class("/proj/src/index.html"), Some(Changed::Pages));
        assert_eq!(
            class("/proj/src/assets/images/logo.png"),
            Some(Changed::Static)
        );
        assert_eq!(class("/proj/public/robots.txt"), Some(Changed::Static));
        assert_eq!(class("/elsewhere/file.txt"), None);
    }

    #[test]
    fn serving_twice_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        fs::create_dir_all(root.join("src")).unwrap();

        let config = Arc::new(Config::defaults(root));
        let (listener, port) = reserve_port().unwrap();
        let task = ServeTask::new(
            config.clone(),
            listener,
            Arc::new(StyleTask::new(config.clone())),
            Arc::new(ScriptTask::new(config.clone())),
            Arc::new(PageTask::new(config)),
        );

        // drain the slot without starting the server
        task.listener.lock().unwrap().take();

        let env = Environment {
            mode: crate::Mode::Watch,
            port: Some(port),
        };
        let err = task.serve(&env).unwrap_err();
        assert!(matches!(err, WatchError::AlreadyServing));
    }
}
