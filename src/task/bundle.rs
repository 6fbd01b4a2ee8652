//! The bundling and minification step.
//!
//! Compiled pages in the temp directory carry build-reference blocks:
//!
//! ```html
//! <!-- build:css assets/styles/vendor.css -->
//! <link rel="stylesheet" href="/node_modules/bootstrap/dist/css/bootstrap.css">
//! <!-- endbuild -->
//! ```
//!
//! Each block is replaced with a single tag pointing at the named bundle,
//! and the referenced files are concatenated into it. References resolve
//! against the temp directory first, then against the project root (which
//! covers vendor paths such as `node_modules`). Bundles, pages and any
//! leftover compiled assets are minified by extension and written to dist.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::sync::{Arc, LazyLock};

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use thiserror::Error;

use crate::Environment;
use crate::config::Config;
use crate::io;
use crate::task::{SelectError, Task, rel_to, select};

static BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--\s*build:(css|js)\s+(\S+)\s*-->(.*?)<!--\s*endbuild\s*-->")
        .expect("invalid build block regex")
});

static REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:href|src)="([^"]+)""#).expect("invalid reference regex"));

/// Errors that can occur while bundling and minifying.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Asset '{0}' referenced from '{1}' not found")]
    MissingAsset(Utf8PathBuf, Utf8PathBuf),

    #[error("CSS minification error: {0}")]
    Css(String),

    #[error("JS minification error: {0}")]
    Js(String),

    #[error(transparent)]
    Select(#[from] SelectError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Css,
    Js,
}

/// Resolves build-reference blocks in the compiled pages, concatenates and
/// minifies the referenced bundles, and writes the final output to dist.
pub struct BundleTask {
    config: Arc<Config>,
}

impl BundleTask {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    fn bundle(&self) -> Result<(), BundleError> {
        let temp = self.config.temp_dir();
        let dist = self.config.dist_dir();

        // Temp files consumed into a bundle; everything else passes through.
        let mut consumed = HashSet::new();
        let mut bundles: BTreeMap<Utf8PathBuf, (Kind, String)> = BTreeMap::new();

        let pages = select(&temp.join(&self.config.build.paths.pages).to_string())?;

        for path in &pages {
            let html = fs::read_to_string(path)?;
            let html = self.resolve_blocks(path, &html, &mut consumed, &mut bundles)?;

            let out = dist.join(rel_to(path, &temp));
            io::write_file(&out, minify_html(&html))?;
            tracing::debug!("bundled {path} -> {out}");
            consumed.insert(path.clone());
        }

        for (target, (kind, content)) in bundles {
            let out = dist.join(target.as_str().trim_start_matches('/'));
            match kind {
                Kind::Css => io::write_file(&out, minify_css(&content)?)?,
                Kind::Js => io::write_file(&out, minify_js(content.as_bytes())?)?,
            }
        }

        // Compiled assets no bundle consumed still ship, minified by extension.
        for path in select(&temp.join("**/*").to_string())? {
            if consumed.contains(&path) {
                continue;
            }

            let out = dist.join(rel_to(&path, &temp));
            match path.extension() {
                Some("css") => io::write_file(&out, minify_css(&fs::read_to_string(&path)?)?)?,
                Some("js") => io::write_file(&out, minify_js(&fs::read(&path)?)?)?,
                Some("html") => io::write_file(&out, minify_html(&fs::read_to_string(&path)?))?,
                _ => io::copy_file(&path, &out)?,
            }
        }

        Ok(())
    }

    /// Rewrite every build block of a page, accumulating bundle contents.
    fn resolve_blocks(
        &self,
        page: &Utf8Path,
        html: &str,
        consumed: &mut HashSet<Utf8PathBuf>,
        bundles: &mut BTreeMap<Utf8PathBuf, (Kind, String)>,
    ) -> Result<String, BundleError> {
        let mut out = String::with_capacity(html.len());
        let mut last = 0;

        for caps in BLOCK.captures_iter(html) {
            let whole = caps.get(0).expect("group 0 always present");
            out.push_str(&html[last..whole.start()]);
            last = whole.end();

            let kind = match &caps[1] {
                "css" => Kind::Css,
                _ => Kind::Js,
            };
            let target = Utf8PathBuf::from(&caps[2]);

            let entry = bundles
                .entry(target.clone())
                .or_insert_with(|| (kind, String::new()));

            for reference in REFERENCE.captures_iter(&caps[3]) {
                let href = &reference[1];
                let path = self.resolve(href, consumed).ok_or_else(|| {
                    BundleError::MissingAsset(Utf8PathBuf::from(href), page.to_path_buf())
                })?;

                entry.1.push_str(&fs::read_to_string(path)?);
                entry.1.push('\n');
            }

            match kind {
                Kind::Css => {
                    out.push_str(&format!(r#"<link rel="stylesheet" href="/{}">"#, target));
                }
                Kind::Js => {
                    out.push_str(&format!(r#"<script src="/{}"></script>"#, target));
                }
            }
        }

        out.push_str(&html[last..]);
        Ok(out)
    }

    /// Search path for references: temp first, then the project root.
    fn resolve(&self, href: &str, consumed: &mut HashSet<Utf8PathBuf>) -> Option<Utf8PathBuf> {
        let href = href.trim_start_matches('/');

        let in_temp = self.config.temp_dir().join(href);
        if in_temp.is_file() {
            consumed.insert(in_temp.clone());
            return Some(in_temp);
        }

        let in_root = self.config.root.join(href);
        if in_root.is_file() {
            return Some(in_root);
        }

        None
    }
}

impl Task for BundleTask {
    fn name(&self) -> &'static str {
        "bundle"
    }

    fn run(&self, _: &Environment) -> anyhow::Result<()> {
        Ok(self.bundle()?)
    }
}

fn minify_css(source: &str) -> Result<String, BundleError> {
    use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};

    let mut sheet = StyleSheet::parse(source, ParserOptions::default())
        .map_err(|e| BundleError::Css(e.to_string()))?;
    sheet
        .minify(MinifyOptions::default())
        .map_err(|e| BundleError::Css(e.to_string()))?;

    let output = sheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .map_err(|e| BundleError::Css(e.to_string()))?;

    Ok(output.code)
}

fn minify_js(source: &[u8]) -> Result<Vec<u8>, BundleError> {
    let session = minify_js::Session::new();
    let mut out = Vec::new();

    minify_js::minify(&session, minify_js::TopLevelMode::Global, source, &mut out)
        .map_err(|e| BundleError::Js(format!("{e:?}")))?;

    Ok(out)
}

fn minify_html(source: &str) -> Vec<u8> {
    let cfg = minify_html::Cfg {
        minify_css: true,
        minify_js: true,
        ..minify_html::Cfg::default()
    };

    minify_html::minify(source.as_bytes(), &cfg)
}
