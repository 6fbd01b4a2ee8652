//! The build configuration.
//!
//! A [`Config`] is assembled exactly once at process start: hard-coded
//! defaults overlaid field by field with an optional `pages.config.toml`
//! found at the project root. After that it is immutable and shared
//! read-only by every task.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

/// Name of the optional override file expected at the project root.
pub const CONFIG_FILE: &str = "pages.config.toml";

/// Glob patterns selecting source files for each asset class, resolved
/// relative to the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPatterns {
    pub styles: String,
    pub scripts: String,
    pub pages: String,
    pub images: String,
    pub fonts: String,
}

impl Default for AssetPatterns {
    fn default() -> Self {
        Self {
            styles: "assets/styles/*.scss".into(),
            scripts: "assets/scripts/*.js".into(),
            pages: "*.html".into(),
            images: "assets/images/**".into(),
            fonts: "assets/fonts/**".into(),
        }
    }
}

/// Directory layout of a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Source tree with styles, scripts and page templates.
    pub src: Utf8PathBuf,
    /// Final output directory.
    pub dist: Utf8PathBuf,
    /// Intermediate output directory, also served during development.
    pub temp: Utf8PathBuf,
    /// Passthrough files copied to dist verbatim.
    pub public: Utf8PathBuf,
    pub paths: AssetPatterns,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            src: "src".into(),
            dist: "dist".into(),
            temp: "temp".into(),
            public: "public".into(),
            paths: AssetPatterns::default(),
        }
    }
}

/// Effective configuration for a single run. Every required key is
/// guaranteed to be present because defaults fill anything the override
/// file leaves out.
#[derive(Debug, Clone)]
pub struct Config {
    /// Project root against which all other paths are resolved.
    pub root: Utf8PathBuf,
    pub build: BuildConfig,
    /// Arbitrary key/value data passed verbatim to the page templates.
    pub data: toml::Table,
}

#[derive(Debug, Default, Deserialize)]
struct PatternsOverlay {
    styles: Option<String>,
    scripts: Option<String>,
    pages: Option<String>,
    images: Option<String>,
    fonts: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BuildOverlay {
    src: Option<Utf8PathBuf>,
    dist: Option<Utf8PathBuf>,
    temp: Option<Utf8PathBuf>,
    public: Option<Utf8PathBuf>,
    paths: Option<PatternsOverlay>,
}

/// Shape of `pages.config.toml`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
struct Overlay {
    build: Option<BuildOverlay>,
    data: Option<toml::Table>,
}

impl Config {
    /// The built-in defaults for a given project root.
    pub fn defaults(root: impl AsRef<Utf8Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            build: BuildConfig::default(),
            data: toml::Table::new(),
        }
    }

    /// Resolve the effective configuration for a project root.
    ///
    /// Reads `pages.config.toml` from the root when present. A missing or
    /// unparsable file falls back to defaults; the failure is logged as a
    /// warning but never aborts the run.
    pub fn load(root: impl AsRef<Utf8Path>) -> Self {
        let root = root.as_ref();
        Self::load_from(root, &root.join(CONFIG_FILE))
    }

    /// Same as [`Config::load`], with an explicit override file location.
    pub fn load_from(root: impl AsRef<Utf8Path>, file: &Utf8Path) -> Self {
        let mut config = Self::defaults(root);

        let text = match fs::read_to_string(file) {
            Ok(text) => text,
            Err(_) => return config,
        };

        match toml::from_str::<Overlay>(&text) {
            Ok(overlay) => config.apply(overlay),
            Err(e) => {
                tracing::warn!("ignoring malformed {file}: {e}");
            }
        }

        config
    }

    fn apply(&mut self, overlay: Overlay) {
        if let Some(build) = overlay.build {
            let target = &mut self.build;

            if let Some(src) = build.src {
                target.src = src;
            }
            if let Some(dist) = build.dist {
                target.dist = dist;
            }
            if let Some(temp) = build.temp {
                target.temp = temp;
            }
            if let Some(public) = build.public {
                target.public = public;
            }

            if let Some(paths) = build.paths {
                let patterns = &mut target.paths;

                if let Some(styles) = paths.styles {
                    patterns.styles = styles;
                }
                if let Some(scripts) = paths.scripts {
                    patterns.scripts = scripts;
                }
                if let Some(pages) = paths.pages {
                    patterns.pages = pages;
                }
                if let Some(images) = paths.images {
                    patterns.images = images;
                }
                if let Some(fonts) = paths.fonts {
                    patterns.fonts = fonts;
                }
            }
        }

        if let Some(data) = overlay.data {
            self.data = data;
        }
    }

    pub fn src_dir(&self) -> Utf8PathBuf {
        self.root.join(&self.build.src)
    }

    pub fn dist_dir(&self) -> Utf8PathBuf {
        self.root.join(&self.build.dist)
    }

    pub fn temp_dir(&self) -> Utf8PathBuf {
        self.root.join(&self.build.temp)
    }

    pub fn public_dir(&self) -> Utf8PathBuf {
        self.root.join(&self.build.public)
    }

    /// Absolute glob for an asset-class pattern, anchored at the source root.
    pub fn source_glob(&self, pattern: &str) -> String {
        self.src_dir().join(pattern).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();

        let config = Config::load(root);

        assert_eq!(config.build, BuildConfig::default());
        assert!(config.data.is_empty());
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        fs::write(root.join(CONFIG_FILE), "build = {{{{").unwrap();

        let config = Config::load(root);

        assert_eq!(config.build, BuildConfig::default());
    }

    #[test]
    fn overlay_replaces_exactly_the_given_keys() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        fs::write(
            root.join(CONFIG_FILE),
            r#"
            [build]
            dist = "release"
            "#,
        )
        .unwrap();

        let config = Config::load(root);

        assert_eq!(config.build.dist, Utf8PathBuf::from("release"));
        // everything else stays at defaults, including the nested patterns
        assert_eq!(config.build.src, Utf8PathBuf::from("src"));
        assert_eq!(config.build.paths, AssetPatterns::default());
    }

    #[test]
    fn overlay_replaces_nested_pattern_keys() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        fs::write(
            root.join(CONFIG_FILE),
            r#"
            [build.paths]
            styles = "css/*.scss"
            "#,
        )
        .unwrap();

        let config = Config::load(root);

        assert_eq!(config.build.paths.styles, "css/*.scss");
        assert_eq!(config.build.paths.pages, "*.html");
    }

    #[test]
    fn template_data_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        fs::write(
            root.join(CONFIG_FILE),
            r#"
            [data]
            title = "Example"
            "#,
        )
        .unwrap();

        let config = Config::load(root);

        assert_eq!(config.data["title"].as_str(), Some("Example"));
    }

    #[test]
    fn source_glob_is_anchored_at_the_source_root() {
        let config = Config::defaults("/proj");
        let glob = config.source_glob(&config.build.paths.styles.clone());

        assert_eq!(glob, "/proj/src/assets/styles/*.scss");
    }
}
