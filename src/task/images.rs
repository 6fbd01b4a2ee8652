use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;

use camino::Utf8Path;
use image::{ExtendedColorType, ImageReader};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use thiserror::Error;

use crate::Environment;
use crate::config::Config;
use crate::io;
use crate::task::{SelectError, Task, rel_to, select};

/// Errors that can occur when processing images.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Select(#[from] SelectError),
}

/// Recompresses raster images into the dist directory. Formats the codec
/// does not cover (SVG among them) are copied verbatim.
pub struct ImageTask {
    config: Arc<Config>,
}

impl ImageTask {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    fn optimize(&self) -> Result<(), ImageError> {
        let src = self.config.src_dir();
        let dist = self.config.dist_dir();
        let files = select(&self.config.source_glob(&self.config.build.paths.images))?;

        files
            .into_par_iter()
            .try_for_each(|path| -> Result<(), ImageError> {
                let out = dist.join(rel_to(&path, &src));
                recompress(&path, &out)?;
                tracing::debug!("optimized {path} -> {out}");

                Ok(())
            })
    }
}

impl Task for ImageTask {
    fn name(&self) -> &'static str {
        "images"
    }

    fn run(&self, _: &Environment) -> anyhow::Result<()> {
        Ok(self.optimize()?)
    }
}

pub(crate) fn recompress(path: &Utf8Path, out: &Utf8Path) -> Result<(), ImageError> {
    match path.extension() {
        Some("png") | Some("jpg") | Some("jpeg") | Some("webp") => {}
        _ => return Ok(io::copy_file(path, out)?),
    }

    let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    let width = img.width();
    let height = img.height();

    if let Some(dir) = out.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut writer = BufWriter::new(File::create(out)?);

    match path.extension() {
        Some("png") => {
            use image::ImageEncoder;
            use image::codecs::png::PngEncoder;

            PngEncoder::new(&mut writer).write_image(
                &img.to_rgba8(),
                width,
                height,
                ExtendedColorType::Rgba8,
            )?;
        }
        Some("jpg") | Some("jpeg") => {
            use image::ImageEncoder;
            use image::codecs::jpeg::JpegEncoder;

            JpegEncoder::new_with_quality(&mut writer, 80).write_image(
                &img.to_rgb8(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )?;
        }
        Some("webp") => {
            use image::codecs::webp::WebPEncoder;

            WebPEncoder::new_lossless(&mut writer).encode(
                &img.to_rgba8(),
                width,
                height,
                ExtendedColorType::Rgba8,
            )?;
        }
        _ => unreachable!("filtered above"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::Utf8Path;

    use super::*;

    #[test]
    fn recompresses_png() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let source = root.join("a.png");

        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 255]));
        img.save(&source).unwrap();

        let out = root.join("out/a.png");
        recompress(&source, &out).unwrap();

        let loaded = image::open(&out).unwrap();
        assert_eq!(loaded.width(), 4);
        assert_eq!(loaded.height(), 4);
    }

    #[test]
    fn copies_unknown_formats_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let source = root.join("logo.svg");
        fs::write(&source, "<svg></svg>").unwrap();

        let out = root.join("out/logo.svg");
        recompress(&source, &out).unwrap();

        assert_eq!(fs::read_to_string(out).unwrap(), "<svg></svg>");
    }
}
