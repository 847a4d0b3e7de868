use image::DynamicImage;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Rasterization resolution used when none is configured.
pub const DEFAULT_DPI: u32 = 200;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("Failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("Failed to encode image: {0}")]
    Encode(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("pdftoppm not found. Install poppler: brew install poppler (macOS) or apt install poppler-utils (Linux)")]
    PdftoppmNotFound,
    #[error("pdftoppm failed with exit code {code}: {stderr}")]
    PdftoppmFailed { code: i32, stderr: String },
    #[error("document produced no pages: {0}")]
    NoPages(PathBuf),
}

/// Turns a source document into one image per page, in page order.
pub trait PageRasterizer: Send + Sync {
    fn rasterize(&self, path: &Path) -> Result<Vec<DynamicImage>, RasterError>;
}

/// Load a single image file (PNG / JPEG / TIFF / …) as a one-page document.
pub struct ImageFileRasterizer;

impl PageRasterizer for ImageFileRasterizer {
    fn rasterize(&self, path: &Path) -> Result<Vec<DynamicImage>, RasterError> {
        Ok(vec![load_image(path)?])
    }
}

/// Renders PDF pages through poppler's `pdftoppm`.
pub struct PdftoppmRasterizer {
    dpi: u32,
}

impl PdftoppmRasterizer {
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self::new(DEFAULT_DPI)
    }
}

impl PageRasterizer for PdftoppmRasterizer {
    fn rasterize(&self, path: &Path) -> Result<Vec<DynamicImage>, RasterError> {
        let temp_dir = tempfile::tempdir()?;
        let prefix = temp_dir.path().join("page");

        let output = Command::new("pdftoppm")
            .args(["-png", "-r", &self.dpi.to_string()])
            .arg(path)
            .arg(&prefix)
            .output();

        match output {
            Ok(out) if out.status.success() => {}
            Ok(out) => {
                return Err(RasterError::PdftoppmFailed {
                    code: out.status.code().unwrap_or(-1),
                    stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RasterError::PdftoppmNotFound)
            }
            Err(e) => return Err(RasterError::Io(e)),
        }

        let pages = collect_pages(temp_dir.path())?
            .iter()
            .map(|p| load_image(p))
            .collect::<Result<Vec<_>, _>>()?;
        if pages.is_empty() {
            return Err(RasterError::NoPages(path.to_path_buf()));
        }
        Ok(pages)
    }
}

/// Picks PDF or plain-image handling from the file extension.
pub struct DocumentRasterizer {
    pdf: PdftoppmRasterizer,
}

impl DocumentRasterizer {
    pub fn new(dpi: u32) -> Self {
        Self { pdf: PdftoppmRasterizer::new(dpi) }
    }
}

impl Default for DocumentRasterizer {
    fn default() -> Self {
        Self::new(DEFAULT_DPI)
    }
}

impl PageRasterizer for DocumentRasterizer {
    fn rasterize(&self, path: &Path) -> Result<Vec<DynamicImage>, RasterError> {
        if is_pdf(path) {
            self.pdf.rasterize(path)
        } else {
            ImageFileRasterizer.rasterize(path)
        }
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "gif", "webp"];

/// PDFs and the raster formats the `image` crate is built to read.
pub fn is_supported(path: &Path) -> bool {
    is_pdf(path)
        || path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|known| e.eq_ignore_ascii_case(known)))
}

pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// pdftoppm names pages `page-1.png`, `page-01.png`, … with padding that depends
/// on the page count, so order by the parsed number rather than by name.
fn collect_pages(dir: &Path) -> Result<Vec<PathBuf>, RasterError> {
    let mut pages: Vec<(u32, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter_map(|path| {
            let stem = path.file_stem()?.to_str()?;
            let number = stem.strip_prefix("page-")?.parse().ok()?;
            Some((number, path))
        })
        .collect();
    pages.sort_by_key(|(n, _)| *n);
    Ok(pages.into_iter().map(|(_, p)| p).collect())
}

pub fn load_image(path: &Path) -> Result<DynamicImage, RasterError> {
    Ok(image::open(path)?)
}

pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, RasterError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| RasterError::Encode(e.to_string()))?;
    Ok(buf)
}
