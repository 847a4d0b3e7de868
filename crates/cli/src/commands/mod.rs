pub mod extract;
pub mod validate;
pub mod watch;

use anyhow::{anyhow, Context};
use clap::Args;
use metamagic_core::Layout;
use metamagic_ocr::raster::DEFAULT_DPI;
use metamagic_ocr::DocumentRasterizer;
use std::path::PathBuf;

#[cfg(feature = "tesseract")]
pub type Engine = metamagic_ocr::TesseractRecognizer;
#[cfg(not(feature = "tesseract"))]
pub type Engine = metamagic_ocr::TesseractCli;

#[derive(Args, Debug, Clone)]
pub struct LayoutArgs {
    /// Field layout file (.toml or .json)
    #[arg(short, long = "fields", value_name = "FILE", conflicts_with = "preset")]
    pub fields: Option<PathBuf>,

    /// Built-in layout: purchase-order (default when no --fields is given)
    #[arg(short, long, value_name = "NAME")]
    pub preset: Option<String>,
}

impl LayoutArgs {
    pub fn load(&self) -> anyhow::Result<Layout> {
        if let Some(path) = &self.fields {
            return Layout::from_path(path)
                .with_context(|| format!("loading layout {}", path.display()));
        }
        let name = self.preset.as_deref().unwrap_or("purchase-order");
        Layout::preset(name).ok_or_else(|| anyhow!("unknown preset '{name}' (available: purchase-order)"))
    }
}

#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Resolution used to rasterize PDF pages
    #[arg(long, default_value_t = DEFAULT_DPI)]
    pub dpi: u32,

    /// Tesseract language
    #[arg(long, default_value = "eng", env = "METAMAGIC_LANG")]
    pub lang: String,
}

impl EngineArgs {
    pub fn rasterizer(&self) -> DocumentRasterizer {
        DocumentRasterizer::new(self.dpi)
    }

    #[cfg(feature = "tesseract")]
    pub fn recognizer(&self) -> Engine {
        Engine::new(None, &self.lang)
    }

    #[cfg(not(feature = "tesseract"))]
    pub fn recognizer(&self) -> Engine {
        Engine::new(&self.lang)
    }
}
