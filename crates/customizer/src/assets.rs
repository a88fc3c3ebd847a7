//! Logo and favicon slots
//!
//! Each slot is filled from, in order: the upload, the template's own
//! default asset, a generated image. Image problems are never fatal; the
//! next source in the chain is used instead.

use ab_glyph::{FontVec, PxScale};
use forge_common::palette::FALLBACK_FAVICON_COLOR;
use forge_common::{Error, Result, ThemeColor, Upload};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const LOGO_FILE: &str = "text.png";
pub const FAVICON_FILE: &str = "favicon.png";

/// Directories searched for default assets, highest priority first
pub const SEARCH_DIRS: &[&str] = &[
    "static/img",
    "static/images",
    "static/assets",
    "static",
    "assets",
    "public/img",
    "public/images",
    "public",
];

/// Font files tried in order for the placeholder logo
pub const FONT_CANDIDATES: &[&str] = &[
    "arial.ttf",
    "Arial.ttf",
    "DejaVuSans.ttf",
    "Verdana.ttf",
    "Tahoma.ttf",
];

const LOGO_WIDTH: u32 = 300;
const LOGO_HEIGHT: u32 = 150;
const LOGO_TEXT_TOP: i32 = 60;
const LOGO_FONT_SIZE: f32 = 36.0;
const FAVICON_SIDE: u32 = 32;

/// Where a slot's content came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    Uploaded,
    TemplateDefault(PathBuf),
    Generated,
}

/// Decode any supported raster format and re-encode it as PNG
pub fn convert_to_png(bytes: &[u8]) -> Result<Vec<u8>> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| Error::Asset(format!("cannot decode image: {}", e)))?;
    encode_png(&image)
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| Error::Asset(format!("cannot encode PNG: {}", e)))?;
    Ok(out.into_inner())
}

/// 32x32 square in one color
pub fn solid_square(color: ThemeColor) -> Result<Vec<u8>> {
    let square = RgbImage::from_pixel(FAVICON_SIDE, FAVICON_SIDE, Rgb(color.rgb()));
    encode_png(&DynamicImage::ImageRgb8(square))
}

/// 1x1 fully transparent PNG
pub fn transparent_pixel() -> Result<Vec<u8>> {
    let pixel = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 0]));
    encode_png(&DynamicImage::ImageRgba8(pixel))
}

/// White 300x150 image with `name` drawn in black, horizontally centered
pub fn placeholder_logo(name: &str, font: &FontVec) -> Result<Vec<u8>> {
    let mut canvas = RgbImage::from_pixel(LOGO_WIDTH, LOGO_HEIGHT, Rgb([255, 255, 255]));
    let scale = PxScale::from(LOGO_FONT_SIZE);
    let (text_width, _) = text_size(scale, font, name);
    let x = (LOGO_WIDTH as i32 - text_width as i32) / 2;

    draw_text_mut(&mut canvas, Rgb([0, 0, 0]), x, LOGO_TEXT_TOP, scale, font, name);
    encode_png(&DynamicImage::ImageRgb8(canvas))
}

/// Look up a default asset under `base`.
///
/// Tries the exact name in every search directory, then the same stem
/// with each alternate extension, then any file whose name starts with
/// the stem.
pub fn find_asset(base: &Path, asset_name: &str, alternate_extensions: &[&str]) -> Option<PathBuf> {
    let dirs: Vec<PathBuf> = SEARCH_DIRS
        .iter()
        .map(|dir| base.join(dir))
        .filter(|dir| dir.is_dir())
        .collect();

    if let Some(found) = dirs.iter().map(|d| d.join(asset_name)).find(|p| p.is_file()) {
        return Some(found);
    }

    let stem = Path::new(asset_name).file_stem()?.to_string_lossy().into_owned();

    for dir in &dirs {
        for ext in alternate_extensions {
            let candidate = dir.join(format!("{}.{}", stem, ext));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }

    for dir in &dirs {
        let Ok(entries) = fs::read_dir(dir) else {
            continue;
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        if let Some(name) = names.into_iter().find(|n| n.starts_with(&stem)) {
            return Some(dir.join(name));
        }
    }

    None
}

/// Image directory of a site: `static/img`, or an existing
/// `static/images` when `static/img` is absent
pub fn image_dir(site_root: &Path) -> Result<PathBuf> {
    let img = site_root.join("static").join("img");
    if img.is_dir() {
        return Ok(img);
    }
    let images = site_root.join("static").join("images");
    if images.is_dir() {
        return Ok(images);
    }
    fs::create_dir_all(&img)?;
    Ok(img)
}

/// Fills the logo and favicon slots of one site
pub struct AssetSlots {
    font_dirs: Vec<PathBuf>,
}

impl AssetSlots {
    pub fn new(font_dirs: Vec<PathBuf>) -> Self {
        Self { font_dirs }
    }

    /// First candidate font that exists and parses
    pub fn load_font(&self) -> Option<FontVec> {
        for file in FONT_CANDIDATES {
            for dir in &self.font_dirs {
                let path = dir.join(file);
                let Ok(data) = fs::read(&path) else {
                    continue;
                };
                match FontVec::try_from_vec(data) {
                    Ok(font) => {
                        debug!("Using font {}", path.display());
                        return Some(font);
                    }
                    Err(e) => debug!("Skipping font {}: {}", path.display(), e),
                }
            }
        }
        None
    }

    pub fn fill_logo(&self, site_root: &Path, name: &str, upload: Option<&Upload>) -> Result<AssetSource> {
        let target = image_dir(site_root)?.join(LOGO_FILE);

        if let Some(upload) = upload {
            match convert_to_png(&upload.bytes) {
                Ok(png) => {
                    fs::write(&target, png)?;
                    info!("Logo set from upload {}", upload.file_name);
                    return Ok(AssetSource::Uploaded);
                }
                Err(e) => warn!("Uploaded logo {} unusable: {}", upload.file_name, e),
            }
        }

        if let Some(found) = find_asset(site_root, LOGO_FILE, &["png", "jpg", "jpeg", "gif"]) {
            place_default(&found, &target)?;
            return Ok(AssetSource::TemplateDefault(found));
        }

        let png = match self.load_font() {
            Some(font) => placeholder_logo(name, &font).or_else(|e| {
                warn!("Placeholder logo failed: {}", e);
                transparent_pixel()
            })?,
            None => {
                warn!("No usable font found; writing a transparent logo");
                transparent_pixel()?
            }
        };
        fs::write(&target, png)?;
        info!("Created placeholder logo at {}", target.display());
        Ok(AssetSource::Generated)
    }

    pub fn fill_favicon(
        &self,
        site_root: &Path,
        theme_color: Option<ThemeColor>,
        upload: Option<&Upload>,
    ) -> Result<AssetSource> {
        let target = image_dir(site_root)?.join(FAVICON_FILE);

        match upload {
            Some(upload) => match convert_to_png(&upload.bytes) {
                Ok(png) => {
                    fs::write(&target, png)?;
                    info!("Favicon set from upload {}", upload.file_name);
                    return Ok(AssetSource::Uploaded);
                }
                Err(e) => warn!("Uploaded favicon {} unusable: {}", upload.file_name, e),
            },
            None => {
                if let Some(found) = find_asset(site_root, FAVICON_FILE, &["png", "ico", "jpg"]) {
                    place_default(&found, &target)?;
                    return Ok(AssetSource::TemplateDefault(found));
                }
            }
        }

        let color = match theme_color {
            Some(color) => color,
            None => FALLBACK_FAVICON_COLOR.parse()?,
        };
        fs::write(&target, solid_square(color)?)?;
        info!("Created {} favicon at {}", color, target.display());
        Ok(AssetSource::Generated)
    }
}

fn place_default(found: &Path, target: &Path) -> Result<()> {
    if found == target {
        debug!("Default asset already in place at {}", target.display());
        return Ok(());
    }
    let data = fs::read(found)?;
    fs::write(target, data)?;
    debug!("Copied default asset {} to {}", found.display(), target.display());
    Ok(())
}
