use std::path::Path;

use crate::render::surface::Surface;

/// Writes an annotated surface to a PNG file, alpha included.
pub fn write_png(path: &Path, surface: &Surface) -> Result<(), Box<dyn std::error::Error>> {
    let is_png = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
    if !is_png {
        return Err(format!("snapshot must be a .png file, got {}", path.display()).into());
    }
    if surface.size().is_empty() {
        return Err("nothing has been drawn yet".into());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let size = surface.size();
    let img = image::RgbaImage::from_raw(size.width, size.height, surface.pixels().to_vec())
        .ok_or("surface buffer does not match its dimensions")?;
    img.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}
