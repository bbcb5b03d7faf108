use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::ImageDecoder;
use pdf_writer::{Filter, Pdf, Ref};

use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum ImageFormat {
    Jpeg,
    Png,
}

pub(crate) struct LoadedImage {
    pub(crate) data: Vec<u8>,
    pub(crate) format: ImageFormat,
    pub(crate) pixel_width: u32,
    pub(crate) pixel_height: u32,
    gray: bool,
}

impl LoadedImage {
    /// Width over height.
    pub(crate) fn aspect(&self) -> f32 {
        if self.pixel_height == 0 {
            1.0
        } else {
            self.pixel_width as f32 / self.pixel_height as f32
        }
    }
}

/// Local path for an image reference, or `None` for sources that would need
/// network access. Relative paths resolve against `assets`.
pub(crate) fn resolve_path(source: &str, assets: Option<&Path>) -> Option<PathBuf> {
    let source = source.trim();
    if source.is_empty() {
        return None;
    }
    let lower = source.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:") {
        return None;
    }
    let raw = source.strip_prefix("file://").unwrap_or(source);
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        return Some(path);
    }
    Some(match assets {
        Some(dir) => dir.join(path),
        None => path,
    })
}

fn image_error(path: &Path, message: impl ToString) -> Error {
    Error::Image {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

pub(crate) fn load(path: &Path) -> Result<LoadedImage, Error> {
    let data = std::fs::read(path)?;
    let format = match image::guess_format(&data).map_err(|e| image_error(path, e))? {
        image::ImageFormat::Jpeg => ImageFormat::Jpeg,
        image::ImageFormat::Png => ImageFormat::Png,
        other => return Err(image_error(path, format!("unsupported format {other:?}"))),
    };
    let (pixel_width, pixel_height, gray) = match format {
        ImageFormat::Jpeg => {
            let decoder = image::codecs::jpeg::JpegDecoder::new(Cursor::new(&data))
                .map_err(|e| image_error(path, e))?;
            let (w, h) = decoder.dimensions();
            (w, h, decoder.color_type() == image::ColorType::L8)
        }
        ImageFormat::Png => {
            let decoder = image::codecs::png::PngDecoder::new(Cursor::new(&data))
                .map_err(|e| image_error(path, e))?;
            let (w, h) = decoder.dimensions();
            (w, h, false)
        }
    };
    Ok(LoadedImage {
        data,
        format,
        pixel_width,
        pixel_height,
        gray,
    })
}

/// Write `img` as an image XObject. PNG alpha becomes a soft mask.
pub(crate) fn embed(pdf: &mut Pdf, img: &LoadedImage, alloc: &mut impl FnMut() -> Ref) -> Option<Ref> {
    let xobj_ref = alloc();
    match img.format {
        ImageFormat::Jpeg => {
            let mut xobj = pdf.image_xobject(xobj_ref, &img.data);
            xobj.filter(Filter::DctDecode);
            xobj.width(img.pixel_width as i32);
            xobj.height(img.pixel_height as i32);
            if img.gray {
                xobj.color_space().device_gray();
            } else {
                xobj.color_space().device_rgb();
            }
            xobj.bits_per_component(8);
        }
        ImageFormat::Png => {
            let decoded = image::load_from_memory_with_format(&img.data, image::ImageFormat::Png)
                .map_err(|e| log::warn!("PNG decode failed: {e}"))
                .ok()?;
            let rgba = decoded.to_rgba8();
            let (w, h) = (rgba.width(), rgba.height());
            let has_alpha = rgba.pixels().any(|p| p.0[3] < 255);

            let rgb_data: Vec<u8> = rgba
                .pixels()
                .flat_map(|p| [p.0[0], p.0[1], p.0[2]])
                .collect();
            let compressed_rgb = miniz_oxide::deflate::compress_to_vec_zlib(&rgb_data, 6);

            let smask_ref = if has_alpha {
                let alpha_data: Vec<u8> = rgba.pixels().map(|p| p.0[3]).collect();
                let compressed_alpha = miniz_oxide::deflate::compress_to_vec_zlib(&alpha_data, 6);
                let mask_ref = alloc();
                let mut mask = pdf.image_xobject(mask_ref, &compressed_alpha);
                mask.filter(Filter::FlateDecode);
                mask.width(w as i32);
                mask.height(h as i32);
                mask.color_space().device_gray();
                mask.bits_per_component(8);
                Some(mask_ref)
            } else {
                None
            };

            let mut xobj = pdf.image_xobject(xobj_ref, &compressed_rgb);
            xobj.filter(Filter::FlateDecode);
            xobj.width(w as i32);
            xobj.height(h as i32);
            xobj.color_space().device_rgb();
            xobj.bits_per_component(8);
            if let Some(mask_ref) = smask_ref {
                xobj.s_mask(mask_ref);
            }
        }
    }
    Some(xobj_ref)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_sources_are_not_resolved() {
        assert_eq!(resolve_path("https://cdn.example/imza.png", None), None);
        assert_eq!(resolve_path("data:image/png;base64,AAAA", None), None);
        assert_eq!(resolve_path("  ", None), None);
    }

    #[test]
    fn relative_paths_join_the_asset_dir() {
        let dir = Path::new("/srv/belgeler");
        assert_eq!(
            resolve_path("imzalar/baskan.png", Some(dir)),
            Some(PathBuf::from("/srv/belgeler/imzalar/baskan.png"))
        );
        assert_eq!(
            resolve_path("file:///tmp/logo.png", Some(dir)),
            Some(PathBuf::from("/tmp/logo.png"))
        );
    }

    #[test]
    fn png_dimensions_are_read() {
        let mut bytes = Vec::new();
        let img = image::RgbaImage::from_pixel(4, 2, image::Rgba([0, 0, 0, 128]));
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let path = std::env::temp_dir().join(format!("a4-preview-{}.png", std::process::id()));
        std::fs::write(&path, &bytes).unwrap();
        let loaded = load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!((loaded.pixel_width, loaded.pixel_height), (4, 2));
        assert_eq!(loaded.format, ImageFormat::Png);
        assert_eq!(loaded.aspect(), 2.0);
    }
}
