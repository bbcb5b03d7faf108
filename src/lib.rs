//! Paginated A4 preview of official letters.
//!
//! A loosely-typed document record is normalized, its body formatted into
//! blocks, every part measured with real font metrics, and the blocks broken
//! greedily into A4 pages that render to PDF. [`preview::A4Preview`] is the
//! long-lived, debounced form; the functions here run a single pass.

pub mod content;
pub mod debounce;
mod error;
pub mod fonts;
pub mod measure;
pub mod model;
pub mod normalize;
pub mod pager;
pub mod pdf;
pub mod preview;

pub use error::Error;
pub use model::{Document, Margins};
pub use preview::{A4Preview, LayoutSummary, PageList};

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde_json::Value;

use fonts::FontSet;
use measure::MeasureSurface;
use model::{PAGE_HEIGHT_MM, PAGE_WIDTH_MM};

/// Settings for one-shot pagination and rendering.
#[derive(Clone, Debug)]
pub struct RenderOptions {
    /// `None` reads the document's own `margins` object, defaulting to 25mm.
    pub margins: Option<Margins>,
    pub zoom: f32,
    /// Font family looked up in the system font directories; `None` uses
    /// built-in Helvetica metrics.
    pub font_family: Option<String>,
    /// Base directory for relative image paths.
    pub assets: Option<PathBuf>,
    pub readonly: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            margins: None,
            zoom: 1.0,
            font_family: None,
            assets: None,
            readonly: false,
        }
    }
}

impl RenderOptions {
    fn resolve_margins(&self, document: &Value) -> Result<Margins, Error> {
        let m = match self.margins {
            Some(m) => m,
            None => normalize::margins(document.get("margins").unwrap_or(&Value::Null)),
        };
        let sides = [m.top, m.right, m.bottom, m.left];
        if sides.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(Error::Layout(format!("margins must be non-negative, got {m:?}")));
        }
        if m.left + m.right >= PAGE_WIDTH_MM || m.top + m.bottom >= PAGE_HEIGHT_MM {
            return Err(Error::Layout(format!("margins leave no room on the page: {m:?}")));
        }
        Ok(m)
    }

    fn fonts(&self) -> FontSet {
        match &self.font_family {
            Some(family) => FontSet::load(family),
            None => FontSet::builtin(),
        }
    }

    /// A mounted preview with every prop from these options.
    pub fn preview(&self, document: Value) -> Result<A4Preview, Error> {
        let margins = self.resolve_margins(&document)?;
        let mut preview = A4Preview::new(document)
            .with_margins(margins)
            .with_zoom(self.zoom)
            .with_readonly(self.readonly);
        if let Some(dir) = &self.assets {
            preview = preview.with_assets(dir);
        }
        preview.mount(MeasureSurface::new(self.fonts()), Instant::now());
        Ok(preview)
    }
}

/// Parse a document record from a JSON file.
pub fn read_document(path: &Path) -> Result<Value, Error> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Run one layout pass over `document` and return the committed pages.
pub fn paginate_document(document: &Value, options: &RenderOptions) -> Result<PageList, Error> {
    let mut preview = options.preview(document.clone())?;
    preview.recompute_now();
    Ok(preview.page_list().clone())
}

pub fn render_document_to_pdf(input: &Path, output: &Path, options: &RenderOptions) -> Result<(), Error> {
    let t0 = Instant::now();

    let document = read_document(input)?;
    let t_parse = t0.elapsed();

    let mut preview = options.preview(document)?;
    preview.recompute_now();
    let t_layout = t0.elapsed();

    let bytes = preview.render_pdf()?;
    let t_render = t0.elapsed();

    std::fs::write(output, &bytes).map_err(Error::Io)?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: parse={:.1}ms, layout={:.1}ms, render={:.1}ms, write={:.1}ms, total={:.1}ms ({} pages, output {} bytes)",
        t_parse.as_secs_f64() * 1000.0,
        (t_layout - t_parse).as_secs_f64() * 1000.0,
        (t_render - t_layout).as_secs_f64() * 1000.0,
        (t_total - t_render).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        preview.pages().len(),
        bytes.len(),
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_margins_are_used_when_options_leave_them_open() {
        let doc = json!({ "margins": { "top": 10, "bottom": 40 } });
        let m = RenderOptions::default().resolve_margins(&doc).unwrap();
        assert_eq!((m.top, m.right, m.bottom, m.left), (10.0, 25.0, 40.0, 25.0));

        let forced = RenderOptions {
            margins: Some(Margins::uniform(15.0)),
            ..RenderOptions::default()
        };
        assert_eq!(forced.resolve_margins(&doc).unwrap(), Margins::uniform(15.0));
    }

    #[test]
    fn margins_wider_than_the_sheet_are_rejected() {
        let opts = RenderOptions {
            margins: Some(Margins {
                left: 120.0,
                right: 100.0,
                ..Margins::default()
            }),
            ..RenderOptions::default()
        };
        assert!(matches!(
            paginate_document(&json!({}), &opts),
            Err(Error::Layout(_))
        ));
    }
}
