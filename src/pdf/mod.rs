//! PDF output of a paginated letter.
//!
//! Draws the same section layouts the measurement pass produced, page by page,
//! in the order the pager assumed: header, then (first page only) meta block
//! and receiver, content fragments, signatures on the last page, footer pinned
//! above the bottom margin.

mod images;
mod layout;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use pdf_writer::{Filter, Name, Pdf, Rect, Ref};

use crate::content::SpanStyle;
use crate::error::Error;
use crate::fonts::{EmbeddedFace, FontSet, embed_face};
use crate::measure::sections::{self, SectionLayout};
use crate::model::{Document, Margins, PAGE_HEIGHT_MM, mm_to_px};
use crate::pager::{CONTINUATION_SPACING_PX, FIRST_PAGE_SPACING_PX, Page, SIGNATURE_TOP_MARGIN_PX};

use layout::{Canvas, PlacedImage, page_height_pt, page_width_pt};

/// Output settings that do not influence pagination.
#[derive(Clone, Debug)]
pub struct PdfOptions {
    /// Scales the sheet and everything on it.
    pub zoom: f32,
    /// Base directory for relative image paths.
    pub assets: Option<PathBuf>,
}

impl Default for PdfOptions {
    fn default() -> Self {
        PdfOptions {
            zoom: 1.0,
            assets: None,
        }
    }
}

/// Fixed parts of the letter, laid out once per render.
struct Chrome {
    header: Option<SectionLayout>,
    meta: SectionLayout,
    receiver: Option<SectionLayout>,
    signatures: Option<SectionLayout>,
    footer: Option<SectionLayout>,
}

impl Chrome {
    fn layout(doc: &Document, fonts: &FontSet, width: f32) -> Self {
        let vis = doc.visibility;
        Chrome {
            header: vis.header.then(|| sections::header(doc, fonts, width)),
            meta: sections::meta(doc, fonts, width),
            receiver: vis.receiver.then(|| sections::receiver(doc, fonts, width)),
            signatures: doc
                .has_signature_block()
                .then(|| sections::signatures(doc, fonts, width)),
            footer: vis.footer.then(|| sections::footer(doc, fonts, width)),
        }
    }

    fn all(&self) -> impl Iterator<Item = &SectionLayout> {
        self.header
            .iter()
            .chain(std::iter::once(&self.meta))
            .chain(&self.receiver)
            .chain(&self.signatures)
            .chain(&self.footer)
    }
}

fn collect_used_chars<'a>(
    layouts: impl Iterator<Item = &'a SectionLayout>,
    used: &mut HashMap<(bool, bool), HashSet<char>>,
) {
    for layout in layouts {
        for p in &layout.paragraphs {
            for chunk in p.lines.iter().flat_map(|l| &l.chunks) {
                used.entry((chunk.style.bold, chunk.style.italic))
                    .or_default()
                    .extend(chunk.text.chars());
            }
        }
    }
}

fn valid_zoom(zoom: f32) -> f32 {
    if zoom.is_finite() && zoom > 0.0 {
        zoom
    } else {
        1.0
    }
}

/// Render `pages` of `doc` to PDF bytes. `pages` must come from a pass over
/// the same document, fonts and margins.
pub fn render(
    doc: &Document,
    pages: &[Page],
    fonts: &FontSet,
    margins: &Margins,
    options: &PdfOptions,
) -> Result<Vec<u8>, Error> {
    let t0 = std::time::Instant::now();
    let zoom = valid_zoom(options.zoom);
    let mut pdf = Pdf::new();
    let mut next_id = 1i32;
    let mut alloc = || {
        let r = Ref::new(next_id);
        next_id += 1;
        r
    };

    let catalog_id = alloc();
    let pages_id = alloc();

    // Phase 1: lay out the fixed sections and every placed fragment
    let width = margins.content_width_px();
    let chrome = Chrome::layout(doc, fonts, width);
    let fragment_layouts: Vec<Vec<SectionLayout>> = pages
        .iter()
        .map(|page| {
            page.fragments
                .iter()
                .map(|f| sections::content_block(&f.block.block, fonts, width, doc.text_align))
                .collect()
        })
        .collect();
    let t_layout = t0.elapsed();

    // Phase 2: embed the faces that are actually drawn, regular always
    let mut used: HashMap<(bool, bool), HashSet<char>> = HashMap::new();
    used.entry((false, false)).or_default();
    collect_used_chars(chrome.all().chain(fragment_layouts.iter().flatten()), &mut used);
    let mut faces: Vec<(SpanStyle, EmbeddedFace)> = Vec::new();
    for (style, face) in fonts.faces() {
        let Some(chars) = used.get(&(style.bold, style.italic)) else {
            continue;
        };
        let pdf_name = format!("F{}", faces.len() + 1);
        faces.push((style, embed_face(&mut pdf, face, pdf_name, chars, &mut alloc)));
    }
    let t_fonts = t0.elapsed();

    // Phase 3: logos and signature images
    let mut placed: HashMap<String, PlacedImage> = HashMap::new();
    let mut image_xobjects: Vec<(String, Ref)> = Vec::new();
    let sources: Vec<&String> = chrome
        .all()
        .flat_map(|l| &l.images)
        .filter_map(|slot| slot.source.as_ref())
        .collect();
    for source in sources {
        if placed.contains_key(source) {
            continue;
        }
        let Some(path) = images::resolve_path(source, options.assets.as_deref()) else {
            log::warn!("Skipping image {source}: only local files are supported");
            continue;
        };
        let img = match images::load(&path) {
            Ok(img) => img,
            Err(e) => {
                log::warn!("Skipping image {source}: {e}");
                continue;
            }
        };
        let Some(xobj_ref) = images::embed(&mut pdf, &img, &mut alloc) else {
            continue;
        };
        let name = format!("Im{}", image_xobjects.len() + 1);
        image_xobjects.push((name.clone(), xobj_ref));
        placed.insert(
            source.clone(),
            PlacedImage {
                name,
                aspect: img.aspect(),
            },
        );
    }
    let t_images = t0.elapsed();

    // Phase 4: draw pages
    let left = mm_to_px(margins.left);
    let top = mm_to_px(margins.top);
    let footer_bottom = mm_to_px(PAGE_HEIGHT_MM) - mm_to_px(margins.bottom);
    let last_page = pages.len().saturating_sub(1);
    let mut all_contents = Vec::with_capacity(pages.len());
    for (page_num, (page, layouts)) in pages.iter().zip(&fragment_layouts).enumerate() {
        let mut canvas = Canvas::new(zoom, fonts, &faces, &placed);
        let mut y = top;
        if let Some(header) = &chrome.header {
            canvas.draw_section(header, left, y);
            y += header.height;
        }
        if page.index == 0 {
            canvas.draw_section(&chrome.meta, left, y);
            y += chrome.meta.height;
            if let Some(receiver) = &chrome.receiver {
                canvas.draw_section(receiver, left, y);
                y += receiver.height;
            }
            y += FIRST_PAGE_SPACING_PX;
        } else {
            y += CONTINUATION_SPACING_PX;
        }
        for (fragment, block) in page.fragments.iter().zip(layouts) {
            y += fragment.margin_top;
            canvas.draw_section(block, left, y);
            y += block.height + fragment.margin_bottom;
        }
        if page_num == last_page
            && let Some(signatures) = &chrome.signatures
        {
            y += SIGNATURE_TOP_MARGIN_PX;
            canvas.draw_section(signatures, left, y);
        }
        if let Some(footer) = &chrome.footer {
            canvas.draw_section(footer, left, footer_bottom - footer.height);
        }
        all_contents.push(canvas.into_content());
    }
    let t_draw = t0.elapsed();

    // Phase 5: assemble the document
    let n = all_contents.len();
    let page_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();
    let content_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();

    for (i, c) in all_contents.into_iter().enumerate() {
        let raw = c.finish();
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), 6);
        pdf.stream(content_ids[i], &compressed).filter(Filter::FlateDecode);
    }

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id)
        .kids(page_ids.iter().copied())
        .count(n as i32);

    let media_box = Rect::new(0.0, 0.0, page_width_pt() * zoom, page_height_pt() * zoom);
    for i in 0..n {
        let mut page = pdf.page(page_ids[i]);
        page.media_box(media_box)
            .parent(pages_id)
            .contents(content_ids[i]);
        let mut resources = page.resources();
        {
            let mut font_dict = resources.fonts();
            for (_, face) in &faces {
                font_dict.pair(Name(face.pdf_name.as_bytes()), face.font_ref);
            }
        }
        if !image_xobjects.is_empty() {
            let mut xobjects = resources.x_objects();
            for (name, xobj_ref) in &image_xobjects {
                xobjects.pair(Name(name.as_bytes()), *xobj_ref);
            }
        }
    }

    let t_assembly = t0.elapsed();
    log::info!(
        "Render phases: layout={:.1}ms, font_embed={:.1}ms, images={:.1}ms, draw={:.1}ms, assembly={:.1}ms ({} pages)",
        t_layout.as_secs_f64() * 1000.0,
        (t_fonts - t_layout).as_secs_f64() * 1000.0,
        (t_images - t_fonts).as_secs_f64() * 1000.0,
        (t_draw - t_images).as_secs_f64() * 1000.0,
        (t_assembly - t_draw).as_secs_f64() * 1000.0,
        n,
    );

    Ok(pdf.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::format_content;
    use crate::measure::{MeasureSurface, collect_blocks};
    use crate::normalize::normalize_with_today;
    use crate::pager::{PageBudget, Sections, paginate};
    use chrono::NaiveDate;
    use serde_json::json;

    fn render_json(v: serde_json::Value, options: &PdfOptions) -> (usize, Vec<u8>) {
        let doc = normalize_with_today(&v, NaiveDate::from_ymd_opt(2024, 5, 6).unwrap());
        let blocks = collect_blocks(&format_content(&doc.content));
        let margins = Margins::default();
        let mut surface = MeasureSurface::new(FontSet::builtin());
        let snap = surface.measure(&doc, &blocks, &margins);
        let budget = PageBudget::new(&snap, &margins, Sections::of(&doc));
        let pages = paginate(&blocks, &snap.blocks, &budget);
        let bytes = render(&doc, &pages, surface.fonts(), &margins, options).unwrap();
        (pages.len(), bytes)
    }

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack.windows(needle.len()).filter(|w| *w == needle).count()
    }

    #[test]
    fn one_page_object_per_page() {
        let content = "<p>Değerli üyemiz, toplantı gündemi ektedir.</p>".repeat(60);
        let (n, bytes) = render_json(
            json!({ "content": content, "signers": [{ "name": "A. Yılmaz", "title": "Başkan" }] }),
            &PdfOptions::default(),
        );
        assert!(n > 1);
        assert!(bytes.starts_with(b"%PDF-"));
        assert_eq!(count(&bytes, b"/Type /Page") - count(&bytes, b"/Type /Pages"), n);
    }

    #[test]
    fn zoom_scales_media_box() {
        let (_, plain) = render_json(json!({}), &PdfOptions::default());
        let (_, zoomed) = render_json(
            json!({}),
            &PdfOptions {
                zoom: 2.0,
                assets: None,
            },
        );
        assert_eq!(count(&plain, b"1190.5"), 0);
        assert_eq!(count(&zoomed, b"1190.5"), 1);
    }

    #[test]
    fn missing_images_are_skipped() {
        let (n, bytes) = render_json(
            json!({ "logoUrl": "/nonexistent/logo.png", "headerTitle": "T.C." }),
            &PdfOptions::default(),
        );
        assert_eq!(n, 1);
        assert_eq!(count(&bytes, b"/Subtype /Image"), 0);
    }
}
