use std::collections::HashMap;

use pdf_writer::{Content, Name, Str};

use crate::content::SpanStyle;
use crate::fonts::{EmbeddedFace, FontSet};
use crate::measure::sections::{ImageSlot, Paragraph, SectionLayout, SlotAlign};
use crate::model::{PAGE_HEIGHT_MM, PAGE_WIDTH_MM, PT_PER_PX, TextAlign, mm_to_px};

pub(super) fn page_width_pt() -> f32 {
    mm_to_px(PAGE_WIDTH_MM) * PT_PER_PX
}

pub(super) fn page_height_pt() -> f32 {
    mm_to_px(PAGE_HEIGHT_MM) * PT_PER_PX
}

/// An image XObject registered in the document.
pub(super) struct PlacedImage {
    pub(super) name: String,
    pub(super) aspect: f32,
}

/// One page's content stream. Callers position sections in px from the
/// page's top-left corner; conversion to PDF points happens here.
pub(super) struct Canvas<'a> {
    content: Content,
    fonts: &'a FontSet,
    faces: &'a [(SpanStyle, EmbeddedFace)],
    images: &'a HashMap<String, PlacedImage>,
}

impl<'a> Canvas<'a> {
    pub(super) fn new(
        zoom: f32,
        fonts: &'a FontSet,
        faces: &'a [(SpanStyle, EmbeddedFace)],
        images: &'a HashMap<String, PlacedImage>,
    ) -> Self {
        let mut content = Content::new();
        if zoom != 1.0 {
            content.transform([zoom, 0.0, 0.0, zoom, 0.0, 0.0]);
        }
        // anything overflowing the sheet is cut at its edge
        content.rect(0.0, 0.0, page_width_pt(), page_height_pt());
        content.clip_nonzero();
        content.end_path();
        content.set_fill_gray(0.0);
        Canvas {
            content,
            fonts,
            faces,
            images,
        }
    }

    pub(super) fn into_content(self) -> Content {
        self.content
    }

    fn y_pt(&self, px_from_top: f32) -> f32 {
        page_height_pt() - px_from_top * PT_PER_PX
    }

    /// Embedded face for `style`, falling back to the first (regular) one.
    fn face(&self, style: SpanStyle) -> Option<&'a EmbeddedFace> {
        let faces = self.faces;
        faces
            .iter()
            .find(|(s, _)| s.bold == style.bold && s.italic == style.italic)
            .or_else(|| faces.first())
            .map(|(_, f)| f)
    }

    pub(super) fn draw_section(&mut self, layout: &SectionLayout, left: f32, top: f32) {
        for rule in &layout.rules {
            let x = (left + rule.x) * PT_PER_PX;
            let bottom = self.y_pt(top + rule.y + rule.height);
            self.content
                .rect(x, bottom, rule.width * PT_PER_PX, rule.height * PT_PER_PX)
                .fill_nonzero();
        }
        for slot in &layout.images {
            self.draw_image(slot, left, top);
        }
        for p in &layout.paragraphs {
            self.draw_paragraph(p, left, top);
        }
    }

    fn draw_image(&mut self, slot: &ImageSlot, left: f32, top: f32) {
        let Some(placed) = slot.source.as_ref().and_then(|s| self.images.get(s)) else {
            return;
        };
        let mut h = slot.image_height;
        if h <= 0.0 {
            return;
        }
        let mut w = h * placed.aspect;
        if w > slot.max_width && placed.aspect > 0.0 {
            w = slot.max_width;
            h = w / placed.aspect;
        }
        let x = left
            + slot.x
            + slot.offset_x
            + match slot.align {
                SlotAlign::Left => 0.0,
                SlotAlign::Center => (slot.max_width - w) / 2.0,
                SlotAlign::Right => slot.max_width - w,
            };
        let bottom = top + slot.y + slot.height + slot.offset_y;
        let y = self.y_pt(bottom);
        self.content.save_state();
        self.content
            .transform([w * PT_PER_PX, 0.0, 0.0, h * PT_PER_PX, x * PT_PER_PX, y]);
        self.content.x_object(Name(placed.name.as_bytes()));
        self.content.restore_state();
    }

    fn draw_paragraph(&mut self, p: &Paragraph, left: f32, top: f32) {
        let baseline = self.fonts.regular().baseline_offset(p.font_size, p.line_height);
        let size_pt = p.font_size * PT_PER_PX;
        let x0 = left + p.x;
        let mut cur_font: Option<&str> = None;

        for (line_num, line) in p.lines.iter().enumerate() {
            if line.chunks.iter().all(|c| c.text.is_empty()) {
                continue;
            }
            let y = self.y_pt(top + p.y + line_num as f32 * p.line_height + baseline);

            let is_justified =
                p.align == TextAlign::Justify && !line.ends_paragraph && line.gaps > 0;
            let line_start_x = match p.align {
                TextAlign::Center => x0 + (p.width - line.total_width) / 2.0,
                TextAlign::Right => x0 + p.width - line.total_width,
                TextAlign::Left | TextAlign::Justify => x0,
            };
            let extra_per_gap = if is_justified {
                (p.width - line.total_width).max(0.0) / line.gaps as f32
            } else {
                0.0
            };

            let mut decorations: Vec<(f32, f32, f32, f32)> = Vec::new();
            self.content.begin_text();
            let mut td_x = 0.0_f32;
            let mut td_y = 0.0_f32;
            let mut gaps_so_far = 0usize;
            for chunk in &line.chunks {
                if chunk.space_before {
                    gaps_so_far += 1;
                }
                if chunk.text.is_empty() {
                    continue;
                }
                let x = (line_start_x + chunk.x_offset + gaps_so_far as f32 * extra_per_gap) * PT_PER_PX;
                let Some(face) = self.face(chunk.style) else {
                    continue;
                };
                if cur_font != Some(face.pdf_name.as_str()) {
                    self.content.set_font(Name(face.pdf_name.as_bytes()), size_pt);
                    cur_font = Some(face.pdf_name.as_str());
                }
                self.content.next_line(x - td_x, y - td_y);
                td_x = x;
                td_y = y;
                self.content.show(Str(&face.encode(&chunk.text)));

                if chunk.style.underline {
                    let thick = (size_pt * 0.05).max(0.5);
                    let ul_y = y - size_pt * 0.12;
                    decorations.push((x, ul_y - thick, chunk.width * PT_PER_PX, thick));
                }
            }
            self.content.end_text();

            for (dx, dy, dw, dh) in decorations {
                self.content.rect(dx, dy, dw, dh).fill_nonzero();
            }
        }
    }
}
