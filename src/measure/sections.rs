//! Box layout of every part of a letter, in px relative to the part's top-left.
//!
//! The same functions feed the measurement pass and the PDF renderer, so the
//! heights the pager works with are the heights that get drawn.

use crate::content::{Block, BlockRole, Inline, Span, SpanStyle, TableBlock, TextBlock};
use crate::fonts::FontSet;
use crate::model::{Document, TextAlign, mm_to_px};

use super::wrap::{TextLine, build_lines};

pub(crate) const BODY_FONT_PX: f32 = 16.0;
pub(crate) const BODY_LINE_HEIGHT: f32 = 1.5;
const HEADER_TITLE_PX: f32 = 17.33;
const HEADER_ORG_PX: f32 = 16.0;
const FOOTER_FONT_PX: f32 = 10.67;
const FOOTER_LINE_HEIGHT: f32 = 1.35;
const TABLE_FONT_PX: f32 = 14.67;
const TABLE_LINE_HEIGHT: f32 = 1.4;
const TABLE_CELL_PADDING: f32 = 4.0;
const LIST_INDENT: f32 = 24.0;
const QUOTE_INDENT: f32 = 24.0;
pub(crate) const LOGO_HEIGHT_MM: f32 = 22.0;
const LOGO_MAX_WIDTH_MM: f32 = 35.0;
const META_LABEL_WIDTH: f32 = 88.0;
const RULE_THICKNESS: f32 = 1.0;

/// A run of wrapped lines in one font size.
pub struct Paragraph {
    pub lines: Vec<TextLine>,
    pub font_size: f32,
    pub line_height: f32,
    pub align: TextAlign,
    pub x: f32,
    pub y: f32,
    pub width: f32,
}

impl Paragraph {
    pub fn height(&self) -> f32 {
        self.lines.len() as f32 * self.line_height
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SlotAlign {
    Left,
    Center,
    Right,
}

/// Reserved box for an image whose width is only known once it is decoded.
/// The image is scaled to `height`, clamped to `max_width`, and bottom-aligned.
pub struct ImageSlot {
    pub source: Option<String>,
    pub x: f32,
    pub y: f32,
    pub max_width: f32,
    pub height: f32,
    pub align: SlotAlign,
    pub image_height: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

/// Filled rectangle used for borders and separators.
pub struct Rule {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Default)]
pub struct SectionLayout {
    pub height: f32,
    pub paragraphs: Vec<Paragraph>,
    pub images: Vec<ImageSlot>,
    pub rules: Vec<Rule>,
}

fn plain(text: &str) -> Vec<Inline> {
    let mut out = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            out.push(Inline::Break);
        }
        out.push(Inline::Text(Span {
            text: line.to_string(),
            style: SpanStyle::default(),
        }));
    }
    out
}

fn bold() -> SpanStyle {
    SpanStyle {
        bold: true,
        ..SpanStyle::default()
    }
}

struct ParaSpec {
    font_size: f32,
    line_height: f32,
    align: TextAlign,
    style: SpanStyle,
    uppercase: bool,
}

fn paragraph(
    inlines: &[Inline],
    fonts: &FontSet,
    spec: ParaSpec,
    x: f32,
    y: f32,
    width: f32,
) -> Paragraph {
    Paragraph {
        lines: build_lines(inlines, fonts, spec.font_size, width, spec.style, spec.uppercase),
        font_size: spec.font_size,
        line_height: spec.font_size * spec.line_height,
        align: spec.align,
        x,
        y,
        width,
    }
}

fn body_spec(align: TextAlign) -> ParaSpec {
    ParaSpec {
        font_size: BODY_FONT_PX,
        line_height: BODY_LINE_HEIGHT,
        align,
        style: SpanStyle::default(),
        uppercase: false,
    }
}

/// Logos left and right, title and organisation name centered between them,
/// a rule underneath.
pub fn header(doc: &Document, fonts: &FontSet, width: f32) -> SectionLayout {
    let mut out = SectionLayout::default();
    let has_text = !doc.header_title.is_empty() || !doc.header_org_name.is_empty();
    if !has_text && !doc.has_logo() {
        return out;
    }

    let logo_h = mm_to_px(LOGO_HEIGHT_MM);
    let logo_w = mm_to_px(LOGO_MAX_WIDTH_MM).min(width / 4.0);
    let side = if doc.has_logo() { logo_w + 8.0 } else { 0.0 };
    let text_w = (width - 2.0 * side).max(width / 2.0);
    let text_x = (width - text_w) / 2.0;

    let mut y = 0.0;
    if !doc.header_title.is_empty() {
        let p = paragraph(
            &plain(&doc.header_title),
            fonts,
            ParaSpec {
                font_size: HEADER_TITLE_PX,
                line_height: 1.3,
                align: TextAlign::Center,
                style: bold(),
                uppercase: false,
            },
            text_x,
            y,
            text_w,
        );
        y += p.height();
        out.paragraphs.push(p);
    }
    if !doc.header_org_name.is_empty() {
        let p = paragraph(
            &plain(&doc.header_org_name),
            fonts,
            ParaSpec {
                font_size: HEADER_ORG_PX,
                line_height: 1.3,
                align: TextAlign::Center,
                style: bold(),
                uppercase: false,
            },
            text_x,
            y,
            text_w,
        );
        y += p.height();
        out.paragraphs.push(p);
    }

    let mut band = y;
    if doc.has_logo() {
        band = band.max(logo_h);
        // vertically center the text block against the logos
        let shift = (band - y) / 2.0;
        for p in &mut out.paragraphs {
            p.y += shift;
        }
        for (source, x, align) in [
            (&doc.logo_url, 0.0, SlotAlign::Left),
            (&doc.right_logo_url, width - logo_w, SlotAlign::Right),
        ] {
            if let Some(src) = source {
                out.images.push(ImageSlot {
                    source: Some(src.clone()),
                    x,
                    y: 0.0,
                    max_width: logo_w,
                    height: logo_h,
                    align,
                    image_height: logo_h,
                    offset_x: 0.0,
                    offset_y: 0.0,
                });
            }
        }
    }

    let rule_y = band + 8.0;
    out.rules.push(Rule {
        x: 0.0,
        y: rule_y,
        width,
        height: RULE_THICKNESS,
    });
    out.height = rule_y + RULE_THICKNESS + 12.0;
    out
}

/// Document number and date on one row, then subject and decision number.
/// Rows whose flag is off or whose value is empty are left out.
pub fn meta(doc: &Document, fonts: &FontSet, width: f32) -> SectionLayout {
    let mut out = SectionLayout::default();
    let vis = doc.visibility;
    let label_spec = || ParaSpec {
        style: bold(),
        ..body_spec(TextAlign::Left)
    };
    let value_w = (width - META_LABEL_WIDTH).max(1.0);

    let mut y = 0.0;
    let row = |out: &mut SectionLayout, label: &str, value: &str, y: &mut f32| {
        let l = paragraph(&plain(label), fonts, label_spec(), 0.0, *y, META_LABEL_WIDTH);
        let v = paragraph(&plain(value), fonts, body_spec(TextAlign::Left), META_LABEL_WIDTH, *y, value_w);
        *y += l.height().max(v.height());
        out.paragraphs.push(l);
        out.paragraphs.push(v);
    };

    let show_number = vis.document_number && !doc.document_number.is_empty();
    if show_number || vis.date {
        if vis.date {
            let date = paragraph(
                &plain(&doc.reference_date),
                fonts,
                body_spec(TextAlign::Right),
                0.0,
                y,
                width,
            );
            if !show_number {
                y += date.height();
            }
            out.paragraphs.push(date);
        }
        if show_number {
            row(&mut out, "Sayı :", &doc.document_number, &mut y);
        }
    }
    if vis.subject && !doc.subject.is_empty() {
        row(&mut out, "Konu :", &doc.subject, &mut y);
    }
    if vis.decision_number && !doc.decision_number.is_empty() {
        row(&mut out, "Karar No :", &doc.decision_number, &mut y);
    }

    if y > 0.0 {
        out.height = y + 16.0;
    }
    out
}

pub fn receiver(doc: &Document, fonts: &FontSet, width: f32) -> SectionLayout {
    let mut out = SectionLayout::default();
    if doc.receiver.trim().is_empty() {
        return out;
    }
    let p = paragraph(
        &plain(doc.receiver.trim()),
        fonts,
        ParaSpec {
            style: bold(),
            uppercase: true,
            ..body_spec(doc.receiver_align)
        },
        0.0,
        8.0,
        width,
    );
    out.height = 8.0 + p.height() + 16.0;
    out.paragraphs.push(p);
    out
}

/// One column per signer. Every column reserves the tallest signature so
/// names line up; smaller images sit on the same baseline.
pub fn signatures(doc: &Document, fonts: &FontSet, width: f32) -> SectionLayout {
    let mut out = SectionLayout::default();
    if doc.signers.is_empty() {
        return out;
    }
    let slot_h = doc
        .signers
        .iter()
        .map(|s| mm_to_px(s.signature_size_mm))
        .fold(0.0f32, f32::max);
    let col_w = width / doc.signers.len() as f32;

    let mut height = 0.0f32;
    for (i, signer) in doc.signers.iter().enumerate() {
        let x = col_w * i as f32;
        out.images.push(ImageSlot {
            source: signer.signature_url.clone(),
            x,
            y: 0.0,
            max_width: col_w,
            height: slot_h,
            align: SlotAlign::Center,
            image_height: mm_to_px(signer.signature_size_mm),
            offset_x: mm_to_px(signer.signature_offset_x_mm),
            offset_y: mm_to_px(signer.signature_offset_y_mm),
        });
        let mut y = slot_h + 4.0;
        let name = paragraph(
            &plain(&signer.name),
            fonts,
            ParaSpec {
                style: bold(),
                ..body_spec(TextAlign::Center)
            },
            x,
            y,
            col_w,
        );
        y += name.height();
        let title = paragraph(&plain(&signer.title), fonts, body_spec(TextAlign::Center), x, y, col_w);
        y += title.height();
        out.paragraphs.push(name);
        out.paragraphs.push(title);
        height = height.max(y);
    }
    out.height = height;
    out
}

/// Rule on top, organisation name, address and contact line, centered.
pub fn footer(doc: &Document, fonts: &FontSet, width: f32) -> SectionLayout {
    let mut out = SectionLayout::default();
    out.rules.push(Rule {
        x: 0.0,
        y: 0.0,
        width,
        height: RULE_THICKNESS,
    });
    let small = |style: SpanStyle| ParaSpec {
        font_size: FOOTER_FONT_PX,
        line_height: FOOTER_LINE_HEIGHT,
        align: TextAlign::Center,
        style,
        uppercase: false,
    };

    let contact = match (doc.footer_contact.is_empty(), doc.footer_phone.is_empty()) {
        (false, false) => format!("{} | Tel: {}", doc.footer_contact, doc.footer_phone),
        (false, true) => doc.footer_contact.clone(),
        (true, false) => format!("Tel: {}", doc.footer_phone),
        (true, true) => String::new(),
    };

    let mut y = RULE_THICKNESS + 8.0;
    for (text, style) in [
        (&doc.footer_org_name, bold()),
        (&doc.footer_address, SpanStyle::default()),
        (&contact, SpanStyle::default()),
    ] {
        if text.is_empty() {
            continue;
        }
        let p = paragraph(&plain(text), fonts, small(style), 0.0, y, width);
        y += p.height();
        out.paragraphs.push(p);
    }
    out.height = y;
    out
}

/// Top and bottom margin of a content block.
pub fn block_margins(block: &Block) -> (f32, f32) {
    match block {
        Block::Table(_) => (8.0, 12.0),
        Block::Text(tb) => match tb.role {
            BlockRole::Heading(_) => (16.0, 8.0),
            BlockRole::ListItem(_) => (0.0, 4.0),
            BlockRole::Paragraph | BlockRole::Division | BlockRole::Quote | BlockRole::Group => {
                (0.0, 12.0)
            }
        },
    }
}

fn heading_size(level: u8) -> f32 {
    match level {
        1 => 24.0,
        2 => 20.0,
        3 => 18.0,
        _ => BODY_FONT_PX,
    }
}

pub fn content_block(
    block: &Block,
    fonts: &FontSet,
    width: f32,
    body_align: TextAlign,
) -> SectionLayout {
    match block {
        Block::Text(tb) => text_block(tb, fonts, width, body_align),
        Block::Table(t) => table(t, fonts, width, body_align),
    }
}

fn text_block(tb: &TextBlock, fonts: &FontSet, width: f32, body_align: TextAlign) -> SectionLayout {
    let mut out = SectionLayout::default();
    let align = tb.align.unwrap_or(body_align);
    let spec = match tb.role {
        BlockRole::Heading(level) => ParaSpec {
            font_size: heading_size(level),
            line_height: 1.3,
            style: bold(),
            ..body_spec(align)
        },
        _ => body_spec(align),
    };
    let (x, w) = match &tb.role {
        BlockRole::ListItem(marker) => {
            out.paragraphs.push(paragraph(
                &plain(marker),
                fonts,
                body_spec(TextAlign::Left),
                0.0,
                0.0,
                LIST_INDENT,
            ));
            (LIST_INDENT, width - LIST_INDENT)
        }
        BlockRole::Quote => (QUOTE_INDENT, width - QUOTE_INDENT),
        _ => (0.0, width),
    };
    let p = paragraph(&tb.inlines, fonts, spec, x, 0.0, w.max(1.0));
    out.height = p.height();
    out.paragraphs.push(p);
    if let Some(marker) = out.paragraphs.first()
        && out.paragraphs.len() > 1
    {
        out.height = out.height.max(marker.height());
    }
    out
}

/// Equal-width columns with a grid of 1px borders.
fn table(t: &TableBlock, fonts: &FontSet, width: f32, body_align: TextAlign) -> SectionLayout {
    let mut out = SectionLayout::default();
    let cols = t.column_count();
    if cols == 0 {
        return out;
    }
    let col_w = width / cols as f32;
    let inner_w = (col_w - 2.0 * TABLE_CELL_PADDING).max(1.0);
    let cell_align = match body_align {
        TextAlign::Justify => TextAlign::Left,
        other => other,
    };

    let mut y = 0.0f32;
    for row in &t.rows {
        out.rules.push(Rule {
            x: 0.0,
            y,
            width,
            height: RULE_THICKNESS,
        });
        let mut row_h = 0.0f32;
        for (ci, cell) in row.iter().enumerate() {
            let p = paragraph(
                cell,
                fonts,
                ParaSpec {
                    font_size: TABLE_FONT_PX,
                    line_height: TABLE_LINE_HEIGHT,
                    ..body_spec(cell_align)
                },
                ci as f32 * col_w + TABLE_CELL_PADDING,
                y + RULE_THICKNESS + TABLE_CELL_PADDING,
                inner_w,
            );
            row_h = row_h.max(p.height());
            out.paragraphs.push(p);
        }
        let min_row = TABLE_FONT_PX * TABLE_LINE_HEIGHT;
        y += RULE_THICKNESS + 2.0 * TABLE_CELL_PADDING + row_h.max(min_row);
    }
    out.rules.push(Rule {
        x: 0.0,
        y,
        width,
        height: RULE_THICKNESS,
    });
    for ci in 0..=cols {
        let x = (ci as f32 * col_w).min(width - RULE_THICKNESS);
        out.rules.push(Rule {
            x,
            y: 0.0,
            width: RULE_THICKNESS,
            height: y + RULE_THICKNESS,
        });
    }
    out.height = y + RULE_THICKNESS;
    out
}
