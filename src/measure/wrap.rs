use crate::content::{Inline, SpanStyle, is_break_space};
use crate::fonts::FontSet;

pub struct WordChunk {
    pub text: String,
    pub style: SpanStyle,
    pub x_offset: f32, // x relative to line start
    pub width: f32,
    /// Separated from the previous chunk by a space; justification widens
    /// only these gaps.
    pub space_before: bool,
}

pub struct TextLine {
    pub chunks: Vec<WordChunk>,
    pub total_width: f32,
    pub gaps: usize,
    /// Last line of the paragraph or ended by a hard break; never justified.
    pub ends_paragraph: bool,
}

fn finish_line(chunks: &mut Vec<WordChunk>, ends_paragraph: bool) -> TextLine {
    let total_width = chunks.last().map(|c| c.x_offset + c.width).unwrap_or(0.0);
    let gaps = chunks.iter().filter(|c| c.space_before).count();
    TextLine {
        chunks: std::mem::take(chunks),
        total_width,
        gaps,
        ends_paragraph,
    }
}

/// Greedy line breaking of inline content at whitespace.
///
/// No space is inserted between adjacent spans unless one of them carries the
/// whitespace ("<b>kalın</b>, devam" stays "kalın," not "kalın ,"). A word
/// wider than `max_width` is placed alone and overflows. Hard breaks always
/// end the line, so two in a row leave an empty line between them.
pub fn build_lines(
    inlines: &[Inline],
    fonts: &FontSet,
    font_size: f32,
    max_width: f32,
    base_style: SpanStyle,
    uppercase: bool,
) -> Vec<TextLine> {
    let mut lines: Vec<TextLine> = Vec::new();
    let mut current: Vec<WordChunk> = Vec::new();
    let mut current_x: f32 = 0.0;
    let mut prev_ended_with_ws = false;
    let mut prev_space_w: f32 = 0.0;

    for inline in inlines {
        let span = match inline {
            Inline::Break => {
                lines.push(finish_line(&mut current, true));
                current_x = 0.0;
                prev_ended_with_ws = false;
                continue;
            }
            Inline::Text(span) => span,
        };

        let style = SpanStyle {
            bold: span.style.bold || base_style.bold,
            italic: span.style.italic || base_style.italic,
            underline: span.style.underline || base_style.underline,
        };
        let face = fonts.face(style);
        let space_w = face.space_width(font_size);
        let text = if uppercase {
            span.text.to_uppercase()
        } else {
            span.text.clone()
        };
        let starts_with_ws = text.starts_with(is_break_space);

        for (i, word) in text.split(is_break_space).filter(|w| !w.is_empty()).enumerate() {
            let ww = face.word_width(word, font_size);

            let need_space =
                !current.is_empty() && (i > 0 || starts_with_ws || prev_ended_with_ws);
            // the space belongs to whichever span carried it
            let effective_space_w = if i > 0 || starts_with_ws {
                space_w
            } else {
                prev_space_w
            };
            let proposed_x = if need_space {
                current_x + effective_space_w
            } else {
                current_x
            };

            let mut space_before = need_space;
            if !current.is_empty() && proposed_x + ww > max_width {
                lines.push(finish_line(&mut current, false));
                current_x = 0.0;
                space_before = false;
            } else {
                current_x = proposed_x;
            }

            current.push(WordChunk {
                text: word.to_string(),
                style,
                x_offset: current_x,
                width: ww,
                space_before,
            });
            current_x += ww;
        }

        prev_ended_with_ws = text.ends_with(is_break_space);
        prev_space_w = space_w;
    }

    if !current.is_empty() {
        lines.push(finish_line(&mut current, true));
    }
    lines
}
