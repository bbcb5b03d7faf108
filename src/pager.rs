//! Greedy page breaking over measured content blocks.
//!
//! Single pass, forward only, block granularity: a block is never split and
//! never moved back once placed. Oversized blocks get a page of their own and
//! overflow it rather than failing.

use serde::Serialize;

use crate::content::Block;
use crate::measure::{BlockMetrics, ContentBlock, Snapshot};
use crate::model::{Document, Margins, PAGE_HEIGHT_MM, mm_to_px};

/// Kept clear above the footer to absorb measurement drift and descenders.
pub const SAFETY_BUFFER_PX: f32 = 180.0;
/// Gap between the receiver and the first content block.
pub const FIRST_PAGE_SPACING_PX: f32 = 32.0;
/// Gap between the header and content on later pages.
pub const CONTINUATION_SPACING_PX: f32 = 20.0;
/// Space above the signature row.
pub const SIGNATURE_TOP_MARGIN_PX: f32 = 60.0;

/// One content block placed on a page, with its own margins.
#[derive(Clone, Debug, PartialEq)]
pub struct Fragment {
    pub block: ContentBlock,
    pub margin_top: f32,
    pub margin_bottom: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    pub index: usize,
    pub fragments: Vec<Fragment>,
}

impl Page {
    fn empty(index: usize) -> Self {
        Page {
            index,
            fragments: Vec::new(),
        }
    }

    pub fn block_indices(&self) -> Vec<usize> {
        self.fragments.iter().map(|f| f.block.index).collect()
    }
}

/// Which optional sections take part in page budgeting.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Sections {
    pub header: bool,
    pub receiver: bool,
    /// Signatures visible and at least one signer.
    pub signatures: bool,
}

impl Sections {
    pub fn of(doc: &Document) -> Self {
        Sections {
            header: doc.visibility.header,
            receiver: doc.visibility.receiver,
            signatures: doc.has_signature_block(),
        }
    }
}

/// Vertical budget of a page, derived from one snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PageBudget {
    pub usable: f32,
    pub first_offset: f32,
    pub continuation_offset: f32,
    pub signature: f32,
}

impl PageBudget {
    pub fn new(snapshot: &Snapshot, margins: &Margins, sections: Sections) -> Self {
        let page_px = mm_to_px(PAGE_HEIGHT_MM);
        let usable = page_px
            - mm_to_px(margins.top)
            - mm_to_px(margins.bottom)
            - snapshot.footer
            - SAFETY_BUFFER_PX;
        let header = if sections.header { snapshot.header } else { 0.0 };
        // meta is always reserved, whatever its row flags say
        let first_offset = header
            + snapshot.meta
            + if sections.receiver {
                snapshot.receiver
            } else {
                0.0
            }
            + FIRST_PAGE_SPACING_PX;
        let continuation_offset = header + CONTINUATION_SPACING_PX;
        let signature = if sections.signatures {
            snapshot.signature + SIGNATURE_TOP_MARGIN_PX
        } else {
            0.0
        };
        PageBudget {
            usable,
            first_offset,
            continuation_offset,
            signature,
        }
    }
}

/// Assign blocks to pages. `metrics[i]` measures `blocks[i]`.
///
/// Always returns at least one page.
pub fn paginate(blocks: &[ContentBlock], metrics: &[BlockMetrics], budget: &PageBudget) -> Vec<Page> {
    debug_assert_eq!(blocks.len(), metrics.len());
    let mut pages: Vec<Page> = Vec::new();
    let mut current = Page::empty(0);
    let mut used = budget.first_offset;

    for (block, m) in blocks.iter().zip(metrics) {
        let h = m.outer_height();
        if used + h > budget.usable && !current.fragments.is_empty() {
            log::debug!(
                "page {} closed at {:.1}/{:.1}px before block {}",
                current.index,
                used,
                budget.usable,
                block.index
            );
            let next = Page::empty(current.index + 1);
            pages.push(std::mem::replace(&mut current, next));
            used = budget.continuation_offset;
        }
        current.fragments.push(Fragment {
            block: block.clone(),
            margin_top: m.margin_top,
            margin_bottom: m.margin_bottom,
        });
        used += h;
    }

    if budget.signature > 0.0
        && used + budget.signature > budget.usable
        && !current.fragments.is_empty()
    {
        log::debug!(
            "signature block ({:.1}px) does not fit under {:.1}/{:.1}px, starting page {}",
            budget.signature,
            used,
            budget.usable,
            current.index + 1
        );
        let next = Page::empty(current.index + 1);
        pages.push(std::mem::replace(&mut current, next));
    }
    pages.push(current);
    pages
}

/// Short description of a block for logs and page dumps.
pub fn describe(block: &Block) -> String {
    use crate::content::{BlockRole, inlines_text};
    match block {
        Block::Table(t) => format!("table {}x{}", t.rows.len(), t.column_count()),
        Block::Text(tb) => {
            let kind = match &tb.role {
                BlockRole::Paragraph => "p".to_string(),
                BlockRole::Heading(level) => format!("h{level}"),
                BlockRole::ListItem(marker) => format!("li {marker}"),
                BlockRole::Division => "div".to_string(),
                BlockRole::Quote => "blockquote".to_string(),
                BlockRole::Group => "group".to_string(),
            };
            let text: String = inlines_text(&tb.inlines)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            let excerpt: String = text.chars().take(40).collect();
            if excerpt.len() < text.len() {
                format!("{kind}: {excerpt}…")
            } else {
                format!("{kind}: {excerpt}")
            }
        }
    }
}
