//! Measurement engine: lays a letter out off-screen at the real content width
//! and records the pixel height of every part the pager needs.

pub mod sections;
pub mod wrap;

use serde::Serialize;

use crate::content::{Block, BlockRole, Inline, Node, TextBlock, inlines_blank};
use crate::fonts::FontSet;
use crate::model::{Document, Margins};

use sections::SectionLayout;

/// Footers measured smaller than this (collapsed or hidden) still reserve it.
pub const FOOTER_MIN_HEIGHT_PX: f32 = 80.0;

/// One measurable unit of body content.
#[derive(Clone, Debug, PartialEq)]
pub struct ContentBlock {
    pub index: usize,
    pub block: Block,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct BlockMetrics {
    pub height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
}

impl BlockMetrics {
    pub fn outer_height(&self) -> f32 {
        self.height + self.margin_top + self.margin_bottom
    }
}

/// Heights from one measurement pass, in px.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub header: f32,
    pub footer: f32,
    pub meta: f32,
    pub receiver: f32,
    pub signature: f32,
    pub blocks: Vec<BlockMetrics>,
}

/// Turn formatted nodes into a flat list of content blocks.
///
/// Line breaks and consecutive inline nodes accumulate into a synthetic
/// [`BlockRole::Group`] wrapper; block elements flush the wrapper and stand
/// alone. Wrappers holding only whitespace and breaks are dropped.
pub fn collect_blocks(nodes: &[Node]) -> Vec<ContentBlock> {
    let mut blocks: Vec<Block> = Vec::new();
    let mut pending: Vec<Inline> = Vec::new();

    let flush = |pending: &mut Vec<Inline>, blocks: &mut Vec<Block>| {
        if !pending.is_empty() && !inlines_blank(pending) {
            blocks.push(Block::Text(TextBlock {
                role: BlockRole::Group,
                align: None,
                inlines: std::mem::take(pending),
            }));
        }
        pending.clear();
    };

    for node in nodes {
        match node {
            Node::Inline(inline) => pending.push(inline.clone()),
            Node::Block(block) => {
                flush(&mut pending, &mut blocks);
                blocks.push(block.clone());
            }
        }
    }
    flush(&mut pending, &mut blocks);

    blocks
        .into_iter()
        .enumerate()
        .map(|(index, block)| ContentBlock { index, block })
        .collect()
}

/// Off-screen layout surface. It owns the fonts used for shaping and a
/// scratch arena that every pass clears and rebuilds.
pub struct MeasureSurface {
    fonts: FontSet,
    width: f32,
    scratch: Vec<SectionLayout>,
}

impl MeasureSurface {
    pub fn new(fonts: FontSet) -> Self {
        Self {
            fonts,
            width: 0.0,
            scratch: Vec::new(),
        }
    }

    pub fn fonts(&self) -> &FontSet {
        &self.fonts
    }

    /// Content width of the last pass, px.
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Lay out every part of `doc` at the content width given by `margins`
    /// and report heights. Zoom never reaches this point.
    pub fn measure(&mut self, doc: &Document, blocks: &[ContentBlock], margins: &Margins) -> Snapshot {
        self.scratch.clear();
        self.width = margins.content_width_px();
        let (fonts, width) = (&self.fonts, self.width);

        let header = if doc.visibility.header {
            sections::header(doc, fonts, width).height
        } else {
            0.0
        };
        let footer = if doc.visibility.footer {
            sections::footer(doc, fonts, width).height
        } else {
            0.0
        };
        let receiver = if doc.visibility.receiver {
            sections::receiver(doc, fonts, width).height
        } else {
            0.0
        };
        let meta = sections::meta(doc, fonts, width).height;
        let signature = if doc.visibility.signatures {
            sections::signatures(doc, fonts, width).height
        } else {
            0.0
        };

        let mut metrics = Vec::with_capacity(blocks.len());
        for cb in blocks {
            let layout = sections::content_block(&cb.block, fonts, width, doc.text_align);
            let (margin_top, margin_bottom) = sections::block_margins(&cb.block);
            metrics.push(BlockMetrics {
                height: layout.height,
                margin_top,
                margin_bottom,
            });
            self.scratch.push(layout);
        }

        log::debug!(
            "measure: width={:.1}px header={:.1} footer={:.1} meta={:.1} receiver={:.1} signature={:.1} blocks={}",
            width,
            header,
            footer,
            meta,
            receiver,
            signature,
            metrics.len(),
        );

        Snapshot {
            header,
            footer: footer.max(FOOTER_MIN_HEIGHT_PX),
            meta,
            receiver,
            signature,
            blocks: metrics,
        }
    }

    /// Layouts of the content blocks from the last pass.
    pub fn scratch(&self) -> &[SectionLayout] {
        &self.scratch
    }
}
