//! The preview component: props in, committed page list out.
//!
//! Prop changes never paginate directly. They schedule a pass on the
//! [`Debouncer`]; the caller drives time through [`A4Preview::poll`]. A pass
//! normalizes and formats (both memoized), measures on the mounted
//! [`MeasureSurface`], runs the pager and swaps the result in whole. Without a
//! surface the pass does nothing and the previous pages stay.

use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use crate::content::{Node, format_content};
use crate::debounce::Debouncer;
use crate::error::Error;
use crate::fonts::FontSet;
use crate::measure::{ContentBlock, MeasureSurface, Snapshot, collect_blocks};
use crate::model::{Document, Margins};
use crate::normalize::normalize;
use crate::pager::{Page, PageBudget, Sections, describe, paginate};
use crate::pdf::{self, PdfOptions};

/// Single-entry memo keyed on structural equality of the input.
struct Memo<K, V> {
    slot: Option<(K, V)>,
}

impl<K: PartialEq + Clone, V> Memo<K, V> {
    fn new() -> Self {
        Memo { slot: None }
    }

    fn get_or_compute(&mut self, key: &K, compute: impl FnOnce(&K) -> V) -> &V {
        if !matches!(&self.slot, Some((k, _)) if k == key) {
            self.slot = None;
        }
        let (_, v) = self.slot.get_or_insert_with(|| (key.clone(), compute(key)));
        v
    }
}

/// What asked for the pending pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    Mount,
    Document,
    Margins,
}

/// Result of one layout pass, replaced as a unit.
#[derive(Clone, Debug)]
pub struct PageList {
    pub pages: Vec<Page>,
    pub blocks: Vec<ContentBlock>,
    pub snapshot: Snapshot,
    /// `None` until the first pass has run.
    pub budget: Option<PageBudget>,
    pub document: Option<Document>,
    pub margins: Margins,
}

impl PageList {
    fn initial(margins: Margins) -> Self {
        PageList {
            pages: vec![Page {
                index: 0,
                fragments: Vec::new(),
            }],
            blocks: Vec::new(),
            snapshot: Snapshot::default(),
            budget: None,
            document: None,
            margins,
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Block indices per page.
    pub fn partition(&self) -> Vec<Vec<usize>> {
        self.pages.iter().map(Page::block_indices).collect()
    }

    /// Serializable view for page dumps.
    pub fn summary(&self) -> LayoutSummary {
        let signatures = self
            .document
            .as_ref()
            .is_some_and(Document::has_signature_block);
        let last = self.pages.len().saturating_sub(1);
        let pages = self
            .pages
            .iter()
            .enumerate()
            .map(|(i, page)| PageSummary {
                index: page.index,
                signatures: signatures && i == last,
                blocks: page
                    .fragments
                    .iter()
                    .map(|f| BlockSummary {
                        index: f.block.index,
                        description: describe(&f.block.block),
                        height: self
                            .snapshot
                            .blocks
                            .get(f.block.index)
                            .map_or(0.0, |m| m.height),
                        margin_top: f.margin_top,
                        margin_bottom: f.margin_bottom,
                    })
                    .collect(),
            })
            .collect();
        LayoutSummary {
            margins: self.margins,
            budget: self.budget,
            sections: SectionHeights {
                header: self.snapshot.header,
                footer: self.snapshot.footer,
                meta: self.snapshot.meta,
                receiver: self.snapshot.receiver,
                signature: self.snapshot.signature,
            },
            pages,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LayoutSummary {
    pub margins: Margins,
    pub budget: Option<PageBudget>,
    pub sections: SectionHeights,
    pub pages: Vec<PageSummary>,
}

#[derive(Debug, Serialize)]
pub struct SectionHeights {
    pub header: f32,
    pub footer: f32,
    pub meta: f32,
    pub receiver: f32,
    pub signature: f32,
}

#[derive(Debug, Serialize)]
pub struct PageSummary {
    pub index: usize,
    /// Whether the signature row is drawn on this page.
    pub signatures: bool,
    pub blocks: Vec<BlockSummary>,
}

#[derive(Debug, Serialize)]
pub struct BlockSummary {
    pub index: usize,
    pub description: String,
    pub height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
}

pub struct A4Preview {
    document: Value,
    zoom: f32,
    margins: Margins,
    readonly: bool,
    assets: Option<PathBuf>,
    normalized: Memo<Value, Document>,
    formatted: Memo<String, Vec<Node>>,
    surface: Option<MeasureSurface>,
    debounce: Debouncer<Trigger>,
    committed: PageList,
    passes: u64,
}

impl A4Preview {
    /// Unmounted preview with default props: 25mm margins, zoom 1.
    pub fn new(document: Value) -> Self {
        A4Preview {
            document,
            zoom: 1.0,
            margins: Margins::default(),
            readonly: false,
            assets: None,
            normalized: Memo::new(),
            formatted: Memo::new(),
            surface: None,
            debounce: Debouncer::default(),
            committed: PageList::initial(Margins::default()),
            passes: 0,
        }
    }

    pub fn with_margins(mut self, margins: Margins) -> Self {
        self.margins = margins;
        self
    }

    pub fn with_zoom(mut self, zoom: f32) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn with_readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    /// Directory relative image paths are resolved against when rendering.
    pub fn with_assets(mut self, dir: impl Into<PathBuf>) -> Self {
        self.assets = Some(dir.into());
        self
    }

    /// Attach a measurement surface and schedule the first pass.
    pub fn mount(&mut self, surface: MeasureSurface, now: Instant) {
        self.surface = Some(surface);
        self.debounce.schedule(now, Trigger::Mount);
    }

    /// Detach the surface. Committed pages stay; pending passes become no-ops.
    pub fn unmount(&mut self) -> Option<MeasureSurface> {
        self.surface.take()
    }

    pub fn is_mounted(&self) -> bool {
        self.surface.is_some()
    }

    /// Replace the document prop. Schedules a pass when the canonical view
    /// changed; returns whether one was scheduled.
    pub fn set_document(&mut self, document: Value, now: Instant) -> bool {
        if document == self.document {
            return false;
        }
        let before = self.normalized.get_or_compute(&self.document, normalize).clone();
        self.document = document;
        let after = self.normalized.get_or_compute(&self.document, normalize);
        if *after == before {
            log::debug!("document changed but its canonical view did not");
            return false;
        }
        self.debounce.schedule(now, Trigger::Document);
        true
    }

    pub fn set_margins(&mut self, margins: Margins, now: Instant) -> bool {
        if margins == self.margins {
            return false;
        }
        self.margins = margins;
        self.debounce.schedule(now, Trigger::Margins);
        true
    }

    /// Zoom is applied at render time only and never schedules a pass.
    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom;
    }

    /// Accepted for the caller's edit mode; pagination ignores it.
    pub fn set_readonly(&mut self, readonly: bool) {
        self.readonly = readonly;
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn margins(&self) -> Margins {
        self.margins
    }

    pub fn readonly(&self) -> bool {
        self.readonly
    }

    /// Canonical view of the current document prop.
    pub fn document(&mut self) -> &Document {
        self.normalized.get_or_compute(&self.document, normalize)
    }

    /// When the pending pass becomes due, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    pub fn is_pending(&self) -> bool {
        self.debounce.is_pending()
    }

    /// Run the pending pass if its quiet period is over. Returns true when a
    /// new page list was committed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.debounce.poll(now) {
            Some(trigger) => {
                log::debug!("recompute triggered by {trigger:?}");
                self.recompute()
            }
            None => false,
        }
    }

    /// Drop any pending request and run a pass right away.
    pub fn recompute_now(&mut self) -> bool {
        self.debounce.cancel();
        self.recompute()
    }

    fn recompute(&mut self) -> bool {
        let Some(surface) = self.surface.as_mut() else {
            log::debug!(
                "no measurement surface mounted; keeping {} page(s)",
                self.committed.len()
            );
            return false;
        };
        let t0 = Instant::now();
        let doc = self.normalized.get_or_compute(&self.document, normalize);
        let nodes = self.formatted.get_or_compute(&doc.content, |raw| format_content(raw));
        let blocks = collect_blocks(nodes);
        let t_format = t0.elapsed();

        let snapshot = surface.measure(doc, &blocks, &self.margins);
        let t_measure = t0.elapsed();

        let budget = PageBudget::new(&snapshot, &self.margins, Sections::of(doc));
        let pages = paginate(&blocks, &snapshot.blocks, &budget);
        let t_paginate = t0.elapsed();
        self.passes += 1;

        log::debug!(
            "pass {}: usable={:.1}px first_offset={:.1}px continuation_offset={:.1}px signature={:.1}px",
            self.passes,
            budget.usable,
            budget.first_offset,
            budget.continuation_offset,
            budget.signature,
        );
        log::info!(
            "Layout pass: format={:.1}ms, measure={:.1}ms, paginate={:.1}ms ({} blocks, {} pages)",
            t_format.as_secs_f64() * 1000.0,
            (t_measure - t_format).as_secs_f64() * 1000.0,
            (t_paginate - t_measure).as_secs_f64() * 1000.0,
            blocks.len(),
            pages.len(),
        );

        self.committed = PageList {
            pages,
            blocks,
            snapshot,
            budget: Some(budget),
            document: Some(doc.clone()),
            margins: self.margins,
        };
        true
    }

    /// The most recently committed page list.
    pub fn page_list(&self) -> &PageList {
        &self.committed
    }

    pub fn pages(&self) -> &[Page] {
        &self.committed.pages
    }

    /// Number of passes that committed a page list.
    pub fn pass_count(&self) -> u64 {
        self.passes
    }

    /// Render the committed pages at the current zoom. Needs a mounted surface
    /// for its font metrics.
    pub fn render_pdf(&mut self) -> Result<Vec<u8>, Error> {
        let options = PdfOptions {
            zoom: self.zoom,
            assets: self.assets.clone(),
        };
        let fallback;
        let doc = match &self.committed.document {
            Some(doc) => doc,
            None => {
                fallback = self.normalized.get_or_compute(&self.document, normalize).clone();
                &fallback
            }
        };
        let fonts: &FontSet = match &self.surface {
            Some(surface) => surface.fonts(),
            None => return Err(Error::Pdf("no measurement surface mounted".into())),
        };
        pdf::render(doc, &self.committed.pages, fonts, &self.committed.margins, &options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn mounted(doc: Value, t0: Instant) -> A4Preview {
        let mut p = A4Preview::new(doc);
        p.mount(MeasureSurface::new(FontSet::builtin()), t0);
        p
    }

    #[test]
    fn starts_with_one_empty_page() {
        let p = A4Preview::new(json!({}));
        assert_eq!(p.pages().len(), 1);
        assert!(p.page_list().budget.is_none());
    }

    #[test]
    fn pass_runs_after_quiet_period() {
        let t0 = Instant::now();
        let mut p = mounted(json!({ "content": "<p>bir</p><p>iki</p>" }), t0);
        assert!(!p.poll(t0 + Duration::from_millis(299)));
        assert!(p.poll(t0 + Duration::from_millis(300)));
        assert_eq!(p.page_list().partition(), vec![vec![0, 1]]);
    }

    #[test]
    fn edit_burst_runs_one_pass() {
        let t0 = Instant::now();
        let mut p = mounted(json!({}), t0);
        for (i, ms) in [50u64, 120, 200, 280].into_iter().enumerate() {
            let content = format!("<p>{}</p>", "x".repeat(i + 1));
            assert!(p.set_document(json!({ "content": content }), t0 + Duration::from_millis(ms)));
        }
        assert!(!p.poll(t0 + Duration::from_millis(500)));
        assert!(p.poll(t0 + Duration::from_millis(580)));
        assert_eq!(p.pass_count(), 1);
        assert_eq!(p.page_list().document.as_ref().unwrap().content, "<p>xxxx</p>");
    }

    #[test]
    fn equivalent_documents_do_not_schedule() {
        let t0 = Instant::now();
        let mut p = mounted(json!({ "subject": "Aidat" }), t0);
        p.recompute_now();
        // same canonical view under the other naming convention
        assert!(!p.set_document(json!({ "subject": "Aidat", "show_footer": true }), t0));
        assert!(!p.is_pending());
    }

    #[test]
    fn zoom_never_schedules() {
        let t0 = Instant::now();
        let mut p = mounted(json!({}), t0);
        p.recompute_now();
        p.set_zoom(0.5);
        assert!(!p.is_pending());
    }

    #[test]
    fn readonly_never_schedules() {
        let t0 = Instant::now();
        let mut p = mounted(json!({ "content": "<p>a</p>" }), t0);
        p.recompute_now();
        let before = p.page_list().partition();
        p.set_readonly(true);
        assert!(p.readonly());
        assert!(!p.is_pending());
        assert!(!p.poll(t0 + Duration::from_secs(1)));
        assert_eq!(p.page_list().partition(), before);
    }

    #[test]
    fn margin_change_repaginates_after_quiet_period() {
        let t0 = Instant::now();
        let content = "<p>Toplantı gündemi ve katılım bilgileri ektedir.</p>".repeat(40);
        let mut p = mounted(json!({ "content": content }), t0);
        p.recompute_now();
        let before = p.pages().len();

        let t1 = t0 + Duration::from_secs(1);
        assert!(!p.set_margins(Margins::default(), t1));
        assert!(p.set_margins(Margins::uniform(60.0), t1));
        assert!(p.is_pending());
        assert_eq!(p.page_list().margins, Margins::default());
        assert!(!p.poll(t1 + Duration::from_millis(299)));
        assert!(p.poll(t1 + Duration::from_millis(300)));
        assert_eq!(p.page_list().margins, Margins::uniform(60.0));
        assert!(p.pages().len() > before, "{} pages before, {} after", before, p.pages().len());
    }

    #[test]
    fn visibility_flag_change_schedules_a_pass() {
        let t0 = Instant::now();
        let doc = json!({ "receiver": "Şube Başkanlıklarına", "content": "<p>a</p>" });
        let mut p = mounted(doc.clone(), t0);
        p.recompute_now();
        let shown = p.page_list().budget.unwrap();

        let mut hidden = doc;
        hidden["showReceiver"] = json!(false);
        let t1 = t0 + Duration::from_secs(1);
        assert!(p.set_document(hidden, t1));
        assert!(p.is_pending());
        assert!(p.poll(t1 + Duration::from_millis(300)));
        let budget = p.page_list().budget.unwrap();
        assert_eq!(p.page_list().snapshot.receiver, 0.0);
        assert!(budget.first_offset < shown.first_offset);
    }

    #[test]
    fn unmounted_pass_keeps_previous_pages() {
        let t0 = Instant::now();
        let mut p = mounted(json!({ "content": "<p>a</p>" }), t0);
        assert!(p.recompute_now());
        let before = p.page_list().partition();
        let surface = p.unmount();
        assert!(surface.is_some());
        p.set_document(json!({ "content": "<p>a</p><p>b</p>" }), t0);
        assert!(!p.poll(t0 + Duration::from_secs(1)));
        assert_eq!(p.page_list().partition(), before);
        assert!(p.render_pdf().is_err());
    }

    #[test]
    fn summary_marks_signatures_on_last_page() {
        let t0 = Instant::now();
        let content = "<p>Toplantı gündemi ve katılım bilgileri ektedir.</p>".repeat(40);
        let mut p = mounted(
            json!({ "content": content, "signers": [{ "name": "Genel Sekreter" }] }),
            t0,
        );
        p.recompute_now();
        let summary = p.page_list().summary();
        assert!(summary.pages.len() > 1);
        let flags: Vec<bool> = summary.pages.iter().map(|s| s.signatures).collect();
        assert_eq!(flags.iter().filter(|f| **f).count(), 1);
        assert_eq!(flags.last(), Some(&true));
        assert!(summary.pages[0].blocks[0].description.starts_with("p: "));
        let dumped = serde_json::to_value(&summary).unwrap();
        assert!(dumped["budget"]["usable"].as_f64().unwrap() > 0.0);
    }
}
