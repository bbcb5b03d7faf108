mod common;

use a4_preview::content::format_content;
use a4_preview::measure::collect_blocks;
use a4_preview::model::Visibility;
use a4_preview::pager::{PageBudget, paginate};
use a4_preview::{A4Preview, Margins, RenderOptions, paginate_document};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn letterhead(content: String) -> Value {
    json!({
        "headerTitle": "T.C.",
        "headerOrgName": "Birleşik Kamu İşgörenleri Sendikası",
        "documentNumber": "2024/118",
        "subject": "Olağan Genel Kurul",
        "decisionNumber": "44",
        "receiver": "Şube Başkanlıklarına",
        "content": content,
    })
}

fn mixed_content() -> String {
    format!(
        "{}<h2>Ekler</h2><table><tr><td>Şube</td><td>Üye</td></tr><tr><td>Ankara</td><td>412</td></tr></table>{}Saygılarımızla,<br>Yönetim Kurulu",
        common::long_paragraphs(18),
        common::short_paragraphs(6),
    )
}

#[test]
fn idempotent_passes() {
    let _ = env_logger::try_init();
    let doc = letterhead(mixed_content());
    let mut preview = common::committed(doc.clone(), Margins::default());
    let first = preview.page_list().clone();
    assert!(preview.recompute_now());
    let second = preview.page_list();
    assert_eq!(first.partition(), second.partition());
    assert_eq!(first.snapshot, second.snapshot);
    assert_eq!(first.pages, second.pages);

    let again = common::committed(doc, Margins::default());
    assert_eq!(first.partition(), again.page_list().partition());
}

#[test]
fn every_block_lands_on_exactly_one_page_in_order() {
    let content = mixed_content();
    let expected = collect_blocks(&format_content(&content)).len();
    for mm in [10.0, 25.0, 45.0] {
        let preview = common::committed(letterhead(content.clone()), Margins::uniform(mm));
        let list = preview.page_list();
        assert!(list.len() > 1, "content should span pages at {mm}mm");
        assert_eq!(list.blocks.len(), expected);
        let placed: Vec<usize> = list.partition().into_iter().flatten().collect();
        assert_eq!(placed, (0..expected).collect::<Vec<_>>());
    }
}

#[test]
fn page_count_never_drops_as_usable_height_shrinks() {
    let content = mixed_content();
    let mut last_pages = 0;
    let mut last_usable = f32::INFINITY;
    for top in (5..=90).step_by(5) {
        let margins = Margins {
            top: top as f32,
            ..Margins::default()
        };
        let preview = common::committed(letterhead(content.clone()), margins);
        let list = preview.page_list();
        let usable = list.budget.unwrap().usable;
        assert!(usable < last_usable);
        assert!(
            list.len() >= last_pages,
            "top margin {top}mm gave {} pages after {last_pages}",
            list.len()
        );
        last_pages = list.len();
        last_usable = usable;
    }

    // a taller footer only ever adds pages
    let plain = common::committed(letterhead(content.clone()), Margins::default());
    let mut with_footer = letterhead(content);
    with_footer["footerOrgName"] = json!("Genel Merkez");
    with_footer["footerAddress"] = json!("Kızılay Mah.\nAtatürk Blv. No: 12\nÇankaya\nAnkara");
    with_footer["footerContact"] = json!("bilgi@sendika.org.tr");
    with_footer["footerPhone"] = json!("0312 000 00 00");
    let footed = common::committed(with_footer, Margins::default());
    assert!(footed.page_list().snapshot.footer > plain.page_list().snapshot.footer);
    assert!(footed.pages().len() >= plain.pages().len());
}

#[test]
fn first_page_budget_is_smaller_than_continuation() {
    let probe = common::committed(letterhead(common::short_paragraphs(1)), Margins::default());
    let budget = probe.page_list().budget.unwrap();
    let h = probe.page_list().snapshot.blocks[0].outer_height();
    assert!(budget.first_offset > budget.continuation_offset);

    // exactly as many blocks as a continuation page holds
    let k = ((budget.usable - budget.continuation_offset) / h).floor() as usize;
    assert!(k > 1);
    let full = common::committed(letterhead(common::short_paragraphs(k)), Margins::default());
    let list = full.page_list();
    assert_eq!(list.len(), 2);

    let continuation_first = PageBudget {
        first_offset: budget.continuation_offset,
        ..budget
    };
    let pages = paginate(&list.blocks, &list.snapshot.blocks, &continuation_first);
    assert_eq!(pages.len(), 1);
}

#[test]
fn signatures_move_to_a_fresh_page_when_the_last_one_is_full() {
    let doc = |content: String, show: bool| {
        json!({
            "content": content,
            "signers": [{ "name": "Ayşe Demir", "title": "Genel Başkan" }],
            "showSignatures": show,
        })
    };
    let probe = common::committed(doc(common::short_paragraphs(1), false), Margins::default());
    let budget = probe.page_list().budget.unwrap();
    let h = probe.page_list().snapshot.blocks[0].outer_height();
    let n = ((budget.usable - budget.first_offset) / h).floor() as usize;

    let hidden = common::committed(doc(common::short_paragraphs(n), false), Margins::default());
    let shown = common::committed(doc(common::short_paragraphs(n), true), Margins::default());
    assert_eq!(hidden.pages().len(), 1);
    assert_eq!(shown.pages().len(), hidden.pages().len() + 1);
    assert_eq!(shown.pages()[0].fragments.len(), n);
    assert!(shown.pages()[1].fragments.is_empty());

    let summary = shown.page_list().summary();
    assert_eq!(
        summary.pages.iter().map(|p| p.signatures).collect::<Vec<_>>(),
        vec![false, true]
    );
}

#[test]
fn missing_props_fall_back_to_defaults() {
    let mut preview = A4Preview::new(json!({ "content": "<p>Bilgi</p>" }));
    assert_eq!(preview.margins(), Margins::default());
    assert_eq!(preview.document().visibility, Visibility::default());

    let list = paginate_document(&json!({ "content": "<p>Bilgi</p>" }), &RenderOptions::default())
        .unwrap();
    assert_eq!(list.margins, Margins::uniform(25.0));
}

#[test]
fn hidden_footer_is_left_off_every_page() {
    let doc = |show: bool| {
        json!({
            "footerOrgName": "Sendikamiz",
            "content": common::long_paragraphs(30),
            "showFooter": show,
        })
    };
    for show in [true, false] {
        let mut preview = common::committed(doc(show), Margins::default());
        let pdf = preview.render_pdf().unwrap();
        let pages = preview.pages().len();
        assert!(pages > 1);
        assert_eq!(common::pdf_page_count(&pdf), pages);

        let streams = common::pdf_streams(&pdf);
        assert_eq!(streams.len(), pages);
        let with_footer = streams
            .iter()
            .filter(|s| common::count(s, b"(Sendikamiz)") == 1)
            .count();
        assert_eq!(with_footer, if show { pages } else { 0 });
    }
}

#[test]
fn zoom_changes_scale_only() {
    let doc = letterhead(mixed_content());
    let at = |zoom: f32| {
        let opts = RenderOptions {
            zoom,
            ..RenderOptions::default()
        };
        paginate_document(&doc, &opts).unwrap().partition()
    };
    assert_eq!(at(1.0), at(0.5));

    let mut preview = common::committed(doc, Margins::default());
    let full = preview.render_pdf().unwrap();
    preview.set_zoom(0.5);
    assert!(!preview.is_pending());
    let half = preview.render_pdf().unwrap();
    assert_eq!(common::pdf_page_count(&full), common::pdf_page_count(&half));
    assert_eq!(common::pdf_page_count(&half), preview.pages().len());
    assert_ne!(full, half);
    let first_stream = &common::pdf_streams(&half)[0];
    assert!(first_stream.starts_with(b"0.5 0 0 0.5 0 0 cm"));
}

#[test]
fn empty_document_has_one_page() {
    for content in ["", "   ", "\n\n  \n", "<p> </p><br>"] {
        let mut preview = common::committed(json!({ "content": content }), Margins::default());
        let list = preview.page_list();
        assert_eq!(list.len(), 1, "content {content:?}");
        assert!(list.pages[0].fragments.is_empty() || content.starts_with("<p>"));
        let pdf = preview.render_pdf().unwrap();
        assert_eq!(common::pdf_page_count(&pdf), 1);
    }
}
