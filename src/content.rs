//! Content formatter: raw stored body text to block-level markup.
//!
//! Bodies are either plain text typed into a textarea or HTML-ish markup
//! produced by the rich editor. Both end up as a flat sequence of [`Node`]s:
//! block elements (paragraphs, headings, list items, tables) and loose inline
//! runs with line-break markers between them.

use crate::model::TextAlign;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpanStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Span {
    pub text: String,
    pub style: SpanStyle,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Inline {
    Text(Span),
    Break,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BlockRole {
    Paragraph,
    Heading(u8),
    ListItem(String),
    Division,
    Quote,
    /// Synthetic wrapper around loose inline content.
    Group,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextBlock {
    pub role: BlockRole,
    pub align: Option<TextAlign>,
    pub inlines: Vec<Inline>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableBlock {
    /// rows → cells → cell content
    pub rows: Vec<Vec<Vec<Inline>>>,
}

impl TableBlock {
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    Text(TextBlock),
    Table(TableBlock),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Inline(Inline),
    Block(Block),
}

/// True when every inline is whitespace or a line break.
pub fn inlines_blank(inlines: &[Inline]) -> bool {
    inlines.iter().all(|i| match i {
        Inline::Text(span) => span.text.trim().is_empty(),
        Inline::Break => true,
    })
}

/// Plain text of a run of inlines, line breaks as `\n`.
pub fn inlines_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        match inline {
            Inline::Text(span) => out.push_str(&span.text),
            Inline::Break => out.push('\n'),
        }
    }
    out
}

pub fn format_content(raw: &str) -> Vec<Node> {
    if looks_like_markup(raw) {
        match parse_markup(raw) {
            Ok(nodes) => return nodes,
            Err(e) => {
                log::warn!("Content markup did not parse ({e}); falling back to plain text");
                return format_plain(&strip_tags(raw));
            }
        }
    }
    format_plain(raw)
}

fn looks_like_markup(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.windows(2).any(|w| {
        w[0] == b'<' && (w[1].is_ascii_alphabetic() || w[1] == b'/' || w[1] == b'!')
    }) && raw.contains('>')
}

/// Whitespace a line may break at. No-break space is kept as a glyph.
pub fn is_break_space(c: char) -> bool {
    c.is_whitespace() && c != '\u{a0}'
}

/// Collapse inner whitespace runs to one space, keeping a single space at an
/// edge that had whitespace.
fn collapse_ws(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    if text.starts_with(is_break_space) {
        out.push(' ');
    }
    let mut first = true;
    for word in text.split(is_break_space).filter(|w| !w.is_empty()) {
        if !first {
            out.push(' ');
        }
        out.push_str(word);
        first = false;
    }
    if !first && text.ends_with(is_break_space) {
        out.push(' ');
    }
    out
}

fn format_plain(raw: &str) -> Vec<Node> {
    let text = raw.replace("\r\n", "\n").replace('\r', "\n");
    let mut nodes = Vec::new();
    let mut inlines: Vec<Inline> = Vec::new();

    let flush = |inlines: &mut Vec<Inline>, nodes: &mut Vec<Node>| {
        if !inlines.is_empty() {
            nodes.push(Node::Block(Block::Text(TextBlock {
                role: BlockRole::Paragraph,
                align: None,
                inlines: std::mem::take(inlines),
            })));
        }
    };

    for line in text.split('\n') {
        let collapsed = collapse_ws(line);
        let trimmed = collapsed.trim();
        if trimmed.is_empty() {
            flush(&mut inlines, &mut nodes);
            continue;
        }
        if !inlines.is_empty() {
            inlines.push(Inline::Break);
        }
        inlines.push(Inline::Text(Span {
            text: trimmed.to_string(),
            style: SpanStyle::default(),
        }));
    }
    flush(&mut inlines, &mut nodes);
    nodes
}

const VOID_TAGS: &[&str] = &["br", "hr", "img", "input", "meta", "col", "wbr", "link"];

const ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", "&#160;"),
    ("&ccedil;", "ç"),
    ("&Ccedil;", "Ç"),
    ("&ouml;", "ö"),
    ("&Ouml;", "Ö"),
    ("&uuml;", "ü"),
    ("&Uuml;", "Ü"),
    ("&laquo;", "«"),
    ("&raquo;", "»"),
    ("&ndash;", "–"),
    ("&mdash;", "—"),
    ("&hellip;", "…"),
    ("&lsquo;", "‘"),
    ("&rsquo;", "’"),
    ("&ldquo;", "“"),
    ("&rdquo;", "”"),
    ("&bull;", "•"),
];

fn replace_entities(s: &str) -> String {
    let mut out = s.to_string();
    for (from, to) in ENTITIES {
        if out.contains(from) {
            out = out.replace(from, to);
        }
    }
    out
}

/// Make editor HTML acceptable to an XML parser: self-close void elements and
/// map the named entities XML does not know.
fn to_xml_fragment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 16);
    let mut rest = raw;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let Some(len) = tag_len(&rest[open..]) else {
            out.push_str("&lt;");
            rest = &rest[open + 1..];
            continue;
        };
        let tag = &rest[open..open + len];
        let name: String = tag[1..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        if VOID_TAGS.contains(&name.as_str()) && !tag.ends_with("/>") {
            out.push_str(&tag[..tag.len() - 1]);
            out.push_str("/>");
        } else {
            out.push_str(tag);
        }
        rest = &rest[open + len..];
    }
    out.push_str(rest);
    replace_entities(&out)
}

/// Byte length of the tag starting at `s`, or `None` when the `<` is literal
/// text: it must be followed by a letter, `/` or `!` and close before the
/// next `<`.
fn tag_len(s: &str) -> Option<usize> {
    let next = s[1..].chars().next()?;
    if !(next.is_ascii_alphabetic() || next == '/' || next == '!') {
        return None;
    }
    let close = s.find('>')?;
    if s[1..close].contains('<') {
        return None;
    }
    Some(close + 1)
}

fn strip_tags(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let Some(len) = tag_len(&rest[open..]) else {
            out.push('<');
            rest = &rest[open + 1..];
            continue;
        };
        let tag = rest[open + 1..open + len - 1].trim().to_ascii_lowercase();
        let name = tag.trim_start_matches('/');
        let name: String = name.chars().take_while(|c| c.is_ascii_alphanumeric()).collect();
        match name.as_str() {
            "br" => out.push('\n'),
            // opening and closing block tags both end a paragraph
            "p" | "div" | "li" | "tr" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "blockquote"
            | "ul" | "ol" | "table" => out.push_str("\n\n"),
            _ => {}
        }
        rest = &rest[open + len..];
    }
    out.push_str(rest);
    replace_entities(&out).replace("&#160;", " ").replace("&amp;", "&")
}

fn parse_markup(raw: &str) -> Result<Vec<Node>, roxmltree::Error> {
    let xml = format!("<root>{}</root>", to_xml_fragment(raw));
    let doc = roxmltree::Document::parse(&xml)?;
    let mut nodes = Vec::new();
    walk_flow(doc.root_element(), SpanStyle::default(), &mut nodes);
    Ok(nodes)
}

fn tag_name(node: roxmltree::Node) -> String {
    node.tag_name().name().to_ascii_lowercase()
}

fn heading_level(name: &str) -> Option<u8> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn is_block_tag(name: &str) -> bool {
    heading_level(name).is_some()
        || matches!(
            name,
            "p" | "div"
                | "section"
                | "article"
                | "center"
                | "blockquote"
                | "table"
                | "ul"
                | "ol"
                | "li"
                | "hr"
                | "pre"
        )
}

fn styled(name: &str, style: SpanStyle) -> SpanStyle {
    match name {
        "b" | "strong" | "th" => SpanStyle { bold: true, ..style },
        "i" | "em" => SpanStyle {
            italic: true,
            ..style
        },
        "u" | "ins" => SpanStyle {
            underline: true,
            ..style
        },
        _ => style,
    }
}

/// `text-align` from a `style` attribute or the legacy `align` attribute.
fn block_align(node: roxmltree::Node) -> Option<TextAlign> {
    if let Some(style) = node.attribute("style") {
        for decl in style.split(';') {
            if let Some((prop, value)) = decl.split_once(':')
                && prop.trim().eq_ignore_ascii_case("text-align")
            {
                return TextAlign::parse(value);
            }
        }
    }
    if tag_name(node) == "center" {
        return Some(TextAlign::Center);
    }
    node.attribute("align").and_then(TextAlign::parse)
}

fn text_inline(text: &str, style: SpanStyle) -> Option<Inline> {
    let collapsed = collapse_ws(text);
    (!collapsed.is_empty()).then(|| {
        Inline::Text(Span {
            text: collapsed,
            style,
        })
    })
}

/// Walk mixed content, emitting inline nodes for text and flushing block
/// elements as standalone blocks.
fn walk_flow(node: roxmltree::Node, style: SpanStyle, out: &mut Vec<Node>) {
    for child in node.children() {
        if child.is_text() {
            if let Some(inline) = child.text().and_then(|t| text_inline(t, style)) {
                out.push(Node::Inline(inline));
            }
            continue;
        }
        if !child.is_element() {
            continue;
        }
        let name = tag_name(child);
        match name.as_str() {
            "br" => out.push(Node::Inline(Inline::Break)),
            "hr" | "img" | "script" | "style" | "head" | "title" => {}
            "table" => out.push(Node::Block(Block::Table(collect_table(child, style)))),
            "ul" | "ol" => collect_list(child, name == "ol", style, out),
            _ if is_block_tag(&name) => {
                let role = match heading_level(&name) {
                    Some(level) => BlockRole::Heading(level),
                    None if name == "p" || name == "pre" => BlockRole::Paragraph,
                    None if name == "blockquote" => BlockRole::Quote,
                    None if name == "li" => BlockRole::ListItem("•".to_string()),
                    None => BlockRole::Division,
                };
                let style = match role {
                    BlockRole::Heading(_) => SpanStyle { bold: true, ..style },
                    _ => style,
                };
                let mut inlines = Vec::new();
                collect_inlines(child, style, &mut inlines);
                trim_breaks(&mut inlines);
                out.push(Node::Block(Block::Text(TextBlock {
                    role,
                    align: block_align(child),
                    inlines,
                })));
            }
            _ => walk_flow(child, styled(&name, style), out),
        }
    }
}

/// Flatten everything under `node` into inline content. Nested blocks are
/// separated by line breaks.
fn collect_inlines(node: roxmltree::Node, style: SpanStyle, out: &mut Vec<Inline>) {
    for child in node.children() {
        if child.is_text() {
            if let Some(inline) = child.text().and_then(|t| text_inline(t, style)) {
                out.push(inline);
            }
            continue;
        }
        if !child.is_element() {
            continue;
        }
        let name = tag_name(child);
        match name.as_str() {
            "br" => out.push(Inline::Break),
            "img" | "script" | "style" => {}
            _ if is_block_tag(&name) => {
                if out.last().is_some_and(|i| *i != Inline::Break) {
                    out.push(Inline::Break);
                }
                collect_inlines(child, styled(&name, style), out);
                out.push(Inline::Break);
            }
            _ => collect_inlines(child, styled(&name, style), out),
        }
    }
}

fn trim_breaks(inlines: &mut Vec<Inline>) {
    while inlines.last() == Some(&Inline::Break) {
        inlines.pop();
    }
    let leading = inlines.iter().take_while(|i| **i == Inline::Break).count();
    inlines.drain(..leading);
}

fn collect_list(node: roxmltree::Node, ordered: bool, style: SpanStyle, out: &mut Vec<Node>) {
    let items = node
        .children()
        .filter(|c| c.is_element() && tag_name(*c) == "li");
    for (i, item) in items.enumerate() {
        let marker = if ordered {
            format!("{}.", i + 1)
        } else {
            "•".to_string()
        };
        let mut inlines = Vec::new();
        collect_inlines(item, style, &mut inlines);
        trim_breaks(&mut inlines);
        out.push(Node::Block(Block::Text(TextBlock {
            role: BlockRole::ListItem(marker),
            align: block_align(item),
            inlines,
        })));
    }
}

fn collect_table(node: roxmltree::Node, style: SpanStyle) -> TableBlock {
    let mut rows = Vec::new();
    // rows may sit directly under <table> or inside thead/tbody/tfoot
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        let mut sections = Vec::new();
        for child in n.children().filter(|c| c.is_element()) {
            match tag_name(child).as_str() {
                "tr" => {
                    let cells = child
                        .children()
                        .filter(|c| c.is_element() && matches!(tag_name(*c).as_str(), "td" | "th"))
                        .map(|cell| {
                            let mut inlines = Vec::new();
                            collect_inlines(cell, styled(&tag_name(cell), style), &mut inlines);
                            trim_breaks(&mut inlines);
                            inlines
                        })
                        .collect::<Vec<_>>();
                    rows.push(cells);
                }
                "thead" | "tbody" | "tfoot" => sections.push(child),
                _ => {}
            }
        }
        // preserve document order of sections
        stack.extend(sections.into_iter().rev());
    }
    TableBlock { rows }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(nodes: &[Node]) -> Vec<String> {
        nodes
            .iter()
            .map(|n| match n {
                Node::Block(Block::Text(tb)) => inlines_text(&tb.inlines),
                Node::Block(Block::Table(_)) => "<table>".to_string(),
                Node::Inline(i) => inlines_text(std::slice::from_ref(i)),
            })
            .collect()
    }

    #[test]
    fn plain_text_splits_on_blank_lines() {
        let nodes = format_content("Birinci  paragraf\nikinci satır\r\n\r\n\n  Üçüncü  ");
        assert_eq!(texts(&nodes), vec!["Birinci paragraf\nikinci satır", "Üçüncü"]);
    }

    #[test]
    fn empty_content_has_no_nodes() {
        assert!(format_content("").is_empty());
        assert!(format_content("  \n\n ").is_empty());
    }

    #[test]
    fn markup_blocks_and_loose_inlines() {
        let nodes = format_content("Giriş <b>kalın</b><br>devam<p>Paragraf</p><h2>Başlık</h2>");
        assert_eq!(nodes.len(), 6);
        assert!(matches!(nodes[3], Node::Inline(Inline::Text(_))));
        match &nodes[1] {
            Node::Inline(Inline::Text(span)) => assert!(span.style.bold),
            other => panic!("expected bold span, got {other:?}"),
        }
        match &nodes[5] {
            Node::Block(Block::Text(tb)) => assert_eq!(tb.role, BlockRole::Heading(2)),
            other => panic!("expected heading, got {other:?}"),
        }
    }

    #[test]
    fn block_alignment_is_read_from_style() {
        let nodes = format_content(r#"<p style="color: red; text-align: center">Orta</p>"#);
        match &nodes[0] {
            Node::Block(Block::Text(tb)) => assert_eq!(tb.align, Some(TextAlign::Center)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn lists_become_one_block_per_item() {
        let nodes = format_content("<ol><li>bir</li><li>iki</li></ol><ul><li>üç</li></ul>");
        let markers: Vec<_> = nodes
            .iter()
            .filter_map(|n| match n {
                Node::Block(Block::Text(TextBlock {
                    role: BlockRole::ListItem(m),
                    ..
                })) => Some(m.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(markers, vec!["1.", "2.", "•"]);
    }

    #[test]
    fn tables_keep_rows_and_cells() {
        let nodes = format_content(
            "<table><thead><tr><th>Ad</th><th>Tutar</th></tr></thead>\
             <tbody><tr><td>Aidat</td><td>100</td></tr></tbody></table>",
        );
        match &nodes[0] {
            Node::Block(Block::Table(t)) => {
                assert_eq!(t.rows.len(), 2);
                assert_eq!(t.column_count(), 2);
                assert_eq!(inlines_text(&t.rows[1][0]), "Aidat");
                match &t.rows[0][0][0] {
                    Inline::Text(span) => assert!(span.style.bold),
                    Inline::Break => panic!("header cell starts with a break"),
                }
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn entities_and_void_tags_are_accepted() {
        let nodes = format_content("<p>Sayın&nbsp;Üye<br>G&ouml;rev</p>");
        assert_eq!(texts(&nodes), vec!["Sayın\u{a0}Üye\nGörev"]);
    }

    #[test]
    fn broken_markup_falls_back_to_text() {
        let nodes = format_content("<p>açık <b>kapanmamış</p><p>ikinci");
        assert_eq!(texts(&nodes), vec!["açık kapanmamış", "ikinci"]);
    }

    #[test]
    fn literal_angle_brackets_keep_their_text() {
        let nodes = format_content("Aidat 5 < 10 TL olarak <b>belirlendi</b>");
        let joined = texts(&nodes).concat();
        assert!(joined.contains("5 < 10 TL olarak"), "{joined:?}");
        assert!(joined.contains("belirlendi"));

        // unbalanced markup goes through the stripping fallback
        let nodes = format_content("<p>5 < 10 <b>açık</p><p>ikinci");
        assert_eq!(texts(&nodes), vec!["5 < 10 açık", "ikinci"]);
    }

    #[test]
    fn unclosed_paragraphs_stay_apart_when_stripped() {
        assert_eq!(texts(&format_plain(&strip_tags("<p>bir<p>iki"))), vec!["bir", "iki"]);
        assert_eq!(strip_tags("a <b>kalın</b> x>y"), "a kalın x>y");
    }
}
