use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use memmap2::Mmap;
use pdf_writer::{Name, Pdf, Rect, Ref};
use ttf_parser::Face as TtfFace;

use crate::content::SpanStyle;

/// Chars whose advances are cached per face: Latin-1, Latin Extended-A/B,
/// general punctuation, currency.
const CACHED_RANGES: &[(u32, u32)] = &[
    (0x0020, 0x024F),
    (0x2000, 0x206F),
    (0x20A0, 0x20BF),
    (0x2100, 0x2122),
];

enum FaceSource {
    /// Standard 14 Type1 font, WinAnsi encoded.
    Builtin(&'static str),
    TrueType { data: Arc<Vec<u8>>, index: u32 },
}

/// Metrics for one face: enough to line-break text and place baselines.
pub struct Face {
    family: String,
    source: FaceSource,
    char_widths_1000: HashMap<char, f32>,
    fallback_width_1000: f32,
    pub(crate) ascender_ratio: f32,
    pub(crate) line_h_ratio: f32,
}

impl Face {
    fn builtin(base_font: &'static str, bold: bool) -> Self {
        let char_widths_1000 = CACHED_RANGES
            .iter()
            .flat_map(|&(lo, hi)| lo..=hi)
            .filter_map(char::from_u32)
            .filter_map(|ch| winansi_byte(ch).map(|b| (ch, helvetica_width(b, bold))))
            .collect();
        Face {
            family: "Helvetica".to_string(),
            source: FaceSource::Builtin(base_font),
            char_widths_1000,
            fallback_width_1000: if bold { 611.0 } else { 556.0 },
            ascender_ratio: 0.75,
            line_h_ratio: 1.2,
        }
    }

    fn truetype(family: &str, data: Vec<u8>, index: u32) -> Option<Self> {
        let face = TtfFace::parse(&data, index).ok()?;
        let units = face.units_per_em() as f32;
        let mut char_widths_1000 = HashMap::new();
        for ch in CACHED_RANGES
            .iter()
            .flat_map(|&(lo, hi)| lo..=hi)
            .filter_map(char::from_u32)
        {
            if let Some(adv) = face.glyph_index(ch).and_then(|gid| face.glyph_hor_advance(gid)) {
                char_widths_1000.insert(ch, adv as f32 / units * 1000.0);
            }
        }
        let fallback_width_1000 = char_widths_1000.get(&'n').copied().unwrap_or(500.0);
        let line_gap = face.line_gap() as f32;
        let line_h_ratio = (face.ascender() as f32 - face.descender() as f32 + line_gap) / units;
        let ascender_ratio = face.ascender() as f32 / units;
        drop(face);
        Some(Face {
            family: family.to_string(),
            source: FaceSource::TrueType {
                data: Arc::new(data),
                index,
            },
            char_widths_1000,
            fallback_width_1000,
            ascender_ratio,
            line_h_ratio,
        })
    }

    pub(crate) fn char_width_1000(&self, ch: char) -> f32 {
        self.char_widths_1000
            .get(&ch)
            .copied()
            .unwrap_or(self.fallback_width_1000)
    }

    pub fn word_width(&self, word: &str, font_size: f32) -> f32 {
        word.chars()
            .map(|ch| self.char_width_1000(ch) * font_size / 1000.0)
            .sum()
    }

    pub fn space_width(&self, font_size: f32) -> f32 {
        self.char_width_1000(' ') * font_size / 1000.0
    }

    /// Distance from the top of a CSS line box to the baseline.
    pub fn baseline_offset(&self, font_size: f32, line_height: f32) -> f32 {
        let content_h = font_size * self.line_h_ratio;
        (line_height - content_h) / 2.0 + font_size * self.ascender_ratio
    }
}

/// The four faces of one family used by a document.
pub struct FontSet {
    regular: Face,
    bold: Face,
    italic: Face,
    bold_italic: Face,
}

impl FontSet {
    /// Helvetica metrics; needs no font files, used by tests and as fallback.
    pub fn builtin() -> Self {
        FontSet {
            regular: Face::builtin("Helvetica", false),
            bold: Face::builtin("Helvetica-Bold", true),
            italic: Face::builtin("Helvetica-Oblique", false),
            bold_italic: Face::builtin("Helvetica-BoldOblique", true),
        }
    }

    /// Resolve `family` from the system font index. Missing variants fall back
    /// to the regular face of the family, then to Helvetica.
    pub fn load(family: &str) -> Self {
        let t0 = std::time::Instant::now();
        let load_face = |bold: bool, italic: bool| -> Option<Face> {
            let (path, index) = find_font_file(family, bold, italic)?;
            let data = std::fs::read(&path).ok()?;
            Face::truetype(family, data, index)
        };
        let builtin = Self::builtin();
        let pick = |bold: bool, italic: bool, fallback: Face| {
            load_face(bold, italic).unwrap_or_else(|| {
                log::warn!("Font not found: {family} bold={bold} italic={italic}; using Helvetica");
                fallback
            })
        };
        let set = FontSet {
            regular: pick(false, false, builtin.regular),
            bold: pick(true, false, builtin.bold),
            italic: pick(false, true, builtin.italic),
            bold_italic: pick(true, true, builtin.bold_italic),
        };
        log::debug!(
            "FontSet::load: {family} → {:.1}ms",
            t0.elapsed().as_secs_f64() * 1000.0
        );
        set
    }

    pub fn face(&self, style: SpanStyle) -> &Face {
        match (style.bold, style.italic) {
            (false, false) => &self.regular,
            (true, false) => &self.bold,
            (false, true) => &self.italic,
            (true, true) => &self.bold_italic,
        }
    }

    pub fn regular(&self) -> &Face {
        &self.regular
    }

    pub fn bold(&self) -> &Face {
        &self.bold
    }

    pub(crate) fn faces(&self) -> [(SpanStyle, &Face); 4] {
        let s = |bold, italic| SpanStyle {
            bold,
            italic,
            underline: false,
        };
        [
            (s(false, false), &self.regular),
            (s(true, false), &self.bold),
            (s(false, true), &self.italic),
            (s(true, true), &self.bold_italic),
        ]
    }
}

/// (lowercase family name, bold, italic) -> (file path, face index within TTC)
type FontLookup = HashMap<(String, bool, bool), (PathBuf, u32)>;

static FONT_INDEX: OnceLock<FontLookup> = OnceLock::new();

fn font_family_name(face: &TtfFace) -> Option<String> {
    // ID 1 (Family) keeps "Arial Narrow" apart from "Arial"
    for name in face.names() {
        if name.name_id == ttf_parser::name_id::FAMILY
            && name.is_unicode()
            && let Some(s) = name.to_string()
        {
            return Some(s);
        }
    }
    None
}

fn read_font_style(data: &[u8], face_index: u32) -> Option<(String, bool, bool)> {
    let face = TtfFace::parse(data, face_index).ok()?;
    let family = font_family_name(&face)?;
    Some((family, face.is_bold(), face.is_italic()))
}

fn font_directories() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();

    if let Ok(val) = std::env::var("A4_PREVIEW_FONTS") {
        let sep = if cfg!(windows) { ';' } else { ':' };
        dirs.extend(
            val.split(sep)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        );
    }

    #[cfg(target_os = "macos")]
    {
        dirs.extend([
            "/Library/Fonts".into(),
            "/System/Library/Fonts".into(),
            "/System/Library/Fonts/Supplemental".into(),
        ]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.extend(["/usr/share/fonts".into(), "/usr/local/share/fonts".into()]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        } else {
            dirs.push("C:\\Windows\\Fonts".into());
        }
    }

    dirs
}

fn is_font_file(path: &std::path::Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("ttf" | "otf" | "ttc")
    )
}

fn scan_font_dirs() -> FontLookup {
    let t0 = std::time::Instant::now();
    let mut index = FontLookup::new();
    let mut files_scanned = 0u32;
    let mut visited: HashSet<PathBuf> = HashSet::new();

    let mut stack = font_directories();
    while let Some(dir) = stack.pop() {
        if !visited.insert(dir.clone()) {
            continue;
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            if !is_font_file(&path) {
                continue;
            }
            files_scanned += 1;
            let Ok(file) = std::fs::File::open(&path) else {
                continue;
            };
            // SAFETY: font files are opened read-only and only read for the
            // lifetime of this map.
            let Ok(data) = (unsafe { Mmap::map(&file) }) else {
                continue;
            };
            let face_count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
            for face_idx in 0..face_count {
                if let Some((family, bold, italic)) = read_font_style(&data, face_idx) {
                    index
                        .entry((family.to_lowercase(), bold, italic))
                        .or_insert((path.clone(), face_idx));
                }
            }
        }
    }

    log::info!(
        "Font scan: {:.1}ms, {} files parsed → {} entries",
        t0.elapsed().as_secs_f64() * 1000.0,
        files_scanned,
        index.len(),
    );
    index
}

/// Look up a font file by family name and style. Falls back to the regular
/// variant when the requested bold/italic face is not installed.
fn find_font_file(font_name: &str, bold: bool, italic: bool) -> Option<(PathBuf, u32)> {
    let index = FONT_INDEX.get_or_init(scan_font_dirs);
    let key = font_name.trim().to_lowercase();
    index
        .get(&(key.clone(), bold, italic))
        .or_else(|| {
            if bold || italic {
                index.get(&(key, false, false))
            } else {
                None
            }
        })
        .cloned()
}

/// WinAnsi (Windows-1252) byte for a char. Turkish letters outside the code
/// page are folded to their unaccented Latin forms.
pub(crate) fn winansi_byte(c: char) -> Option<u8> {
    let b = match c as u32 {
        0x0020..=0x007E => c as u8,
        0x00A0..=0x00FF => c as u8,
        0x20AC => 0x80,
        0x201A => 0x82,
        0x0192 => 0x83,
        0x201E => 0x84,
        0x2026 => 0x85,
        0x2020 => 0x86,
        0x2021 => 0x87,
        0x02C6 => 0x88,
        0x2030 => 0x89,
        0x0160 => 0x8A,
        0x2039 => 0x8B,
        0x0152 => 0x8C,
        0x017D => 0x8E,
        0x2018 => 0x91,
        0x2019 => 0x92,
        0x201C => 0x93,
        0x201D => 0x94,
        0x2022 => 0x95,
        0x2013 => 0x96,
        0x2014 => 0x97,
        0x02DC => 0x98,
        0x2122 => 0x99,
        0x0161 => 0x9A,
        0x203A => 0x9B,
        0x0153 => 0x9C,
        0x017E => 0x9E,
        0x0178 => 0x9F,
        0x011F => b'g', // ğ
        0x011E => b'G', // Ğ
        0x0131 => b'i', // ı
        0x0130 => b'I', // İ
        0x015F => b's', // ş
        0x015E => b'S', // Ş
        _ => return None,
    };
    Some(b)
}

pub(crate) fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars().filter_map(winansi_byte).collect()
}

/// Encode UTF-8 text as big-endian 2-byte glyph IDs for CIDFont content streams.
pub(crate) fn encode_as_gids(text: &str, char_to_gid: &HashMap<char, u16>) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for ch in text.chars() {
        let gid = char_to_gid.get(&ch).copied().unwrap_or(0);
        out.extend_from_slice(&gid.to_be_bytes());
    }
    out
}

/// Approximate Helvetica advances at 1000 units/em for a WinAnsi byte.
fn helvetica_width(b: u8, bold: bool) -> f32 {
    let w = match b {
        32 => 278.0,                          // space
        33..=47 => 333.0,                     // punctuation
        48..=57 => 556.0,                     // digits
        58..=64 => 333.0,                     // more punctuation
        73 | 74 => 278.0,                     // I J
        77 => 833.0,                          // M
        87 => 944.0,                          // W
        65..=90 => 667.0,                     // uppercase average
        91..=96 => 333.0,                     // brackets etc.
        102 | 105 | 106 | 108 | 116 => 278.0, // f i j l t
        109 | 119 => 833.0,                   // m w
        97..=122 => 556.0,                    // lowercase average
        0xA0 => 278.0,                        // no-break space
        0xC0..=0xDF => 667.0,                 // accented uppercase
        0xEC..=0xEF => 278.0,                 // accented i
        _ => 556.0,
    };
    if bold && b != 32 { w * 1.06 } else { w }
}

/// A face registered in one PDF.
pub(crate) struct EmbeddedFace {
    pub(crate) pdf_name: String,
    pub(crate) font_ref: Ref,
    char_to_gid: Option<HashMap<char, u16>>,
}

impl EmbeddedFace {
    pub(crate) fn encode(&self, text: &str) -> Vec<u8> {
        match &self.char_to_gid {
            Some(map) => encode_as_gids(text, map),
            None => to_winansi_bytes(text),
        }
    }
}

/// Write `face` into `pdf`, subsetting TrueType data to `used_chars`.
pub(crate) fn embed_face(
    pdf: &mut Pdf,
    face: &Face,
    pdf_name: String,
    used_chars: &HashSet<char>,
    alloc: &mut impl FnMut() -> Ref,
) -> EmbeddedFace {
    let font_ref = alloc();
    let char_to_gid = match &face.source {
        FaceSource::Builtin(base_font) => {
            pdf.type1_font(font_ref)
                .base_font(Name(base_font.as_bytes()))
                .encoding_predefined(Name(b"WinAnsiEncoding"));
            None
        }
        FaceSource::TrueType { data, index } => {
            match embed_truetype(pdf, font_ref, &face.family, data, *index, used_chars, alloc) {
                Some(map) => Some(map),
                None => {
                    log::warn!("Could not embed {}; using Helvetica", face.family);
                    pdf.type1_font(font_ref)
                        .base_font(Name(b"Helvetica"))
                        .encoding_predefined(Name(b"WinAnsiEncoding"));
                    None
                }
            }
        }
    };
    EmbeddedFace {
        pdf_name,
        font_ref,
        char_to_gid,
    }
}

/// Embed a TrueType/OpenType face as a Type0 font with Identity-H encoding.
fn embed_truetype(
    pdf: &mut Pdf,
    font_ref: Ref,
    font_name: &str,
    font_data: &[u8],
    face_index: u32,
    used_chars: &HashSet<char>,
    alloc: &mut impl FnMut() -> Ref,
) -> Option<HashMap<char, u16>> {
    let face = TtfFace::parse(font_data, face_index).ok()?;
    let units = face.units_per_em() as f32;
    let scale = |v: f32| v / units * 1000.0;

    let bb = face.global_bounding_box();
    let bbox = Rect::new(
        scale(bb.x_min as f32),
        scale(bb.y_min as f32),
        scale(bb.x_max as f32),
        scale(bb.y_max as f32),
    );

    let mut remapper = subsetter::GlyphRemapper::new();
    let mut char_to_gid = HashMap::new();
    let mut gid_widths: Vec<(u16, f32)> = Vec::new();
    let mut chars: Vec<char> = used_chars.iter().copied().collect();
    chars.sort_unstable();
    for ch in chars {
        if let Some(gid) = face.glyph_index(ch) {
            let new_gid = remapper.remap(gid.0);
            char_to_gid.insert(ch, new_gid);
            let w = face
                .glyph_hor_advance(gid)
                .map(|adv| scale(adv as f32))
                .unwrap_or(0.0);
            gid_widths.push((new_gid, w));
        }
    }
    gid_widths.sort_by_key(|&(gid, _)| gid);
    gid_widths.dedup_by_key(|&mut (gid, _)| gid);

    let subset_data = subsetter::subset(font_data, face_index, &remapper).unwrap_or_else(|e| {
        log::warn!("Font subsetting failed for {font_name}: {e}; embedding full font");
        font_data.to_vec()
    });

    let ps_name = font_name.replace(' ', "");
    let descriptor_ref = alloc();
    let data_ref = alloc();
    let cid_font_ref = alloc();
    let tounicode_ref = alloc();

    let data_len = i32::try_from(subset_data.len()).ok()?;
    pdf.stream(data_ref, &subset_data)
        .pair(Name(b"Length1"), data_len);

    pdf.font_descriptor(descriptor_ref)
        .name(Name(ps_name.as_bytes()))
        .flags(pdf_writer::types::FontFlags::NON_SYMBOLIC)
        .bbox(bbox)
        .italic_angle(face.italic_angle())
        .ascent(scale(face.ascender() as f32))
        .descent(scale(face.descender() as f32))
        .cap_height(
            face.capital_height()
                .map(|h| scale(h as f32))
                .unwrap_or(700.0),
        )
        .stem_v(80.0)
        .font_file2(data_ref);

    let system_info = || pdf_writer::types::SystemInfo {
        registry: pdf_writer::Str(b"Adobe"),
        ordering: pdf_writer::Str(b"Identity"),
        supplement: 0,
    };
    {
        let mut cid = pdf.cid_font(cid_font_ref);
        cid.subtype(pdf_writer::types::CidFontType::Type2);
        cid.base_font(Name(ps_name.as_bytes()));
        cid.system_info(system_info());
        cid.font_descriptor(descriptor_ref);
        cid.default_width(0.0);
        cid.cid_to_gid_map_predefined(Name(b"Identity"));
        if !gid_widths.is_empty() {
            let mut w = cid.widths();
            for &(gid, width) in &gid_widths {
                w.consecutive(gid, [width]);
            }
        }
    }

    let cmap_name = format!("{ps_name}-UTF16");
    let mut cmap = pdf_writer::types::UnicodeCmap::new(Name(cmap_name.as_bytes()), system_info());
    for (&ch, &new_gid) in &char_to_gid {
        cmap.pair(new_gid, ch);
    }
    let cmap_data = cmap.finish();
    pdf.stream(tounicode_ref, cmap_data.as_slice());

    pdf.type0_font(font_ref)
        .base_font(Name(ps_name.as_bytes()))
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(cid_font_ref)
        .to_unicode(tounicode_ref);

    Some(char_to_gid)
}
