use serde::Serialize;

/// CSS reference pixels per millimeter (96 dpi).
pub const PX_PER_MM: f32 = 3.779_527_6;
/// PDF points per CSS pixel.
pub const PT_PER_PX: f32 = 0.75;

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;

pub const DEFAULT_MARGIN_MM: f32 = 25.0;
pub const DEFAULT_SIGNATURE_SIZE_MM: f32 = 50.0;

pub fn mm_to_px(mm: f32) -> f32 {
    mm * PX_PER_MM
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Center,
    Right,
    Justify,
}

impl TextAlign {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "start" => Some(TextAlign::Left),
            "center" | "centre" => Some(TextAlign::Center),
            "right" | "end" => Some(TextAlign::Right),
            "justify" => Some(TextAlign::Justify),
            _ => None,
        }
    }
}

/// Page margins in millimeters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Default for Margins {
    fn default() -> Self {
        Self::uniform(DEFAULT_MARGIN_MM)
    }
}

impl Margins {
    pub fn uniform(mm: f32) -> Self {
        Self {
            top: mm,
            right: mm,
            bottom: mm,
            left: mm,
        }
    }

    /// Width of the content box in px.
    pub fn content_width_px(&self) -> f32 {
        mm_to_px(PAGE_WIDTH_MM - self.left - self.right).max(1.0)
    }
}

/// Which sections of the letter are drawn. Every flag is on unless the
/// document explicitly turns it off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Visibility {
    pub header: bool,
    pub date: bool,
    pub document_number: bool,
    pub subject: bool,
    pub decision_number: bool,
    pub receiver: bool,
    pub signatures: bool,
    pub footer: bool,
}

impl Default for Visibility {
    fn default() -> Self {
        Self {
            header: true,
            date: true,
            document_number: true,
            subject: true,
            decision_number: true,
            receiver: true,
            signatures: true,
            footer: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Signer {
    pub name: String,
    pub title: String,
    pub signature_url: Option<String>,
    pub signature_size_mm: f32,
    pub signature_offset_x_mm: f32,
    pub signature_offset_y_mm: f32,
}

/// Canonical, fully defaulted view of a document record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Document {
    pub document_number: String,
    pub decision_number: String,
    pub subject: String,
    /// Display form, `DD.MM.YYYY` when the input date parsed.
    pub reference_date: String,

    pub receiver: String,
    pub sender: String,
    pub sender_unit: String,

    pub header_title: String,
    pub header_org_name: String,
    pub logo_url: Option<String>,
    pub right_logo_url: Option<String>,

    pub footer_org_name: String,
    pub footer_address: String,
    pub footer_contact: String,
    pub footer_phone: String,

    pub content: String,
    pub signers: Vec<Signer>,

    pub visibility: Visibility,
    pub text_align: TextAlign,
    pub receiver_align: TextAlign,
}

impl Document {
    /// True when the signature row takes part in layout.
    pub fn has_signature_block(&self) -> bool {
        self.visibility.signatures && !self.signers.is_empty()
    }

    pub fn has_logo(&self) -> bool {
        self.logo_url.is_some() || self.right_logo_url.is_some()
    }
}
