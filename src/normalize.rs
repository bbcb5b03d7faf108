//! Turns a loosely-typed document record into a canonical [`Document`].
//!
//! Records come from forms that were written over several years and mix
//! `camelCase` and `snake_case` keys. Every logical field is resolved through
//! [`FieldResolver`] with a fixed priority: camelCase key, snake_case key,
//! hardcoded default. There is no rejection path; anything missing or
//! malformed takes its default.

use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};

use crate::model::{
    DEFAULT_MARGIN_MM, DEFAULT_SIGNATURE_SIZE_MM, Document, Margins, Signer, TextAlign, Visibility,
};

/// Ordered key lookup over one JSON object.
pub(crate) struct FieldResolver<'a> {
    obj: Option<&'a Map<String, Value>>,
}

impl<'a> FieldResolver<'a> {
    pub(crate) fn new(value: &'a Value) -> Self {
        Self {
            obj: value.as_object(),
        }
    }

    /// First value among `keys` that is present and not null.
    pub(crate) fn lookup(&self, keys: &[&str]) -> Option<&'a Value> {
        let obj = self.obj?;
        keys.iter()
            .filter_map(|k| obj.get(*k))
            .find(|v| !v.is_null())
    }

    /// First non-empty text among `keys`. Numbers are accepted and stringified;
    /// `""` falls through to the next key like any other absent value, while
    /// whitespace is a present value.
    pub(crate) fn text(&self, keys: &[&str]) -> Option<String> {
        let obj = self.obj?;
        keys.iter().filter_map(|k| obj.get(*k)).find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub(crate) fn text_or(&self, keys: &[&str], default: &str) -> String {
        self.text(keys).unwrap_or_else(|| default.to_string())
    }

    /// Visibility flag: on unless the first present key is literally `false`.
    pub(crate) fn flag(&self, keys: &[&str]) -> bool {
        !matches!(self.lookup(keys), Some(Value::Bool(false)))
    }

    /// Finite number from a JSON number or a numeric string.
    pub(crate) fn number(&self, keys: &[&str]) -> Option<f32> {
        let obj = self.obj?;
        keys.iter()
            .filter_map(|k| obj.get(*k))
            .find_map(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            })
            .map(|n| n as f32)
            .filter(|n| n.is_finite())
    }

    pub(crate) fn list(&self, keys: &[&str]) -> &'a [Value] {
        match self.lookup(keys) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        }
    }
}

fn align(r: &FieldResolver, keys: &[&str], default: TextAlign) -> TextAlign {
    r.text(keys)
        .and_then(|s| TextAlign::parse(&s))
        .unwrap_or(default)
}

/// `DD.MM.YYYY` for recognised date inputs, the raw text otherwise.
fn display_date(raw: Option<String>, today: NaiveDate) -> String {
    let Some(raw) = raw else {
        return today.format("%d.%m.%Y").to_string();
    };
    let trimmed = raw.trim();
    let parsed = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.date_naive())
        })
        .or_else(|| {
            // date prefix of a "YYYY-MM-DDTHH:MM:SS" string without offset
            trimmed
                .get(..10)
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        })
        .or_else(|| NaiveDate::parse_from_str(trimmed, "%d.%m.%Y").ok());
    match parsed {
        Some(d) => d.format("%d.%m.%Y").to_string(),
        None => trimmed.to_string(),
    }
}

fn normalize_signer(value: &Value) -> Signer {
    let r = FieldResolver::new(value);
    Signer {
        name: r.text_or(&["name"], ""),
        title: r.text_or(&["title"], ""),
        signature_url: r.text(&["signatureUrl", "signature_url"]),
        signature_size_mm: r
            .number(&["signatureSizeMm", "signature_size_mm"])
            .unwrap_or(DEFAULT_SIGNATURE_SIZE_MM)
            .max(0.0),
        signature_offset_x_mm: r
            .number(&["signatureOffsetXMm", "signature_offset_x_mm"])
            .unwrap_or(0.0),
        signature_offset_y_mm: r
            .number(&["signatureOffsetYMm", "signature_offset_y_mm"])
            .unwrap_or(0.0),
    }
}

/// Canonical document using today's local date for an absent `referenceDate`.
pub fn normalize(value: &Value) -> Document {
    normalize_with_today(value, chrono::Local::now().date_naive())
}

pub fn normalize_with_today(value: &Value, today: NaiveDate) -> Document {
    let r = FieldResolver::new(value);

    let visibility = Visibility {
        header: r.flag(&["showHeader", "show_header"]),
        date: r.flag(&["showDate", "show_date"]),
        document_number: r.flag(&["showSayi", "show_sayi"]),
        subject: r.flag(&["showKonu", "show_konu"]),
        decision_number: r.flag(&["showKararNo", "show_karar_no"]),
        receiver: r.flag(&["showReceiver", "show_receiver"]),
        signatures: r.flag(&["showSignatures", "show_signatures"]),
        footer: r.flag(&["showFooter", "show_footer"]),
    };

    Document {
        document_number: r.text_or(&["documentNumber", "document_number"], ""),
        decision_number: r.text_or(&["decisionNumber", "decision_number"], ""),
        subject: r.text_or(&["subject"], ""),
        reference_date: display_date(r.text(&["referenceDate", "reference_date"]), today),
        receiver: r.text_or(&["receiver"], ""),
        sender: r.text_or(&["sender"], ""),
        sender_unit: r.text_or(&["senderUnit", "sender_unit"], ""),
        header_title: r.text_or(&["headerTitle", "header_title"], ""),
        header_org_name: r.text_or(&["headerOrgName", "header_org_name"], ""),
        logo_url: r.text(&["logoUrl", "logo_url"]),
        right_logo_url: r.text(&["rightLogoUrl", "right_logo_url"]),
        footer_org_name: r.text_or(&["footerOrgName", "footer_org_name"], ""),
        footer_address: r.text_or(&["footerAddress", "footer_address"], ""),
        footer_contact: r.text_or(&["footerContact", "footer_contact"], ""),
        footer_phone: r.text_or(&["footerPhone", "footer_phone"], ""),
        content: r.text_or(&["content"], ""),
        signers: r.list(&["signers"]).iter().map(normalize_signer).collect(),
        visibility,
        text_align: align(&r, &["textAlign", "text_align"], TextAlign::Justify),
        receiver_align: align(&r, &["receiverAlign", "receiver_align"], TextAlign::Left),
    }
}

/// Margins prop (`{top, right, bottom, left}` in mm). Absent, negative or
/// non-numeric sides take the 25mm default.
pub fn margins(value: &Value) -> Margins {
    let r = FieldResolver::new(value);
    let side = |key: &str| {
        r.number(&[key])
            .filter(|mm| *mm >= 0.0)
            .unwrap_or(DEFAULT_MARGIN_MM)
    };
    Margins {
        top: side("top"),
        right: side("right"),
        bottom: side("bottom"),
        left: side("left"),
    }
}
