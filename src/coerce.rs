use serde::{Deserialize, Serialize};
use tracing::warn;

/// A toggle that may also carry a caption, e.g. `data-copyable="Copy me"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoolOrLabel {
    Bool(bool),
    Label(String),
}

impl BoolOrLabel {
    pub fn is_enabled(&self) -> bool {
        match self {
            BoolOrLabel::Bool(flag) => *flag,
            BoolOrLabel::Label(_) => true,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            BoolOrLabel::Label(label) => Some(label),
            BoolOrLabel::Bool(_) => None,
        }
    }

    /// The caption to render, falling back to `default` for plain toggles.
    pub fn label_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.label().unwrap_or(default)
    }
}

impl Default for BoolOrLabel {
    fn default() -> Self {
        BoolOrLabel::Bool(false)
    }
}

/// Line numbering: either a plain toggle or the number of the first line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LineNumbering {
    Bool(bool),
    StartLine(i64),
}

impl LineNumbering {
    /// `StartLine(0)` is falsy, matching how the markup treats it.
    pub fn is_enabled(&self) -> bool {
        match self {
            LineNumbering::Bool(flag) => *flag,
            LineNumbering::StartLine(line) => *line != 0,
        }
    }

    pub fn start_line(&self) -> i64 {
        match self {
            LineNumbering::StartLine(line) => *line,
            LineNumbering::Bool(_) => 1,
        }
    }
}

impl Default for LineNumbering {
    fn default() -> Self {
        LineNumbering::Bool(false)
    }
}

/// Matches the markup boolean grammar: `{true,yes,on,1,""}` and
/// `{false,no,off,0}`, case-insensitively.
pub fn parse_html_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "" | "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Coerces a strictly boolean field. Values outside the grammar enable the
/// toggle: only an explicit falsy word turns it off.
pub fn resolve_tri_boolean(raw: Option<&str>, default: bool) -> bool {
    let Some(raw) = raw else {
        return default;
    };
    match parse_html_bool(raw) {
        Some(flag) => flag,
        None => {
            warn!(target: "config", value = %raw, "not a boolean; treating as enabled");
            true
        }
    }
}

pub fn resolve_bool_or_label(raw: Option<&str>, default: BoolOrLabel) -> BoolOrLabel {
    match raw {
        None => default,
        Some(raw) => match parse_html_bool(raw) {
            Some(flag) => BoolOrLabel::Bool(flag),
            None => BoolOrLabel::Label(raw.to_string()),
        },
    }
}

/// Boolean words toggle numbering; anything else (including `"0"`) is read as
/// the first line number. A malformed number leaves the field unset.
pub fn resolve_number_or_bool(raw: Option<&str>, default: LineNumbering) -> LineNumbering {
    let Some(raw) = raw else {
        return default;
    };
    if raw != "0" {
        if let Some(flag) = parse_html_bool(raw) {
            return LineNumbering::Bool(flag);
        }
    }
    match parse_js_number(raw) {
        Some(value) if value.is_finite() => LineNumbering::StartLine(value.trunc() as i64),
        _ => {
            warn!(target: "config", value = %raw, "not a line number; leaving it unset");
            default
        }
    }
}

/// Parses a number the way a unary plus does in the browser. `None` stands
/// for NaN.
pub fn parse_js_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }

    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = trimmed.strip_prefix(prefix) {
            if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
                return None;
            }
            return u64::from_str_radix(digits, radix).ok().map(|v| v as f64);
        }
    }

    let (sign, unsigned) = if let Some(rest) = trimmed.strip_prefix('-') {
        (-1.0, rest)
    } else if let Some(rest) = trimmed.strip_prefix('+') {
        (1.0, rest)
    } else {
        (1.0, trimmed)
    };

    if unsigned == "Infinity" {
        return Some(sign * f64::INFINITY);
    }

    // Rust also accepts "inf" and "nan" spellings.
    let well_formed = unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        && unsigned
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !well_formed {
        return None;
    }

    unsigned.parse::<f64>().ok().map(|value| sign * value)
}

/// Renders a number the way it would be stringified in the browser.
pub fn js_number_string(value: f64) -> String {
    if value.is_nan() {
        String::from("NaN")
    } else if value.is_infinite() {
        if value > 0.0 {
            String::from("Infinity")
        } else {
            String::from("-Infinity")
        }
    } else if value == 0.0 {
        String::from("0")
    } else {
        format!("{value}")
    }
}
