//! Formatting helpers for Telegram HTML replies.

use chrono::{DateTime, Utc};

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// One decimal, as listed to drivers: `70.0` → `70.0`.
pub fn weight(kg: f64) -> String {
    format!("{kg:.1}")
}

/// Whole rubles with thin grouping: `125000.0` → `125 000`.
pub fn money(amount: f64) -> String {
    let rounded = amount.round();
    let negative = rounded < 0.0;
    let digits = format!("{:.0}", rounded.abs());

    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(ch);
    }
    if negative {
        out.insert(0, '-');
    }
    out
}

pub fn date(ts: &DateTime<Utc>) -> String {
    ts.format("%d.%m.%Y").to_string()
}

pub fn date_time(ts: &DateTime<Utc>) -> String {
    ts.format("%d.%m.%Y %H:%M").to_string()
}
