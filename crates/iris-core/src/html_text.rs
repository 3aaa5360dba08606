//! HTML text escaping for notification rendering.
//!
//! Every user-controlled string interpolated into notification HTML goes
//! through [`escape_html`]; only markup authored by the renderer itself is
//! emitted unescaped.

/// Escapes the five HTML metacharacters in `text`.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
