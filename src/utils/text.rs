use ammonia::Builder;
use std::collections::HashSet;

/// Strips every HTML tag from user-supplied text and trims the result.
///
/// Post and comment bodies are rendered as plain text, so unlike a rich-text
/// whitelist nothing is kept. Text content between tags survives; `<script>`
/// and `<style>` contents are dropped entirely. The result is stored as text,
/// not HTML: `&`, `<` and `>` come back as written.
pub fn plain_text(input: &str) -> String {
    let cleaned = Builder::default().tags(HashSet::new()).clean(input).to_string();

    unescape_text(&cleaned).trim().to_string()
}

/// Reverses the escaping of HTML text nodes. With no tags allowed these are
/// the only entities the sanitizer emits.
fn unescape_text(html: &str) -> String {
    html.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

/// Normalizes an optional form field: trims it and treats blank input as absent.
pub fn non_blank(input: Option<String>) -> Option<String> {
    input
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
