//! String escaping for SQL literals and HTML output.

/// Escape a string for a backslash-escaping SQL dialect (MySQL).
///
/// # Arguments
/// * `s` - The string to escape
/// * `quote_char` - The quote character the literal will be wrapped in
pub fn escape_string_for_quote(s: &str, quote_char: char) -> String {
    let mut result = String::with_capacity(s.len() * 2);
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            c if c == quote_char => {
                result.push('\\');
                result.push(c);
            }
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\0' => result.push_str("\\0"),
            '\x1a' => result.push_str("\\Z"),
            c => result.push(c),
        }
    }
    result
}

/// Escape a string for a standard SQL literal by doubling the quote character.
pub fn double_quote_char(s: &str, quote_char: char) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        if c == quote_char {
            result.push(c);
        }
        result.push(c);
    }
    result
}

/// Escape `&`, `<`, `>` and `"` for inclusion in HTML.
///
/// Single quotes are left alone (compat quoting).
pub fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            c => result.push(c),
        }
    }
    result
}
