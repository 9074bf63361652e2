/// Escapes the characters that matter in an HTML text or attribute context.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn sanitize_email(email: &str) -> String {
    escape_html(&email.trim().to_lowercase())
}

/// Trims, collapses internal whitespace, and escapes.
pub fn sanitize_name(name: &str) -> String {
    let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
    escape_html(&collapsed)
}

/// Splits a full name into CRM first/last name. The last name is everything
/// after the first token, or `None` for single-token names.
pub fn split_name(full_name: &str) -> (String, Option<String>) {
    let mut parts = full_name.split_whitespace();
    let first = parts
        .next()
        .map(str::to_string)
        .unwrap_or_else(|| full_name.to_string());
    let rest = parts.collect::<Vec<_>>().join(" ");
    (first, if rest.is_empty() { None } else { Some(rest) })
}
