//! Markdown formatting helpers for the outline renderer.

/// Format a heading with the specified level
pub fn heading(level: u8, text: &str) -> String {
    let hashes = "#".repeat(level as usize);
    format!("{} {}\n\n", hashes, text)
}

/// Format a paragraph; consecutive lines stay in the same paragraph
pub fn paragraph(text: &str) -> String {
    format!("{}\n\n", text.trim_end())
}

/// Format italic text
pub fn italic(text: &str) -> String {
    format!("*{}*", text)
}

/// Escape characters that would otherwise start markup
pub fn escape(text: &str) -> String {
    let inline = text
        .replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace('*', "\\*")
        .replace('_', "\\_")
        .replace('[', "\\[")
        .replace(']', "\\]");
    inline
        .split('\n')
        .map(escape_line_start)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Neutralize a heading, quote, list or rule marker at the start of a line
fn escape_line_start(line: &str) -> String {
    let body = line.trim_start();
    let indent = &line[..line.len() - body.len()];

    if body.starts_with(['#', '>', '-', '+', '=', '|']) {
        return format!("{indent}\\{body}");
    }

    // Ordered list item: "12. text" or "3) text"
    let digits = body.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 && matches!(body.as_bytes().get(digits), Some(b'.' | b')')) {
        return format!("{indent}{}\\{}", &body[..digits], &body[digits..]);
    }

    line.to_string()
}
