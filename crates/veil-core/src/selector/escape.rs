//! CSS identifier escaping (CSSOM `CSS.escape`).

/// Escape a string for use as a CSS identifier or inside a quoted attribute value.
///
/// ```
/// use veil_core::css_escape;
///
/// assert_eq!(css_escape("main-nav"), "main-nav");
/// assert_eq!(css_escape("1st"), "\\31 st");
/// assert_eq!(css_escape("a:b"), "a\\:b");
/// ```
pub fn css_escape(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        let code = c as u32;
        if code == 0 {
            out.push('\u{FFFD}');
        } else if (0x01..=0x1F).contains(&code) || code == 0x7F {
            push_hex(&mut out, code);
        } else if i == 0 && c.is_ascii_digit() {
            push_hex(&mut out, code);
        } else if i == 1 && c.is_ascii_digit() && chars[0] == '-' {
            push_hex(&mut out, code);
        } else if i == 0 && c == '-' && chars.len() == 1 {
            out.push_str("\\-");
        } else if code >= 0x80 || c == '-' || c == '_' || c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }

    out
}

fn push_hex(out: &mut String, code: u32) {
    out.push_str(&format!("\\{:x} ", code));
}
