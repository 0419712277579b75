//! Title → file name and title → link text encoding.

/// Percent-encode characters that are illegal in file names on common platforms.
///
/// Each of `/ \ < > ? : " | *` is replaced by its `%XX` form; everything
/// else, including non-ASCII text, is kept. The result is always a single
/// path component.
pub fn sanitize_file_name(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        match c {
            '/' => out.push_str("%2F"),
            '\\' => out.push_str("%5C"),
            '<' => out.push_str("%3C"),
            '>' => out.push_str("%3E"),
            '?' => out.push_str("%3F"),
            ':' => out.push_str("%3A"),
            '"' => out.push_str("%22"),
            '|' => out.push_str("%7C"),
            '*' => out.push_str("%2A"),
            _ => out.push(c),
        }
    }

    // `.` and `..` would escape the parent directory
    match out.as_str() {
        "." => "%2E".to_string(),
        ".." => "%2E%2E".to_string(),
        _ => out,
    }
}

/// Encode spaces and parentheses so the text can sit inside a markdown link target.
pub fn encode_link_component(text: &str) -> String {
    text.replace(' ', "%20")
        .replace('(', "%28")
        .replace(')', "%29")
}
