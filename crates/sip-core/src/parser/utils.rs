// Line-level helpers used before the grammar rules run.

/// Splits a header block into logical lines.
///
/// Accepts CRLF or bare LF. A line starting with SP or HTAB continues the
/// previous one and is joined with a single space.
pub fn unfold_lines(block: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in block.split('\n') {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        let is_continuation = line.starts_with(' ') || line.starts_with('\t');
        match lines.last_mut() {
            Some(prev) if is_continuation => {
                let folded = line.trim_start_matches([' ', '\t']);
                if !folded.is_empty() {
                    let trimmed_len = prev.trim_end_matches([' ', '\t']).len();
                    prev.truncate(trimmed_len);
                    prev.push(' ');
                    prev.push_str(folded);
                }
            }
            _ => {
                if !line.is_empty() {
                    lines.push(line.to_string());
                }
            }
        }
    }
    lines
}

/// Splits a list header value on top-level commas.
///
/// Commas inside quoted strings or angle brackets never split. Empty
/// elements are dropped.
pub fn split_list_values(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut angle_depth = 0usize;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        if in_quotes {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_quotes = false;
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            '<' => angle_depth += 1,
            '>' => angle_depth = angle_depth.saturating_sub(1),
            ',' if angle_depth == 0 => {
                parts.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);

    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}
