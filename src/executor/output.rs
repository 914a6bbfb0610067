//! Helper output handling.

/// Maximum length of a single line kept from helper output.
const MAX_LINE_LENGTH: usize = 200;

/// Maximum total length of sanitized output.
const MAX_TOTAL_LENGTH: usize = 1000;

/// Sanitize helper output for inclusion in an outcome message.
///
/// Trims surrounding whitespace, keeps at most `max_lines` lines, and caps
/// line and total length. Truncation respects UTF-8 boundaries.
pub fn sanitize_output(output: &str, max_lines: usize) -> String {
    let output = output.trim();
    let mut result = String::new();

    for line in output.lines().take(max_lines) {
        let line = line.trim_end();
        let truncated = if line.len() > MAX_LINE_LENGTH {
            format!("{}...", truncate_at_boundary(line, MAX_LINE_LENGTH))
        } else {
            line.to_string()
        };

        if result.len() + truncated.len() > MAX_TOTAL_LENGTH {
            result.push_str("...[truncated]");
            return result;
        }

        if !result.is_empty() {
            result.push('\n');
        }
        result.push_str(&truncated);
    }

    if output.lines().count() > max_lines {
        result.push_str("\n...[additional output truncated]");
    }

    result
}

/// Longest prefix of `s` no longer than `max` bytes that ends on a char boundary.
fn truncate_at_boundary(s: &str, max: usize) -> &str {
    let mut end = max.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
