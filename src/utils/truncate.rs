//! Truncation Utilities
//!
//! Keeps upstream error bodies short enough for a log line without splitting
//! a UTF-8 character (Czech diacritics are multi-byte).

/// First `max_bytes` of `content` on a char boundary, with a marker when cut.
pub fn snippet(content: &str, max_bytes: usize) -> String {
    let content = content.trim();
    if content.len() <= max_bytes {
        return content.to_string();
    }

    let mut end = 0;
    for (idx, c) in content.char_indices() {
        let char_end = idx + c.len_utf8();
        if char_end > max_bytes {
            break;
        }
        end = char_end;
    }

    format!("{}... [{} bytes truncated]", &content[..end], content.len() - end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_content_is_untouched() {
        assert_eq!(snippet("  not found \n", 64), "not found");
    }

    #[test]
    fn test_cut_respects_char_boundaries() {
        // 'č' is two bytes; a 3-byte budget must not split the second one
        let out = snippet("čččč", 3);
        assert!(out.starts_with("č..."));
        assert!(out.ends_with("[6 bytes truncated]"));
    }
}
