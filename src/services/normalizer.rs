// Cleanup steps are each a fixed point of themselves, so `normalize` is idempotent.

/// Appended whenever text is cut short.
pub const ELLIPSIS: &str = "...";

pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .replace("\r\n", "\n")
        .chars()
        .filter_map(|c| match c {
            '\r' => Some('\n'),
            '\t' => Some(' '),
            '\u{FEFF}' | '\u{200B}' => None,
            c if c.is_control() && c != '\n' => None,
            c => Some(c),
        })
        .collect();

    let mut lines: Vec<&str> = Vec::new();
    let mut blank_run = 0usize;
    for line in cleaned.split('\n').map(str::trim_end) {
        if line.is_empty() {
            blank_run += 1;
            continue;
        }
        if !lines.is_empty() {
            // 1 or 2 blank lines survive, longer runs become one
            let keep = if blank_run >= 3 { 1 } else { blank_run };
            lines.extend(std::iter::repeat_n("", keep));
        }
        blank_run = 0;
        lines.push(line);
    }

    lines.join("\n")
}

/// Split on blank lines; the lines of one paragraph are trimmed and joined
/// with a single space.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }

    paragraphs
}

/// Cap `text` at `cap` characters. When it has to cut, the result ends in
/// [`ELLIPSIS`] and still fits in `cap`.
pub fn truncate_chars(text: &str, cap: usize) -> String {
    if text.chars().count() <= cap {
        return text.to_string();
    }
    let ellipsis_len = ELLIPSIS.chars().count();
    if cap <= ellipsis_len {
        return ELLIPSIS.chars().take(cap).collect();
    }
    let mut out: String = text.chars().take(cap - ellipsis_len).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Collapse every whitespace run to one space, then cap like [`truncate_chars`].
pub fn shorten(text: &str, cap: usize) -> String {
    truncate_chars(&collapse_whitespace(text), cap)
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The last `n` characters of `text`.
pub fn tail_chars(text: &str, n: usize) -> &str {
    let total = text.chars().count();
    if total <= n {
        return text;
    }
    match text.char_indices().nth(total - n) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

/// The first `n` characters of `text`.
pub fn head_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strips_control_characters() {
        assert_eq!(normalize("他\u{0007}说\u{FEFF}道"), "他说道");
    }

    #[test]
    fn test_crlf_and_trailing_whitespace() {
        assert_eq!(normalize("第一行  \r\n第二行\t\r\n"), "第一行\n第二行");
    }

    #[test]
    fn test_collapses_long_blank_runs_only() {
        assert_eq!(normalize("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(normalize("a\n\n\nb"), "a\n\n\nb");
        assert_eq!(normalize("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_drops_edge_blank_lines() {
        assert_eq!(normalize("\n\n  \n正文\n\n"), "正文");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_leading_indentation_is_kept() {
        assert_eq!(normalize("\u{3000}\u{3000}开头"), "\u{3000}\u{3000}开头");
    }

    #[test]
    fn test_split_paragraphs() {
        let paragraphs = split_paragraphs("一行\n  二行\n\n\n三行\n");
        assert_eq!(paragraphs, vec!["一行 二行".to_string(), "三行".to_string()]);
    }

    #[test]
    fn test_truncate_chars_respects_cap() {
        assert_eq!(truncate_chars("短", 5), "短");
        assert_eq!(truncate_chars("一二三四五六七", 5), "一二...");
        assert_eq!(truncate_chars("一二三四五六七", 2), "..");
    }

    #[test]
    fn test_tail_and_head() {
        assert_eq!(tail_chars("一二三四", 2), "三四");
        assert_eq!(tail_chars("一二", 5), "一二");
        assert_eq!(head_chars("一二三四", 3), "一二三");
        assert_eq!(head_chars("一二", 3), "一二");
    }

    proptest! {
        #[test]
        fn test_normalize_is_idempotent(s in "[a-z第章 \t\r\n\u{3000}\u{0001}\u{FEFF}。]{0,80}") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn test_truncate_never_exceeds_cap(s in "\\PC{0,60}", cap in 0usize..40) {
            prop_assert!(truncate_chars(&s, cap).chars().count() <= cap);
        }
    }
}
