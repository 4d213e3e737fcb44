//! Length-bounded synopsis built from whole sentences.

use super::normalizer::{self, ELLIPSIS};

/// Brackets, quotes and decorative marks removed before scanning.
const STRIPPED: &[char] = &[
    '\u{3000}', '【', '】', '（', '）', '《', '》', '“', '”', '‘', '’', '…', '「', '」', '"',
];

const SENTENCE_END: &[char] = &['。', '！', '？', '!', '?', '；'];

/// Accumulate whole sentences of `text` while they fit in `cap` characters.
///
/// The ellipsis is appended when a sentence was left out. When the first
/// sentence alone does not fit, or there is no sentence-ending punctuation at
/// all, the text is cut at exactly `cap` characters and the ellipsis is always
/// appended.
pub fn extract_summary(text: &str, cap: usize) -> String {
    let cleaned: String = normalizer::collapse_whitespace(text)
        .chars()
        .filter(|c| !STRIPPED.contains(c))
        .collect();
    let cleaned = cleaned.trim();

    let sentences = split_sentences(cleaned);
    let mut summary = String::new();
    let mut used = 0usize;
    let mut consumed = 0usize;

    for sentence in &sentences {
        // an unterminated tail is never taken as a sentence
        if !sentence.ends_with(SENTENCE_END) {
            break;
        }
        let len = sentence.chars().count();
        if used + len > cap {
            break;
        }
        summary.push_str(sentence);
        used += len;
        consumed += 1;
    }

    if consumed == 0 {
        let mut cut = normalizer::head_chars(cleaned, cap).trim_end().to_string();
        cut.push_str(ELLIPSIS);
        return cut;
    }

    let mut summary = summary.trim().to_string();
    if consumed < sentences.len() {
        summary.push_str(ELLIPSIS);
    }
    summary
}

/// Split after every run of sentence-ending punctuation. The last piece may
/// be unterminated.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if !SENTENCE_END.contains(&c) {
            continue;
        }
        let mut end = idx + c.len_utf8();
        while let Some(&(next_idx, next)) = chars.peek() {
            if !SENTENCE_END.contains(&next) {
                break;
            }
            end = next_idx + next.len_utf8();
            chars.next();
        }
        sentences.push(&text[start..end]);
        start = end;
    }
    if start < text.len() && !text[start..].trim().is_empty() {
        sentences.push(&text[start..]);
    }

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_takes_whole_sentences_until_cap() {
        let text = "他推开门。屋里很暗！谁在那里？";
        assert_eq!(extract_summary(text, 100), "他推开门。屋里很暗！谁在那里？");
        assert_eq!(extract_summary(text, 11), "他推开门。屋里很暗！...");
    }

    #[test]
    fn test_strips_brackets_and_quotes() {
        let text = "“你好。”【他】说。";
        assert_eq!(extract_summary(text, 100), "你好。他说。");
    }

    #[test]
    fn test_no_punctuation_cuts_at_cap() {
        let text = "一二三四五六七八九十";
        assert_eq!(extract_summary(text, 4), "一二三四...");
    }

    #[test]
    fn test_first_sentence_longer_than_cap() {
        let text = "这是一个非常非常长的句子。短句。";
        assert_eq!(extract_summary(text, 5), "这是一个非...");
    }

    #[test]
    fn test_unterminated_tail_marks_ellipsis() {
        assert_eq!(extract_summary("开头。结尾没有句号", 100), "开头。...");
    }

    #[test]
    fn test_repeated_terminators_stay_with_sentence() {
        assert_eq!(extract_summary("什么？！好。", 100), "什么？！好。");
    }

    proptest! {
        /// Summaries end at a sentence boundary or exactly at the cap.
        #[test]
        fn test_never_splits_inside_sentence(
            s in "[一二三四五。！？ ]{0,120}",
            cap in 1usize..60,
        ) {
            let summary = extract_summary(&s, cap);
            let body = summary.strip_suffix(ELLIPSIS).unwrap_or(&summary);
            let ends_on_punct = body.ends_with(SENTENCE_END);
            prop_assert!(ends_on_punct || body.chars().count() <= cap);
            if ends_on_punct && summary.ends_with(ELLIPSIS) {
                prop_assert!(body.chars().count() <= cap);
            }
        }
    }
}
