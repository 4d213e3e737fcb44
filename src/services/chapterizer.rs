use crate::config::{ChapterOrder, Config};
use crate::models::{Chapter, Document, Marker, MarkerKind};
use crate::services::markers::{
    self, CHAPTER_LABEL, CHAPTER_NUMERAL, CHAPTER_TITLE, CHAPTER_VOLUME, Ruleset, VOLUME_LABEL,
    VOLUME_TITLE,
};
use crate::services::{normalizer, numeral};

pub const PREFACE_TITLE: &str = "前言";
pub const WHOLE_TEXT_TITLE: &str = "全文";

/// Parse one novel: normalize, extract metadata, segment into chapters.
///
/// The returned document may have no chapters; callers decide what an empty
/// document means for them.
pub fn build_document(
    genre: &str,
    file_stem: &str,
    raw_text: &str,
    ruleset: &Ruleset,
    config: &Config,
) -> Document {
    let text = normalizer::normalize(raw_text);
    let markers = markers::find_markers(&text, ruleset);

    let title = ruleset.extract_title(&text, file_stem);
    let author = ruleset.extract_author(&text);
    let theme = ruleset.extract_theme(
        &text,
        config.theme_length_cap,
        config.theme_fallback_paragraphs,
    );
    let chapters = segment(&text, &markers, config);

    tracing::debug!(
        title = %title,
        author = %author,
        chapters = chapters.len(),
        "parsed document"
    );

    Document {
        genre: genre.to_string(),
        title,
        author,
        theme,
        chapters,
    }
}

/// Turn chapter and volume markers into chapters.
///
/// Text before the first header becomes chapter 0 when long enough. Each
/// chapter's content runs from the end of its header to the next header.
/// Chapters shorter than `min_chapter_length` are dropped; duplicate numbers
/// are kept as separate chapters.
pub fn segment(text: &str, markers: &[Marker], config: &Config) -> Vec<Chapter> {
    // an empty chapter is never kept, whatever the threshold
    let min_len = config.min_chapter_length.max(1);
    let structural: Vec<&Marker> = markers
        .iter()
        .filter(|m| matches!(m.kind, MarkerKind::Chapter | MarkerKind::Volume))
        .collect();

    if !structural.iter().any(|m| m.kind == MarkerKind::Chapter) {
        let whole = normalizer::normalize(text);
        let len = whole.chars().count();
        if len < min_len {
            tracing::debug!(len, min_len, "no chapter headers and text too short");
            return Vec::new();
        }
        tracing::debug!("no chapter headers, keeping the whole text as one chapter");
        return vec![Chapter::new(1, WHOLE_TEXT_TITLE, whole)];
    }

    let mut chapters = Vec::new();

    let first_start = structural.first().map_or(0, |m| m.span.start);
    let preface = normalizer::normalize(&text[..first_start]);
    if preface.chars().count() >= min_len {
        chapters.push(Chapter::new(0, PREFACE_TITLE, preface));
    }

    let mut volume: Option<String> = None;
    let mut previous: Option<u64> = None;

    for (idx, marker) in structural.iter().enumerate() {
        let end = structural
            .get(idx + 1)
            .map_or(text.len(), |next| next.span.start);
        let body = &text[marker.span.end..end];

        if marker.kind == MarkerKind::Volume {
            volume = Some(join_heading(
                marker.capture(VOLUME_LABEL),
                marker.capture(VOLUME_TITLE),
            ));
            if !body.trim().is_empty() {
                tracing::debug!(volume = ?volume, "dropping text between volume and chapter headers");
            }
            continue;
        }

        if !marker.capture(CHAPTER_VOLUME).is_empty() {
            volume = Some(marker.capture(CHAPTER_VOLUME).to_string());
        }

        let number = resolve_number(marker.capture(CHAPTER_NUMERAL), previous);
        previous = Some(number);

        let label = marker.capture(CHAPTER_LABEL);
        let content = normalizer::normalize(body);
        let len = content.chars().count();
        if len < min_len {
            tracing::debug!(header = label, len, min_len, "skipping short chapter");
            continue;
        }

        if chapters.iter().any(|c: &Chapter| c.number == number && number != 0) {
            tracing::debug!(header = label, number, "duplicate chapter number");
        }

        let title = match marker.capture(CHAPTER_TITLE) {
            "" => label,
            fragment => fragment,
        };
        chapters.push(Chapter::new(number, title, content).with_volume(volume.clone()));
    }

    apply_order(&mut chapters, config.chapter_order);
    chapters
}

/// Number for a chapter header. No numeral at all means an explicit prologue
/// (0); a numeral that resolves to 0 without spelling zero is unknown and
/// follows the previous chapter.
fn resolve_number(numeral_glyphs: &str, previous: Option<u64>) -> u64 {
    if numeral_glyphs.is_empty() {
        return 0;
    }
    let number = numeral::to_integer(numeral_glyphs);
    if number == 0 && !numeral::is_explicit_zero(numeral_glyphs) {
        let inferred = previous.map_or(1, |p| p + 1);
        tracing::debug!(glyphs = numeral_glyphs, inferred, "unreadable chapter numeral");
        return inferred;
    }
    number
}

fn apply_order(chapters: &mut [Chapter], order: ChapterOrder) {
    let in_sequence = chapters.windows(2).all(|w| w[0].number <= w[1].number);
    match order {
        ChapterOrder::Document => {}
        ChapterOrder::Numeric => chapters.sort_by_key(|c| c.number),
        // non-decreasing numbers already are numeric order
        ChapterOrder::Auto if in_sequence => {}
        ChapterOrder::Auto => {
            tracing::warn!(
                numbers = ?chapters.iter().map(|c| c.number).collect::<Vec<_>>(),
                "chapter numbers out of sequence, keeping document order"
            );
        }
    }
}

fn join_heading(label: &str, title: &str) -> String {
    if title.is_empty() {
        label.to_string()
    } else {
        format!("{label} {title}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filler(seed: &str) -> String {
        seed.repeat(250 / seed.chars().count() + 1)
    }

    fn config() -> Config {
        Config {
            min_chapter_length: 200,
            ..Config::default()
        }
    }

    fn parse(text: &str, config: &Config) -> Vec<Chapter> {
        let ruleset = Ruleset::new().unwrap();
        let normalized = normalizer::normalize(text);
        let markers = markers::find_markers(&normalized, &ruleset);
        segment(&normalized, &markers, config)
    }

    #[test]
    fn test_three_chapters_in_order() {
        let text = format!(
            "第一章 X\n{}\n第二章 Y\n{}\n第三章 Z\n{}\n",
            filler("甲"),
            filler("乙"),
            filler("丙")
        );
        let chapters = parse(&text, &config());
        let numbers: Vec<u64> = chapters.iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(chapters[0].title, "X");
        assert!(chapters[1].content.starts_with('乙'));
        assert!(!chapters[2].content.contains("第三章"));
    }

    #[test]
    fn test_twelve_resolves_to_twelve() {
        let text = format!("第十二章 风雨\n{}", filler("雨"));
        let chapters = parse(&text, &config());
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].number, 12);
    }

    #[test]
    fn test_short_chapter_is_dropped() {
        let text = format!(
            "第一章 长\n{}\n第二章 短\n{}\n第三章 长\n{}",
            filler("长"),
            "短".repeat(150),
            filler("长")
        );
        let chapters = parse(&text, &config());
        let numbers: Vec<u64> = chapters.iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![1, 3]);
        assert!(chapters.iter().all(|c| c.char_len() >= 200));
    }

    #[test]
    fn test_preface_becomes_chapter_zero() {
        let text = format!("{}\n\n第一章 开始\n{}", filler("序"), filler("文"));
        let chapters = parse(&text, &config());
        assert_eq!(chapters[0].number, 0);
        assert_eq!(chapters[0].title, PREFACE_TITLE);
        assert_eq!(chapters[1].number, 1);
    }

    #[test]
    fn test_short_preface_is_dropped() {
        let text = format!("《书》\n作者：某\n\n第一章 开始\n{}", filler("文"));
        let chapters = parse(&text, &config());
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].number, 1);
    }

    #[test]
    fn test_no_headers_keeps_whole_text() {
        let chapters = parse(&filler("全"), &config());
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].number, 1);
        assert_eq!(chapters[0].title, WHOLE_TEXT_TITLE);
        assert!(parse("太短了", &config()).is_empty());
    }

    #[test]
    fn test_duplicate_numbers_are_not_merged() {
        let text = format!(
            "第一章 A\n{}\n第一章 A\n{}",
            filler("一"),
            filler("二")
        );
        let chapters = parse(&text, &config());
        assert_eq!(chapters.len(), 2);
        assert!(chapters.iter().all(|c| c.number == 1));
    }

    #[test]
    fn test_out_of_sequence_keeps_document_order() {
        let text = format!(
            "第三章 C\n{}\n第一章 A\n{}\n第二章 B\n{}",
            filler("丙"),
            filler("甲"),
            filler("乙")
        );
        let auto: Vec<u64> = parse(&text, &config()).iter().map(|c| c.number).collect();
        assert_eq!(auto, vec![3, 1, 2]);

        let numeric = Config {
            chapter_order: ChapterOrder::Numeric,
            ..config()
        };
        let sorted: Vec<u64> = parse(&text, &numeric).iter().map(|c| c.number).collect();
        assert_eq!(sorted, vec![1, 2, 3]);
    }

    #[test]
    fn test_volumes_are_recorded_and_not_content() {
        let text = format!(
            "第一卷 风起\n第一章 A\n{}\n第二卷 云涌\n第二章 B\n{}",
            filler("甲"),
            filler("乙")
        );
        let chapters = parse(&text, &config());
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].volume.as_deref(), Some("第一卷 风起"));
        assert_eq!(chapters[1].volume.as_deref(), Some("第二卷 云涌"));
        assert!(!chapters[0].content.contains("第二卷"));
    }

    #[test]
    fn test_prologue_and_unknown_numerals() {
        let text = format!(
            "楔子\n{}\nChapter 4 Four\n{}",
            filler("楔"),
            filler("四")
        );
        let chapters = parse(&text, &config());
        assert_eq!(chapters[0].number, 0);
        assert_eq!(chapters[0].title, "楔子");
        assert_eq!(chapters[1].number, 4);

        assert_eq!(resolve_number("第", Some(4)), 5);
        assert_eq!(resolve_number("零", Some(4)), 0);
        assert_eq!(resolve_number("", Some(4)), 0);
    }

    #[test]
    fn test_empty_chapters_are_dropped_even_without_threshold() {
        let unbounded = Config {
            min_chapter_length: 0,
            ..config()
        };
        let chapters = parse("第一章 甲\n第二章 乙\n正文内容。", &unbounded);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].number, 2);
        assert_eq!(chapters[0].content, "正文内容。");

        assert!(parse("", &unbounded).is_empty());
    }

    #[test]
    fn test_build_document_metadata() {
        let ruleset = Ruleset::new().unwrap();
        let text = format!(
            "《星河》\n作者：无名\n内容简介：\n少年远行。\n\n\n第一章 启程\n{}",
            filler("行")
        );
        let doc = build_document("科幻", "xinghe", &text, &ruleset, &config());
        assert_eq!(doc.genre, "科幻");
        assert_eq!(doc.title, "星河");
        assert_eq!(doc.author, "无名");
        assert_eq!(doc.theme, "少年远行。");
        assert_eq!(doc.chapters.len(), 1);
    }
}
