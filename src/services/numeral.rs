//! Chinese / Arabic numeral conversion for chapter and volume headers.

/// Value of one numeral glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Glyph {
    Digit(u64),
    Magnitude(u64),
}

fn glyph(c: char) -> Option<Glyph> {
    let g = match c {
        '零' | '〇' => Glyph::Digit(0),
        '一' => Glyph::Digit(1),
        '二' | '两' => Glyph::Digit(2),
        '三' => Glyph::Digit(3),
        '四' => Glyph::Digit(4),
        '五' => Glyph::Digit(5),
        '六' => Glyph::Digit(6),
        '七' => Glyph::Digit(7),
        '八' => Glyph::Digit(8),
        '九' => Glyph::Digit(9),
        '十' => Glyph::Magnitude(10),
        '百' => Glyph::Magnitude(100),
        '千' => Glyph::Magnitude(1_000),
        '万' => Glyph::Magnitude(10_000),
        '亿' => Glyph::Magnitude(100_000_000),
        '0'..='9' => Glyph::Digit(u64::from(c as u32 - '0' as u32)),
        '０'..='９' => Glyph::Digit(u64::from(c as u32 - '０' as u32)),
        _ => return None,
    };
    Some(g)
}

/// Fold a glyph sequence into an integer, left to right.
///
/// Unrecognized glyphs are skipped, so `"第十二章"` and `"十二"` both give 12
/// and a sequence with no numeral glyphs gives 0.
pub fn to_integer(glyphs: &str) -> u64 {
    let mut total: u64 = 0;
    let mut current: u64 = 0;

    for c in glyphs.chars() {
        match glyph(c) {
            Some(Glyph::Digit(d)) => {
                current = current.saturating_mul(10).saturating_add(d);
            }
            Some(Glyph::Magnitude(m)) => {
                if current == 0 {
                    current = 1;
                }
                total = total.saturating_add(current.saturating_mul(m));
                current = 0;
            }
            None => {}
        }
    }

    total.saturating_add(current)
}

/// Whether the sequence spells zero on purpose (`零`, `〇`, `0`) rather than
/// containing nothing recognizable.
pub(crate) fn is_explicit_zero(glyphs: &str) -> bool {
    let mut saw_zero = false;
    for c in glyphs.chars() {
        match glyph(c) {
            Some(Glyph::Digit(0)) => saw_zero = true,
            Some(_) => return false,
            None => {}
        }
    }
    saw_zero
}

const DIGITS: [char; 10] = ['零', '一', '二', '三', '四', '五', '六', '七', '八', '九'];

/// Render an integer as conventional Chinese numerals (`12` -> `十二`,
/// `105` -> `一百零五`, `10005` -> `一万零五`).
pub fn to_glyphs(n: u64) -> String {
    if n == 0 {
        return DIGITS[0].to_string();
    }

    // Split into 4-digit sections, least significant first.
    let mut sections = Vec::new();
    let mut rest = n;
    while rest > 0 {
        sections.push(rest % 10_000);
        rest /= 10_000;
    }

    let mut out = String::new();
    let mut pending_zero = false;
    for (idx, &section) in sections.iter().enumerate().rev() {
        if section == 0 {
            pending_zero = !out.is_empty();
            continue;
        }
        if !out.is_empty() && (pending_zero || section < 1_000) {
            out.push(DIGITS[0]);
        }
        pending_zero = false;
        out.push_str(&section_glyphs(section));
        out.push_str(section_unit(idx));
    }

    // 一十二 reads as 十二
    if (10..20).contains(&n) {
        out = out.trim_start_matches('一').to_string();
    }
    out
}

fn section_unit(idx: usize) -> &'static str {
    match idx {
        0 => "",
        1 => "万",
        2 => "亿",
        _ => "万亿",
    }
}

fn section_glyphs(section: u64) -> String {
    const UNITS: [&str; 4] = ["千", "百", "十", ""];
    let digits = [
        section / 1_000,
        section / 100 % 10,
        section / 10 % 10,
        section % 10,
    ];

    let mut out = String::new();
    let mut zero_run = false;
    for (pos, &d) in digits.iter().enumerate() {
        if d == 0 {
            zero_run = !out.is_empty();
            continue;
        }
        if zero_run {
            out.push(DIGITS[0]);
            zero_run = false;
        }
        out.push(DIGITS[d as usize]);
        out.push_str(UNITS[pos]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_simple_values() {
        assert_eq!(to_integer("一"), 1);
        assert_eq!(to_integer("十"), 10);
        assert_eq!(to_integer("十二"), 12);
        assert_eq!(to_integer("二十"), 20);
        assert_eq!(to_integer("一百零五"), 105);
        assert_eq!(to_integer("一千零一十"), 1010);
        assert_eq!(to_integer("九千九百九十九"), 9999);
        assert_eq!(to_integer("两百"), 200);
    }

    #[test]
    fn test_arabic_and_fullwidth_digits() {
        assert_eq!(to_integer("12"), 12);
        assert_eq!(to_integer("１２３"), 123);
    }

    #[test]
    fn test_unrecognized_glyphs_are_skipped() {
        assert_eq!(to_integer("第十二章"), 12);
        assert_eq!(to_integer("章节"), 0);
        assert_eq!(to_integer(""), 0);
    }

    #[test]
    fn test_explicit_zero() {
        assert!(is_explicit_zero("零"));
        assert!(is_explicit_zero("0"));
        assert!(!is_explicit_zero(""));
        assert!(!is_explicit_zero("章"));
        assert!(!is_explicit_zero("十"));
    }

    #[test]
    fn test_to_glyphs() {
        assert_eq!(to_glyphs(0), "零");
        assert_eq!(to_glyphs(7), "七");
        assert_eq!(to_glyphs(12), "十二");
        assert_eq!(to_glyphs(20), "二十");
        assert_eq!(to_glyphs(105), "一百零五");
        assert_eq!(to_glyphs(1010), "一千零一十");
        assert_eq!(to_glyphs(9999), "九千九百九十九");
        assert_eq!(to_glyphs(10005), "一万零五");
    }

    proptest! {
        /// Every value below ten thousand survives rendering and parsing.
        #[test]
        fn test_glyphs_round_trip_below_ten_thousand(n in 1u64..10_000) {
            prop_assert_eq!(to_integer(&to_glyphs(n)), n);
        }

        #[test]
        fn test_non_numeral_text_is_zero(s in "[a-zA-Z章节回卷 ]{0,20}") {
            prop_assert_eq!(to_integer(&s), 0);
        }
    }
}
