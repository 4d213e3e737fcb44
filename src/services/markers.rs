use regex::Regex;

use super::normalizer;
use crate::models::{Marker, MarkerKind};

/// Chinese, full-width and ASCII numeral glyphs.
const NUM: &str = "[0-9０-９零〇一二两三四五六七八九十百千万]+";
/// Separator between a header label and its descriptive fragment.
const SEP: &str = "(?:[ \t　]*[-—－~～:：、.·][ \t　]*|[ \t　]+)?";

/// Capture layout of chapter markers.
pub const CHAPTER_LABEL: usize = 0;
pub const CHAPTER_NUMERAL: usize = 1;
pub const CHAPTER_TITLE: usize = 2;
pub const CHAPTER_VOLUME: usize = 3;

/// Capture layout of volume markers.
pub const VOLUME_LABEL: usize = 0;
pub const VOLUME_TITLE: usize = 2;

const MAX_TITLE_CHARS: usize = 30;
const MAX_AUTHOR_CHARS: usize = 30;

/// Fallback author when no rule matches.
pub const UNKNOWN_AUTHOR: &str = "未知";

struct RuleDef {
    name: &'static str,
    kind: MarkerKind,
    pattern: String,
    /// Regex group feeding each marker capture; `None` leaves it empty.
    groups: &'static [Option<usize>],
}

fn default_rules() -> Vec<RuleDef> {
    let ind = "[ \t　]*";
    vec![
        // structural: every occurrence, anchored at line start, bounded tail
        RuleDef {
            name: "volume_and_chapter",
            kind: MarkerKind::Chapter,
            pattern: format!(
                r"(?m)^{ind}((?:第{ind}{NUM}{ind}[卷部])|(?:卷{ind}{NUM}))(?:{ind}[^\n]{{0,30}}?)?[ \t　]+(第{ind}({NUM}){ind}[章回节]){SEP}([^\n]{{0,50}})$"
            ),
            groups: &[Some(2), Some(3), Some(4), Some(1)],
        },
        RuleDef {
            name: "chapter_cn",
            kind: MarkerKind::Chapter,
            pattern: format!(r"(?m)^{ind}(第{ind}({NUM}){ind}[章回节]){SEP}([^\n]{{0,50}})$"),
            groups: &[Some(1), Some(2), Some(3)],
        },
        RuleDef {
            name: "chapter_en",
            kind: MarkerKind::Chapter,
            pattern: format!(r"(?mi)^[ \t]*(chapter[ \t]+([0-9]+)){SEP}([^\n]{{0,50}})$"),
            groups: &[Some(1), Some(2), Some(3)],
        },
        RuleDef {
            name: "prologue",
            kind: MarkerKind::Chapter,
            pattern: format!(r"(?m)^{ind}(序章|楔子|引子|序幕|序言|前言){SEP}([^\n]{{0,50}})$"),
            groups: &[Some(1), None, Some(2)],
        },
        RuleDef {
            name: "volume_cn",
            kind: MarkerKind::Volume,
            pattern: format!(r"(?m)^{ind}(第{ind}({NUM}){ind}[卷部]){SEP}([^\n]{{0,50}})$"),
            groups: &[Some(1), Some(2), Some(3)],
        },
        RuleDef {
            name: "volume_prefix",
            kind: MarkerKind::Volume,
            pattern: format!(r"(?m)^{ind}(卷{ind}({NUM})){SEP}([^\n]{{0,50}})$"),
            groups: &[Some(1), Some(2), Some(3)],
        },
        // metadata: first accepted match, front matter only
        RuleDef {
            name: "title_labelled",
            kind: MarkerKind::Title,
            pattern: format!(r"(?m)^{ind}(?:书名|标题){ind}[：:]{ind}《?([^》\n]{{1,30}}?)》?{ind}$"),
            groups: &[Some(1)],
        },
        RuleDef {
            name: "title_book_quotes",
            kind: MarkerKind::Title,
            pattern: format!(r"(?m)^{ind}《([^》\n]{{1,30}})》"),
            groups: &[Some(1)],
        },
        RuleDef {
            name: "title_lenticular",
            kind: MarkerKind::Title,
            pattern: format!(r"(?m)^{ind}【([^】\n]{{1,30}})】"),
            groups: &[Some(1)],
        },
        RuleDef {
            name: "title_before_author",
            kind: MarkerKind::Title,
            pattern: format!(r"(?m)^{ind}([^\n《》：:]{{1,30}}?){ind}作者{ind}[：:]"),
            groups: &[Some(1)],
        },
        RuleDef {
            name: "author_cn",
            kind: MarkerKind::Author,
            pattern: format!(r"(?m)作者{ind}[：:]{ind}([^\n]+?){ind}$"),
            groups: &[Some(1)],
        },
        RuleDef {
            name: "author_en",
            kind: MarkerKind::Author,
            pattern: r"(?mi)^[ \t]*(?:author|by)[ \t]*[:：][ \t]*([^\n]+?)[ \t]*$".to_string(),
            groups: &[Some(1)],
        },
        RuleDef {
            name: "theme_header",
            kind: MarkerKind::Theme,
            pattern: format!(
                r"(?m)^{ind}[【\[]?(?:内容简介|作品简介|内容提要|作品大纲|简介|文案)[】\]]?{ind}(?:[：:]{ind}|$)"
            ),
            groups: &[],
        },
    ]
}

struct Rule {
    name: &'static str,
    kind: MarkerKind,
    regex: Regex,
    groups: &'static [Option<usize>],
}

impl Rule {
    fn marker(&self, caps: &regex::Captures<'_>) -> Option<Marker> {
        let whole = caps.get(0)?;
        let captures = self
            .groups
            .iter()
            .map(|group| {
                group
                    .and_then(|g| caps.get(g))
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default()
            })
            .collect();
        Some(Marker {
            kind: self.kind,
            span: whole.start()..whole.end(),
            captures,
        })
    }
}

/// Compiled rule table plus the helpers theme extraction needs. Built once
/// and shared read-only by every worker.
pub struct Ruleset {
    rules: Vec<Rule>,
    theme_boundary: Regex,
    theme_cleanup: Vec<Regex>,
}

impl std::fmt::Debug for Ruleset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ruleset")
            .field("rules", &self.rules.iter().map(|r| r.name).collect::<Vec<_>>())
            .finish()
    }
}

impl Ruleset {
    pub fn new() -> Result<Self, regex::Error> {
        let rules = default_rules()
            .into_iter()
            .map(|def| {
                Ok(Rule {
                    name: def.name,
                    kind: def.kind,
                    regex: Regex::new(&def.pattern)?,
                    groups: def.groups,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        let ind = "[ \t　]*";
        let theme_boundary = Regex::new(&format!(
            r"(?m)(?:^{ind}第{ind}{NUM}{ind}[卷部章回节])|(?:^{ind}(?:序章|楔子|引子|序幕|序言|前言))|(?:\n\n\n)|(?:^{ind}[-=*_~—＝－]{{4,}}{ind}$)|(?:^{ind}正文{ind}(?:开始)?{ind}$)"
        ))?;
        let theme_cleanup = vec![
            Regex::new(r"[（(]第[^\n）)]{1,10}章[）)]")?,
            Regex::new(r"请看片花[：:]\n?")?,
        ];

        Ok(Self {
            rules,
            theme_boundary,
            theme_cleanup,
        })
    }

    fn rules_of(&self, kind: MarkerKind) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(move |r| r.kind == kind)
    }

    fn is_structural(kind: MarkerKind) -> bool {
        matches!(kind, MarkerKind::Chapter | MarkerKind::Volume)
    }

    /// Every volume and chapter occurrence, in text order. Where two rules
    /// match overlapping text the earlier rule in the table wins.
    pub fn structural_markers(&self, text: &str) -> Vec<Marker> {
        let mut found: Vec<(usize, Marker)> = Vec::new();
        for (priority, rule) in self
            .rules
            .iter()
            .enumerate()
            .filter(|(_, r)| Self::is_structural(r.kind))
        {
            found.extend(
                rule.regex
                    .captures_iter(text)
                    .filter_map(|caps| rule.marker(&caps))
                    .map(|m| (priority, m)),
            );
        }
        found.sort_by_key(|(priority, m)| (m.span.start, *priority));

        let mut markers: Vec<Marker> = Vec::with_capacity(found.len());
        for (_, marker) in found {
            if markers
                .last()
                .is_some_and(|last| marker.span.start < last.span.end)
            {
                continue;
            }
            markers.push(marker);
        }
        markers
    }

    /// Text before the first volume or chapter header, or all of it.
    pub fn front_matter<'t>(&self, text: &'t str) -> &'t str {
        let end = self
            .rules
            .iter()
            .filter(|r| Self::is_structural(r.kind))
            .filter_map(|r| r.regex.find(text).map(|m| m.start()))
            .min()
            .unwrap_or(text.len());
        &text[..end]
    }

    /// First accepted match of `kind` within `text`, trying rules in order.
    fn first_match(&self, kind: MarkerKind, text: &str) -> Option<Marker> {
        self.rules_of(kind).find_map(|rule| {
            rule.regex
                .captures_iter(text)
                .filter_map(|caps| rule.marker(&caps))
                .find(|m| kind == MarkerKind::Theme || !m.capture(0).is_empty())
        })
    }

    /// Title from the front matter, or `fallback` (the file's base name).
    pub fn extract_title(&self, text: &str, fallback: &str) -> String {
        match self.first_match(MarkerKind::Title, self.front_matter(text)) {
            Some(marker) => normalizer::truncate_chars(marker.capture(0), MAX_TITLE_CHARS),
            None => fallback.to_string(),
        }
    }

    /// Author from the front matter, or [`UNKNOWN_AUTHOR`].
    pub fn extract_author(&self, text: &str) -> String {
        match self.first_match(MarkerKind::Author, self.front_matter(text)) {
            Some(marker) => normalizer::truncate_chars(marker.capture(0), MAX_AUTHOR_CHARS),
            None => UNKNOWN_AUTHOR.to_string(),
        }
    }

    /// Synopsis under a known section header, running until the next
    /// structural boundary. Without a header (or with an empty section) the
    /// first `fallback_paragraphs` paragraphs are used instead. Never fails;
    /// the result may be empty.
    pub fn extract_theme(&self, text: &str, cap: usize, fallback_paragraphs: usize) -> String {
        if let Some(header) = self.first_match(MarkerKind::Theme, self.front_matter(text)) {
            let start = header.span.end;
            let end = self
                .theme_boundary
                .find_at(text, start)
                .map(|m| m.start())
                .unwrap_or(text.len());
            let mut theme = text[start..end.max(start)].trim().to_string();
            for cleanup in &self.theme_cleanup {
                theme = cleanup.replace_all(&theme, "").into_owned();
            }
            let theme = normalizer::shorten(&theme, cap);
            if !theme.is_empty() {
                return theme;
            }
            tracing::debug!("theme header found with empty body, using leading paragraphs");
        }

        let paragraphs = normalizer::split_paragraphs(text);
        let lead: Vec<&str> = paragraphs
            .iter()
            .take(fallback_paragraphs)
            .map(String::as_str)
            .collect();
        normalizer::shorten(&lead.join(" "), cap)
    }
}

/// All markers of `text`: the first title, author and theme header found in
/// the front matter, then every volume and chapter header, ordered by position.
pub fn find_markers(text: &str, ruleset: &Ruleset) -> Vec<Marker> {
    let front = ruleset.front_matter(text);
    let mut markers: Vec<Marker> = [MarkerKind::Title, MarkerKind::Author, MarkerKind::Theme]
        .into_iter()
        .filter_map(|kind| ruleset.first_match(kind, front))
        .collect();
    markers.extend(ruleset.structural_markers(text));
    markers.sort_by_key(|m| m.span.start);
    markers
}
