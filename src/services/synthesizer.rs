use rand::Rng;
use rand::seq::IndexedRandom;

use crate::config::Config;
use crate::error::BindError;
use crate::models::{Chapter, Document, Sample};
use crate::services::names::NameGenerator;
use crate::services::normalizer::{self, ELLIPSIS};
use crate::services::templates::{Param, Params, Strategy, TemplateId, template};
use crate::services::{numeral, summary};

const PARAGRAPH_TAIL_CHARS: usize = 50;
const PARAGRAPH_CONTEXT_CAP: usize = 200;
const PARAGRAPH_OUTLINE_CHARS: usize = 50;
const TRANSITION_COUNT: usize = 2;
const OPENING_CONTEXT: &str = "（开头）";

/// Why a sample was not produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Binding(BindError),
    /// The prompt alone leaves no room for a response.
    PromptTooLong { prompt_chars: usize, max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSample {
    pub strategy: Strategy,
    /// Chapter number, or the first chapter of an outline batch.
    pub chapter: u64,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct Synthesis {
    pub samples: Vec<Sample>,
    pub skipped: Vec<SkippedSample>,
}

impl Synthesis {
    fn push(&mut self, strategy: Strategy, chapter: u64, result: Result<Sample, SkipReason>) {
        match result {
            Ok(sample) => self.samples.push(sample),
            Err(reason) => {
                tracing::warn!(%strategy, chapter, ?reason, "sample skipped");
                self.skipped.push(SkippedSample {
                    strategy,
                    chapter,
                    reason,
                });
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Synthesizer {
    config: Config,
    names: NameGenerator,
}

impl Synthesizer {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            names: NameGenerator::new(),
        }
    }

    /// Run every strategy of the configured template set. Document-level
    /// strategies come first, then the per-chapter ones chapter by chapter.
    /// The preface (chapter 0) never produces samples.
    pub fn synthesize<R: Rng + ?Sized>(&self, doc: &Document, rng: &mut R) -> Synthesis {
        let strategies = self.config.template_set.strategies();
        let mut out = Synthesis::default();

        let chapters: Vec<&Chapter> = doc.chapters.iter().filter(|c| !c.is_preface()).collect();

        if strategies.contains(&Strategy::OutlineBatch) {
            self.outline_batches(doc, &chapters, &mut out);
        }

        for chapter in &chapters {
            let params = self.chapter_params(doc, chapter, rng);
            for &strategy in strategies {
                match strategy {
                    Strategy::OutlineBatch => {}
                    Strategy::FullChapter => self.full_chapter(chapter, &params, rng, &mut out),
                    Strategy::Continuation => self.continuation(chapter, &params, rng, &mut out),
                    Strategy::DetailDistillation => self.detail(chapter, rng, &mut out),
                    Strategy::ParagraphContinuation => {
                        self.paragraph_continuation(chapter, &params, &mut out)
                    }
                }
            }
        }

        out
    }

    /// The parameter pool of one chapter. Theme is absent when the document
    /// has none; characters are absent when `character_count` is 0.
    fn chapter_params<R: Rng + ?Sized>(&self, doc: &Document, chapter: &Chapter, rng: &mut R) -> Params {
        let summary = summary::extract_summary(&chapter.content, self.config.summary_length_cap);
        let outline = if doc.theme.is_empty() {
            summary.clone()
        } else {
            normalizer::truncate_chars(&doc.theme, self.config.theme_length_cap)
        };

        let mut params = Params::new();
        params
            .set(Param::Genre, doc.genre.as_str())
            .set(Param::Outline, outline)
            .set(Param::Chapter, chapter.number.to_string())
            .set(Param::ChapterTitle, chapter.title.as_str())
            .set(Param::Length, chapter.char_len().to_string())
            .set(
                Param::Transitions,
                self.names.transitions(rng, TRANSITION_COUNT).join("、"),
            );
        if !doc.theme.is_empty() {
            params.set(Param::Theme, doc.theme.as_str());
        }
        if self.config.character_count > 0 {
            params.set(
                Param::Characters,
                self.names
                    .characters(rng, self.config.character_count)
                    .join("、"),
            );
        }
        params
    }

    fn full_chapter<R: Rng + ?Sized>(
        &self,
        chapter: &Chapter,
        params: &Params,
        rng: &mut R,
        out: &mut Synthesis,
    ) {
        let candidates = self
            .config
            .template_set
            .full_chapter_templates(self.config.character_count > 0);
        let Some(&id) = candidates.choose(rng) else {
            return;
        };
        let result = self.render(id, params, &chapter.content);
        out.push(Strategy::FullChapter, chapter.number, result);
    }

    /// Split a long chapter: the prefix tail is context, the suffix the
    /// response. The split snaps back to a line start when one lies past the
    /// margin.
    fn continuation<R: Rng + ?Sized>(
        &self,
        chapter: &Chapter,
        params: &Params,
        rng: &mut R,
        out: &mut Synthesis,
    ) {
        let cfg = &self.config;
        let len = chapter.char_len();
        if cfg.continuation_ratio <= 0.0 || len <= cfg.continuation_min_length {
            return;
        }
        if !rng.random_bool(cfg.continuation_ratio) {
            return;
        }

        let margin = cfg.continuation_margin;
        let split_char = rng.random_range(margin..=len - margin);
        let split = byte_offset(&chapter.content, split_char);
        let split = match chapter.content[..split].rfind('\n') {
            Some(nl) if chapter.content[..nl].chars().count() >= margin => nl + 1,
            _ => split,
        };

        let (prefix, suffix) = chapter.content.split_at(split);
        let context = normalizer::tail_chars(prefix.trim_end(), cfg.continuation_context_length);
        let response = suffix.trim();
        if response.is_empty() {
            return;
        }

        let params = params.clone().with(Param::Context, context.trim_start());
        let result = self.render(TemplateId::Continuation, &params, response);
        out.push(Strategy::Continuation, chapter.number, result);
    }

    /// Every k-th non-blank line as a skeleton; the response is the full
    /// chapter.
    fn detail<R: Rng + ?Sized>(&self, chapter: &Chapter, rng: &mut R, out: &mut Synthesis) {
        let cfg = &self.config;
        if cfg.detail_ratio <= 0.0 || !rng.random_bool(cfg.detail_ratio) {
            return;
        }

        let skeleton: Vec<&str> = chapter
            .content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .step_by(cfg.detail_line_stride)
            .collect();
        let skeleton = normalizer::truncate_chars(&skeleton.join("\n"), cfg.skeleton_length);

        let params = Params::new().with(Param::Skeleton, skeleton);
        let result = self.render(TemplateId::DetailDistillation, &params, &chapter.content);
        out.push(Strategy::DetailDistillation, chapter.number, result);
    }

    /// One sample per paragraph, with the tails of the preceding paragraphs
    /// as context.
    fn paragraph_continuation(&self, chapter: &Chapter, params: &Params, out: &mut Synthesis) {
        let paragraphs = chapter.paragraphs();
        let summary = summary::extract_summary(&chapter.content, self.config.summary_length_cap);
        let outline = normalizer::head_chars(&summary, PARAGRAPH_OUTLINE_CHARS);
        let window = self.config.context_paragraph_window;

        for (idx, paragraph) in paragraphs.iter().enumerate() {
            let context = if idx == 0 || window == 0 {
                OPENING_CONTEXT.to_string()
            } else {
                let joined = (idx.saturating_sub(window)..idx)
                    .map(|p| {
                        format!(
                            "第{}段落：{}",
                            p + 1,
                            normalizer::tail_chars(&paragraphs[p], PARAGRAPH_TAIL_CHARS)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                normalizer::shorten(&joined, PARAGRAPH_CONTEXT_CAP)
            };

            let params = params
                .clone()
                .with(Param::Outline, outline)
                .with(Param::Context, context);
            let result = self.render(TemplateId::ParagraphContinuation, &params, paragraph);
            out.push(Strategy::ParagraphContinuation, chapter.number, result);
        }
    }

    /// Consecutive runs of `outline_chunk_size` chapters, each answered by
    /// one summary line per chapter.
    fn outline_batches(&self, doc: &Document, chapters: &[&Chapter], out: &mut Synthesis) {
        for chunk in chapters.chunks(self.config.outline_chunk_size) {
            let (Some(first), Some(last)) = (chunk.first(), chunk.last()) else {
                continue;
            };

            let response = chunk
                .iter()
                .map(|c| self.outline_item(c))
                .collect::<Vec<_>>()
                .join("\n");

            let mut params = Params::new();
            params
                .set(Param::Genre, doc.genre.as_str())
                .set(Param::Start, first.number.to_string())
                .set(Param::End, last.number.to_string())
                .set(Param::Count, chunk.len().to_string());
            if !doc.theme.is_empty() {
                params.set(Param::Theme, doc.theme.as_str());
            }

            let result = self.render(TemplateId::OutlineBatch, &params, &response);
            out.push(Strategy::OutlineBatch, first.number, result);
        }
    }

    fn outline_item(&self, chapter: &Chapter) -> String {
        let summary = summary::extract_summary(&chapter.content, self.config.summary_length_cap);
        let heading = format!("第{}章", numeral::to_glyphs(chapter.number));
        if chapter.title.contains(&heading) {
            format!("{}：{}", chapter.title, summary)
        } else {
            format!("{} {}：{}", heading, chapter.title, summary)
        }
    }

    fn render(&self, id: TemplateId, params: &Params, response: &str) -> Result<Sample, SkipReason> {
        let prompt = template(id).bind(params).map_err(SkipReason::Binding)?;
        bound_sample(prompt, response, self.config.max_sequence_length)
    }
}

/// Keep the whole prompt and cut the response tail so that prompt + response
/// fit in `max` characters.
pub fn bound_sample(prompt: String, response: &str, max: usize) -> Result<Sample, SkipReason> {
    let prompt_chars = prompt.chars().count();
    let response_chars = response.chars().count();
    if prompt_chars + response_chars <= max {
        return Ok(Sample {
            prompt,
            response: response.to_string(),
        });
    }

    let available = max.saturating_sub(prompt_chars);
    if available <= ELLIPSIS.chars().count() {
        return Err(SkipReason::PromptTooLong { prompt_chars, max });
    }
    Ok(Sample {
        prompt,
        response: normalizer::truncate_chars(response, available),
    })
}

fn byte_offset(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map_or(text.len(), |(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TemplateSet;
    use crate::services::templates::Strategy;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn chapter(number: u64, body: &str) -> Chapter {
        Chapter::new(number, format!("标题{number}"), body)
    }

    fn document(chapters: Vec<Chapter>) -> Document {
        Document {
            genre: "玄幻".to_string(),
            title: "书".to_string(),
            author: "某".to_string(),
            theme: "少年修行。".to_string(),
            chapters,
        }
    }

    fn long_body() -> String {
        (0..100)
            .map(|i| format!("第{i}行，他一步步走向山顶。"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn config(template_set: TemplateSet) -> Config {
        Config {
            template_set,
            random_seed: Some(7),
            ..Config::default()
        }
    }

    #[test]
    fn test_single_short_chapter_without_continuation() {
        let cfg = Config {
            continuation_ratio: 0.0,
            detail_ratio: 0.0,
            ..config(TemplateSet::Dialog)
        };
        let doc = document(vec![chapter(1, &"字".repeat(250))]);
        let out = Synthesizer::new(&cfg).synthesize(&doc, &mut StdRng::seed_from_u64(1));
        assert_eq!(out.samples.len(), 1);
        assert_eq!(out.samples[0].response, "字".repeat(250));
        assert!(out.samples[0].prompt.contains("标题1"));
        assert!(out.skipped.is_empty());
    }

    #[test]
    fn test_continuation_splits_long_chapter() {
        let cfg = Config {
            continuation_ratio: 1.0,
            detail_ratio: 0.0,
            ..config(TemplateSet::Dialog)
        };
        let body = long_body();
        let doc = document(vec![chapter(1, &body)]);
        let out = Synthesizer::new(&cfg).synthesize(&doc, &mut StdRng::seed_from_u64(3));
        assert_eq!(out.samples.len(), 2);

        let continuation = &out.samples[1];
        assert!(continuation.prompt.starts_with("请续写以下小说内容"));
        assert!(body.ends_with(&continuation.response));
        let context = continuation.prompt.split("上下文：").nth(1).unwrap();
        assert!(context.chars().count() <= cfg.continuation_context_length);
        let split = body.len() - continuation.response.len();
        assert!(body[..split].trim_end().ends_with(context));
    }

    #[test]
    fn test_detail_distillation_uses_sparse_lines() {
        let cfg = Config {
            continuation_ratio: 0.0,
            detail_ratio: 1.0,
            ..config(TemplateSet::Dialog)
        };
        let body = long_body();
        let doc = document(vec![chapter(2, &body)]);
        let out = Synthesizer::new(&cfg).synthesize(&doc, &mut StdRng::seed_from_u64(5));
        let detail = out
            .samples
            .iter()
            .find(|s| s.prompt.starts_with("请完善这个章节的细节描写"))
            .unwrap();
        assert!(detail.prompt.contains("第0行"));
        assert!(!detail.prompt.contains("第1行"));
        assert!(detail.prompt.contains("第3行"));
        assert_eq!(detail.response, body);
    }

    #[test]
    fn test_outline_batches_group_chapters() {
        let cfg = Config {
            outline_chunk_size: 2,
            ..config(TemplateSet::Outline)
        };
        let chapters = (1..=3)
            .map(|n| chapter(n, &format!("第{n}章的故事开始了。后来发生了很多事情。")))
            .collect();
        let doc = document(chapters);
        let out = Synthesizer::new(&cfg).synthesize(&doc, &mut StdRng::seed_from_u64(9));

        let outlines: Vec<&Sample> = out
            .samples
            .iter()
            .filter(|s| s.prompt.starts_with("请生成【玄幻】"))
            .collect();
        assert_eq!(outlines.len(), 2);
        assert!(outlines[0].prompt.contains("第1章到第2章（共2章）"));
        assert!(outlines[1].prompt.contains("第3章到第3章（共1章）"));
        assert_eq!(outlines[0].response.lines().count(), 2);
        assert!(outlines[0].response.starts_with("第一章 标题1："));
    }

    #[test]
    fn test_missing_theme_skips_outline_only() {
        let cfg = config(TemplateSet::Outline);
        let mut doc = document(vec![chapter(1, "一段。\n\n二段。")]);
        doc.theme.clear();
        let out = Synthesizer::new(&cfg).synthesize(&doc, &mut StdRng::seed_from_u64(2));
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.skipped[0].strategy, Strategy::OutlineBatch);
        assert_eq!(
            out.skipped[0].reason,
            SkipReason::Binding(BindError::MissingParam {
                template: TemplateId::OutlineBatch,
                param: Param::Theme,
            })
        );
        // paragraph continuation still runs
        assert_eq!(out.samples.len(), 2);
        assert!(out.samples[0].prompt.ends_with(OPENING_CONTEXT));
        assert!(out.samples[1].prompt.contains("第1段落：一段。"));
    }

    #[test]
    fn test_preface_produces_no_samples() {
        let cfg = Config {
            continuation_ratio: 0.0,
            detail_ratio: 0.0,
            ..config(TemplateSet::Dialog)
        };
        let doc = document(vec![chapter(0, "前言内容"), chapter(1, "正文内容")]);
        let out = Synthesizer::new(&cfg).synthesize(&doc, &mut StdRng::seed_from_u64(4));
        assert_eq!(out.samples.len(), 1);
        assert_eq!(out.samples[0].response, "正文内容");
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let cfg = config(TemplateSet::All);
        let doc = document(vec![chapter(1, &long_body()), chapter(2, &long_body())]);
        let synth = Synthesizer::new(&cfg);
        let a = synth.synthesize(&doc, &mut StdRng::seed_from_u64(11));
        let b = synth.synthesize(&doc, &mut StdRng::seed_from_u64(11));
        assert_eq!(a.samples, b.samples);
    }

    #[test]
    fn test_bound_sample_truncates_response_only() {
        let sample = bound_sample("提示".to_string(), &"回".repeat(20), 10).unwrap();
        assert_eq!(sample.prompt, "提示");
        assert_eq!(sample.char_len(), 10);
        assert!(sample.response.ends_with(ELLIPSIS));

        let err = bound_sample("很长的提示".to_string(), "回答", 6).unwrap_err();
        assert_eq!(
            err,
            SkipReason::PromptTooLong {
                prompt_chars: 5,
                max: 6
            }
        );
    }

    proptest! {
        #[test]
        fn test_samples_respect_max_sequence_length(
            body_len in 1usize..4000,
            max in 400usize..3000,
            seed in any::<u64>(),
        ) {
            let cfg = Config {
                max_sequence_length: max,
                ..config(TemplateSet::All)
            };
            let body = "山高水长。\n".repeat(body_len / 6 + 1);
            let doc = document(vec![chapter(1, &body)]);
            let out = Synthesizer::new(&cfg).synthesize(&doc, &mut StdRng::seed_from_u64(seed));
            for sample in &out.samples {
                prop_assert!(sample.char_len() <= max);
            }
        }
    }
}
