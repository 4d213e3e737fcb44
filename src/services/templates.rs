use std::collections::BTreeMap;
use std::fmt;

use crate::config::TemplateSet;
use crate::error::BindError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Param {
    Genre,
    Theme,
    Outline,
    Chapter,
    ChapterTitle,
    Characters,
    Transitions,
    Context,
    Skeleton,
    Start,
    End,
    Count,
    Length,
}

impl Param {
    const ALL: [Param; 13] = [
        Param::Genre,
        Param::Theme,
        Param::Outline,
        Param::Chapter,
        Param::ChapterTitle,
        Param::Characters,
        Param::Transitions,
        Param::Context,
        Param::Skeleton,
        Param::Start,
        Param::End,
        Param::Count,
        Param::Length,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Param::Genre => "genre",
            Param::Theme => "theme",
            Param::Outline => "outline",
            Param::Chapter => "chapter",
            Param::ChapterTitle => "chapter_title",
            Param::Characters => "characters",
            Param::Transitions => "transitions",
            Param::Context => "context",
            Param::Skeleton => "skeleton",
            Param::Start => "start",
            Param::End => "end",
            Param::Count => "count",
            Param::Length => "length",
        }
    }

    fn from_name(name: &str) -> Option<Param> {
        Param::ALL.into_iter().find(|p| p.name() == name)
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateId {
    ChapterSettings,
    ChapterSettingsPlain,
    ChapterElements,
    ChapterLength,
    Continuation,
    DetailDistillation,
    OutlineBatch,
    ParagraphContinuation,
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TemplateId::ChapterSettings => "chapter_settings",
            TemplateId::ChapterSettingsPlain => "chapter_settings_plain",
            TemplateId::ChapterElements => "chapter_elements",
            TemplateId::ChapterLength => "chapter_length",
            TemplateId::Continuation => "continuation",
            TemplateId::DetailDistillation => "detail_distillation",
            TemplateId::OutlineBatch => "outline_batch",
            TemplateId::ParagraphContinuation => "paragraph_continuation",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct TemplateSpec {
    pub id: TemplateId,
    pub text: &'static str,
    pub required: &'static [Param],
}

pub static TEMPLATES: &[TemplateSpec] = &[
    TemplateSpec {
        id: TemplateId::ChapterSettings,
        text: "请根据以下设定生成小说内容：\n类型：{genre}\n大纲：{outline}\n当前章节：第{chapter}章 {chapter_title}\n主要人物：{characters}",
        required: &[
            Param::Genre,
            Param::Outline,
            Param::Chapter,
            Param::ChapterTitle,
            Param::Characters,
        ],
    },
    TemplateSpec {
        id: TemplateId::ChapterSettingsPlain,
        text: "请根据以下设定生成小说内容：\n类型：{genre}\n大纲：{outline}\n当前章节：第{chapter}章 {chapter_title}",
        required: &[Param::Genre, Param::Outline, Param::Chapter, Param::ChapterTitle],
    },
    TemplateSpec {
        id: TemplateId::ChapterElements,
        text: "根据以下元素生成第{chapter}章「{chapter_title}」的内容：\n类型：{genre}\n大纲：{outline}\n转场方式：{transitions}\n角色设定：{characters}",
        required: &[
            Param::Chapter,
            Param::ChapterTitle,
            Param::Genre,
            Param::Outline,
            Param::Transitions,
            Param::Characters,
        ],
    },
    TemplateSpec {
        id: TemplateId::ChapterLength,
        text: "请根据我的【{genre}】小说章节大纲，帮我生成【{length}】字的小说章节内容：第{chapter}章 {chapter_title}：{outline}",
        required: &[
            Param::Genre,
            Param::Length,
            Param::Chapter,
            Param::ChapterTitle,
            Param::Outline,
        ],
    },
    TemplateSpec {
        id: TemplateId::Continuation,
        text: "请续写以下小说内容：\n类型：{genre}\n当前进度：{chapter_title}\n上下文：{context}",
        required: &[Param::Genre, Param::ChapterTitle, Param::Context],
    },
    TemplateSpec {
        id: TemplateId::DetailDistillation,
        text: "请完善这个章节的细节描写：\n基本框架：{skeleton}",
        required: &[Param::Skeleton],
    },
    TemplateSpec {
        id: TemplateId::OutlineBatch,
        text: "请生成【{genre}】类型的小说，小说的【主题大纲】是：{theme}，需要写出第{start}章到第{end}章（共{count}章）的小说章节大纲",
        required: &[Param::Genre, Param::Theme, Param::Start, Param::End, Param::Count],
    },
    TemplateSpec {
        id: TemplateId::ParagraphContinuation,
        text: "请根据第{chapter}章大纲（{outline}），帮我续写，前文内容：{context}",
        required: &[Param::Chapter, Param::Outline, Param::Context],
    },
];

/// `TEMPLATES` is laid out in `TemplateId` declaration order.
pub fn template(id: TemplateId) -> &'static TemplateSpec {
    &TEMPLATES[id as usize]
}

/// The values available for binding. Absent keys are the binding failures.
#[derive(Debug, Clone, Default)]
pub struct Params(BTreeMap<Param, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, param: Param, value: impl Into<String>) -> &mut Self {
        self.0.insert(param, value.into());
        self
    }

    pub fn with(mut self, param: Param, value: impl Into<String>) -> Self {
        self.set(param, value);
        self
    }

    pub fn get(&self, param: Param) -> Option<&str> {
        self.0.get(&param).map(String::as_str)
    }

    /// Only the parameters `spec` declares, or the first one missing.
    pub fn select(&self, spec: &TemplateSpec) -> Result<Params, BindError> {
        let mut selected = Params::new();
        for &param in spec.required {
            let value = self.get(param).ok_or(BindError::MissingParam {
                template: spec.id,
                param,
            })?;
            selected.set(param, value);
        }
        Ok(selected)
    }
}

impl TemplateSpec {
    /// Fill every `{name}` placeholder in one pass, so values that happen to
    /// contain braces are never re-expanded.
    pub fn bind(&self, params: &Params) -> Result<String, BindError> {
        let selected = params.select(self)?;
        let mut out = String::with_capacity(self.text.len() + 64);
        let mut rest = self.text;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                out.push_str(&rest[open..]);
                rest = "";
                break;
            };
            let name = &after[..close];
            match Param::from_name(name).and_then(|p| selected.get(p)) {
                Some(value) => out.push_str(value),
                None => out.push_str(&rest[open..open + close + 2]),
            }
            rest = &after[close + 1..];
        }
        out.push_str(rest);

        Ok(out)
    }

    #[cfg(test)]
    fn placeholders(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        let mut rest = self.text;
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) => {
                    names.push(&after[..close]);
                    rest = &after[close + 1..];
                }
                None => break,
            }
        }
        names
    }
}

/// One way of turning a document into samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    OutlineBatch,
    FullChapter,
    Continuation,
    DetailDistillation,
    ParagraphContinuation,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::OutlineBatch => "outline_batch",
            Strategy::FullChapter => "full_chapter",
            Strategy::Continuation => "continuation",
            Strategy::DetailDistillation => "detail_distillation",
            Strategy::ParagraphContinuation => "paragraph_continuation",
        };
        f.write_str(name)
    }
}

impl TemplateSet {
    /// Strategies in execution order.
    pub fn strategies(self) -> &'static [Strategy] {
        match self {
            TemplateSet::Dialog => &[
                Strategy::FullChapter,
                Strategy::Continuation,
                Strategy::DetailDistillation,
            ],
            TemplateSet::Outline => &[Strategy::OutlineBatch, Strategy::ParagraphContinuation],
            TemplateSet::Chapter => &[Strategy::OutlineBatch, Strategy::FullChapter],
            TemplateSet::All => &[
                Strategy::OutlineBatch,
                Strategy::FullChapter,
                Strategy::Continuation,
                Strategy::DetailDistillation,
                Strategy::ParagraphContinuation,
            ],
        }
    }

    /// Candidate templates for the full-chapter strategy.
    pub fn full_chapter_templates(self, with_characters: bool) -> &'static [TemplateId] {
        match self {
            TemplateSet::Dialog if with_characters => {
                &[TemplateId::ChapterSettings, TemplateId::ChapterElements]
            }
            TemplateSet::Dialog => &[TemplateId::ChapterSettingsPlain],
            TemplateSet::Chapter => &[TemplateId::ChapterLength],
            TemplateSet::Outline => &[],
            TemplateSet::All => &[
                TemplateId::ChapterSettings,
                TemplateId::ChapterSettingsPlain,
                TemplateId::ChapterElements,
                TemplateId::ChapterLength,
            ],
        }
    }
}
