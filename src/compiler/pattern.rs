//! 编译后模式模型
//! 一个分类的一个维度（域名/URL）对应一个 PatternGroup

use std::fmt;

use regex_automata::meta::Regex;

/// 模式维度，对应分类目录下的文件名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    Domains,
    Urls,
}

impl PatternKind {
    /// 分类目录下的文件名
    pub fn file_name(self) -> &'static str {
        match self {
            PatternKind::Domains => "domains",
            PatternKind::Urls => "urls",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// 单个编译后的匹配器：覆盖一段连续的源模式行
/// 不含捕获槽，只回答是否命中
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    regex: Regex,
    pattern_count: usize,
}

impl CompiledMatcher {
    pub(crate) fn new(regex: Regex, pattern_count: usize) -> Self {
        Self { regex, pattern_count }
    }

    /// 整串匹配（正则已锚定首尾）
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn pattern_count(&self) -> usize {
        self.pattern_count
    }
}

/// 模式组：若干匹配器的析取，任一匹配即命中
#[derive(Debug, Clone, Default)]
pub struct PatternGroup {
    matchers: Vec<CompiledMatcher>,
}

impl PatternGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, matcher: CompiledMatcher) {
        self.matchers.push(matcher);
    }

    /// 按顺序尝试每个匹配器，首个命中即返回
    pub fn is_match(&self, text: &str) -> bool {
        self.matchers.iter().any(|m| m.is_match(text))
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    pub fn matcher_count(&self) -> usize {
        self.matchers.len()
    }

    /// 已编译进匹配器的源模式行数（被丢弃的批次不计入）
    pub fn pattern_count(&self) -> usize {
        self.matchers.iter().map(CompiledMatcher::pattern_count).sum()
    }
}
