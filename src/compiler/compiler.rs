//! 模式编译器核心
//! 每行模式先单独解析为 HIR，再按批合并成若干个交替式匹配器；
//! 超出 NFA 体积上限的候选在模式边界处二分后分别重试，含非法行的批次整批丢弃

use regex_automata::meta::{BuildError, Regex};
use regex_automata::nfa::thompson::WhichCaptures;
use regex_syntax::hir::{Hir, Look};
use regex_syntax::{Parser, ParserBuilder};
use tracing::{debug, error};

use super::pattern::{CompiledMatcher, PatternGroup, PatternKind};
use crate::config::GlobalConfig;
use crate::utils::{preview_compact, PATTERN_PREVIEW_LEN};

/// 每个模式在合并文本中的包裹开销："(?:" + ")"
const GROUP_OVERHEAD: usize = 4;

/// 编译失败分类（由引擎错误类型区分，不依赖错误文本）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileFailure {
    /// 编译结果超出体积上限，可二分重试
    TooLarge { limit: usize },
    /// 其他构建错误，整批丢弃
    Invalid(String),
}

impl From<BuildError> for CompileFailure {
    fn from(err: BuildError) -> Self {
        match err.size_limit() {
            Some(limit) => CompileFailure::TooLarge { limit },
            None => CompileFailure::Invalid(err.to_string()),
        }
    }
}

/// 已单独解析的一行模式
struct ParsedLine<'a> {
    source: &'a str,
    hir: Hir,
}

impl<'a> ParsedLine<'a> {
    fn parse(parser: &mut Parser, source: &'a str) -> Result<Self, regex_syntax::Error> {
        let hir = parser.parse(source)?;
        Ok(Self { source, hir })
    }
}

/// 模式编译器
#[derive(Debug, Clone)]
pub struct PatternCompiler {
    batch_size: usize,
    size_limit: usize,
}

impl Default for PatternCompiler {
    fn default() -> Self {
        Self::from_config(&GlobalConfig::default())
    }
}

impl PatternCompiler {
    pub fn new(batch_size: usize, size_limit: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            size_limit,
        }
    }

    pub fn from_config(config: &GlobalConfig) -> Self {
        Self::new(config.batch_size, config.regex_size_limit)
    }

    /// 拆分模式文件内容：去除首尾空白，跳过空行
    pub fn parse_lines(raw: &str) -> Vec<&str> {
        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// 编译一组模式行
    /// category / kind 仅用于日志定位
    pub fn compile<S: AsRef<str>>(&self, category: &str, kind: PatternKind, lines: &[S]) -> PatternGroup {
        let lines: Vec<&str> = lines
            .iter()
            .map(|line| line.as_ref().trim())
            .filter(|line| !line.is_empty())
            .collect();

        let mut group = PatternGroup::new();
        let mut stats = CompileStats::default();
        let ctx = ChunkContext { category, kind };
        let mut parser = Self::parser();

        for batch in lines.chunks(self.batch_size) {
            match Self::parse_batch(&mut parser, batch) {
                Ok(parsed) => self.compile_chunk(&ctx, &parsed, &mut group, &mut stats),
                // 行级语法错误：不拼接，整批丢弃
                Err((line, err)) => ctx.drop_batch(&err.to_string(), line, batch.len(), &mut stats),
            }
        }

        debug!(
            "Category: {}, Type: {}, patterns {}, matchers {}, bisections {}, dropped batches {} ({} patterns)",
            category,
            kind,
            lines.len(),
            group.matcher_count(),
            stats.bisections,
            stats.dropped_batches,
            stats.dropped_patterns
        );

        group
    }

    /// 大小写不敏感、非多行
    fn parser() -> Parser {
        ParserBuilder::new().case_insensitive(true).multi_line(false).build()
    }

    fn parse_batch<'a>(
        parser: &mut Parser,
        batch: &[&'a str],
    ) -> Result<Vec<ParsedLine<'a>>, (&'a str, regex_syntax::Error)> {
        batch
            .iter()
            .map(|&line| ParsedLine::parse(parser, line).map_err(|e| (line, e)))
            .collect()
    }

    /// 编译单个候选；体积超限时在模式边界二分递归
    fn compile_chunk(
        &self,
        ctx: &ChunkContext<'_>,
        lines: &[ParsedLine<'_>],
        group: &mut PatternGroup,
        stats: &mut CompileStats,
    ) {
        if lines.is_empty() {
            return;
        }

        match self.build(lines) {
            Ok(regex) => group.push(CompiledMatcher::new(regex, lines.len())),
            Err(CompileFailure::TooLarge { .. }) if lines.len() > 1 => {
                let sources: Vec<&str> = lines.iter().map(|l| l.source).collect();
                let split = Self::split_point(&sources);
                stats.bisections += 1;
                self.compile_chunk(ctx, &lines[..split], group, stats);
                self.compile_chunk(ctx, &lines[split..], group, stats);
            }
            Err(failure) => {
                let reason = match failure {
                    CompileFailure::TooLarge { limit } => {
                        format!("single pattern exceeds size limit of {} bytes", limit)
                    }
                    CompileFailure::Invalid(msg) => msg,
                };
                let sources: Vec<&str> = lines.iter().map(|l| l.source).collect();
                ctx.drop_batch(&reason, &Self::alternation(&sources), lines.len(), stats);
            }
        }
    }

    /// 各行 HIR 的交替，首尾锚定（整串匹配）
    /// 匹配器不编译捕获槽：源模式里的分组再多也不会放大搜索期内存
    fn build(&self, lines: &[ParsedLine<'_>]) -> Result<Regex, CompileFailure> {
        let alternation = Hir::alternation(lines.iter().map(|l| l.hir.clone()).collect());
        let anchored = Hir::concat(vec![Hir::look(Look::Start), alternation, Hir::look(Look::End)]);

        Regex::builder()
            .configure(
                Regex::config()
                    .which_captures(WhichCaptures::None)
                    .nfa_size_limit(Some(self.size_limit)),
            )
            .build_from_hir(&anchored)
            .map_err(CompileFailure::from)
    }

    /// `(?:p1)|(?:p2)|...`，用于日志预览与二分定位
    pub(crate) fn alternation(lines: &[&str]) -> String {
        let capacity = lines.iter().map(|l| l.len() + GROUP_OVERHEAD + 1).sum();
        let mut out = String::with_capacity(capacity);
        for (idx, line) in lines.iter().enumerate() {
            if idx > 0 {
                out.push('|');
            }
            out.push_str("(?:");
            out.push_str(line);
            out.push(')');
        }
        out
    }

    /// 合并文本中点之后（含）最近的分隔符所在的模式下标
    /// 结果落在 [1, len - 1]，两半都非空，递归必然收敛
    pub(crate) fn split_point(lines: &[&str]) -> usize {
        debug_assert!(lines.len() > 1);
        let total: usize = lines.iter().map(|l| l.len() + GROUP_OVERHEAD).sum::<usize>() + lines.len() - 1;
        let midpoint = total / 2;

        let mut offset = 0;
        for (idx, line) in lines.iter().enumerate() {
            offset += line.len() + GROUP_OVERHEAD;
            if offset >= midpoint {
                return (idx + 1).clamp(1, lines.len() - 1);
            }
            offset += 1;
        }
        lines.len() / 2
    }
}

struct ChunkContext<'a> {
    category: &'a str,
    kind: PatternKind,
}

impl ChunkContext<'_> {
    fn drop_batch(&self, reason: &str, offending: &str, count: usize, stats: &mut CompileStats) {
        error!(
            "Category: {}, Type: {}, Error: {}, Patterns: {}",
            self.category,
            self.kind,
            preview_compact(reason, PATTERN_PREVIEW_LEN),
            preview_compact(offending, PATTERN_PREVIEW_LEN)
        );
        stats.dropped_batches += 1;
        stats.dropped_patterns += count;
    }
}

/// 编译统计信息
#[derive(Debug, Clone, Default)]
struct CompileStats {
    bisections: usize,
    dropped_batches: usize,
    dropped_patterns: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_full_match_case_insensitive() {
        let compiler = PatternCompiler::default();
        let group = compiler.compile("ads", PatternKind::Domains, &[r"ads\.example\.com", r"(.*\.)?tracker\.net"]);

        assert_eq!(group.matcher_count(), 1);
        assert_eq!(group.pattern_count(), 2);
        assert!(group.is_match("ads.example.com"));
        assert!(group.is_match("ADS.Example.COM"));
        assert!(group.is_match("cdn.tracker.net"));
        // 整串匹配，不是子串搜索
        assert!(!group.is_match("x.ads.example.com"));
        assert!(!group.is_match("ads.example.com.evil"));
    }

    #[test]
    fn test_compile_respects_batch_size() {
        // 测试场景：5 行、批大小 2 → 3 个匹配器
        let compiler = PatternCompiler::new(2, 10 * (1 << 20));
        let lines = ["a1", "a2", "a3", "a4", "a5"];
        let group = compiler.compile("c", PatternKind::Urls, &lines);

        assert_eq!(group.matcher_count(), 3);
        assert!(lines.iter().all(|l| group.is_match(l)));
    }

    #[test]
    fn test_compile_bisects_oversized_candidate() {
        // 测试场景：体积上限很小，整批无法编译，必须二分成多个匹配器且不丢模式
        let compiler = PatternCompiler::new(1000, 32 * 1024);
        let lines: Vec<String> = (0..1000)
            .map(|i| format!(r"host{}\.example\.com", i))
            .collect();
        let group = compiler.compile("big", PatternKind::Domains, &lines);

        assert!(group.matcher_count() >= 2);
        assert_eq!(group.pattern_count(), lines.len());
        for i in 0..1000 {
            assert!(group.is_match(&format!("host{}.example.com", i)), "host{} lost", i);
        }
        assert!(!group.is_match("host1000.example.com"));
    }

    #[test]
    fn test_compile_drops_invalid_batch_only() {
        // 测试场景：语法错误的批次被整批丢弃，其他批次正常
        let compiler = PatternCompiler::new(2, 10 * (1 << 20));
        let group = compiler.compile(
            "mixed",
            PatternKind::Domains,
            &[r"good\.com", "bad(", r"also\.ok", r"fine\.org"],
        );

        assert_eq!(group.matcher_count(), 1);
        assert_eq!(group.pattern_count(), 2);
        assert!(!group.is_match("good.com"));
        assert!(group.is_match("also.ok"));
        assert!(group.is_match("fine.org"));
    }

    #[test]
    fn test_compile_single_oversized_pattern_terminates() {
        // 测试场景：单个模式本身超限，无法再拆分，直接丢弃
        let compiler = PatternCompiler::new(1000, 1);
        let group = compiler.compile("tiny", PatternKind::Urls, &["a", "b", "c"]);
        assert!(group.is_empty());
    }

    #[test]
    fn test_compile_failure_classification() {
        let mut parser = PatternCompiler::parser();
        let lines = [ParsedLine::parse(&mut parser, r"\w{100}").unwrap()];

        let tight = PatternCompiler::new(1, 1);
        assert_eq!(tight.build(&lines).unwrap_err(), CompileFailure::TooLarge { limit: 1 });
        let small = [ParsedLine::parse(&mut parser, r"a\.com").unwrap()];
        assert!(tight.build(&small).is_err());
        assert!(PatternCompiler::default().build(&small).is_ok());
        assert!(ParsedLine::parse(&mut parser, "(").is_err());
    }

    #[test]
    fn test_malformed_line_cannot_escape_its_group() {
        // 测试场景：单独看是语法错误的行，拼接后会闭合包裹组并注入顶层 `.*`
        let compiler = PatternCompiler::default();
        let group = compiler.compile("c", PatternKind::Domains, &[r"bad\.com", r"x)|.*|(?:y"]);
        assert!(group.is_empty());
        assert!(!group.is_match("innocent.org"));

        let per_line = PatternCompiler::new(1, 10 * (1 << 20));
        let group = per_line.compile("c", PatternKind::Domains, &[r"bad\.com", r"x)|.*|(?:y"]);
        assert_eq!(group.pattern_count(), 1);
        assert!(group.is_match("bad.com"));
        assert!(!group.is_match("innocent.org"));
    }

    #[test]
    fn test_line_flags_stay_inside_their_line() {
        // 扩展模式的注释不会吞掉同批的后续模式
        let compiler = PatternCompiler::default();
        let group = compiler.compile("c", PatternKind::Urls, &["(?x) a # note", r"b\.com"]);

        assert_eq!(group.matcher_count(), 1);
        assert!(group.is_match("a"));
        assert!(group.is_match("b.com"));
        assert!(!group.is_match("a # note"));
    }

    #[test]
    fn test_capture_heavy_batch_matches_long_input() {
        // 测试场景：默认配置下每行带多个捕获组，长输入匹配不得放大内存
        let compiler = PatternCompiler::default();
        let lines: Vec<String> = (0..1000)
            .map(|i| format!(r"(.*\.)?(www\.)?h{}[a-z0-9-]*\.(com|net|org)(/.*)?", i))
            .collect();
        let group = compiler.compile("captures", PatternKind::Urls, &lines);
        assert_eq!(group.pattern_count(), lines.len());

        let hit = format!("cdn.www.h999abc.net/{}", "a".repeat(2000));
        let miss = format!("h999abc.io/{}", "b".repeat(2000));
        assert!(group.is_match(&hit));
        assert!(!group.is_match(&miss));
    }

    #[test]
    fn test_split_point_on_pattern_boundary() {
        assert_eq!(PatternCompiler::split_point(&["a", "b"]), 1);
        assert_eq!(PatternCompiler::split_point(&["a", "b", "c", "d"]), 2);
        // 第一个模式已越过中点
        assert_eq!(PatternCompiler::split_point(&["aaaaaaaaaa", "b", "c"]), 1);
        // 最后一个模式很长时也保证右半非空
        assert_eq!(PatternCompiler::split_point(&["a", "b", "cccccccccccccccccccc"]), 2);
    }

    #[test]
    fn test_alternation_and_parse_lines() {
        assert_eq!(PatternCompiler::alternation(&["a|b", "c"]), "(?:a|b)|(?:c)");
        assert_eq!(PatternCompiler::parse_lines("a\r\n\n  b  \n\n"), vec!["a", "b"]);
    }
}
