//! 黑名单分类
//! 一个子目录对应一个分类，目录下可选 `domains` / `urls` 两个模式文件

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::compiler::{PatternCompiler, PatternGroup, PatternKind};

/// URL 模式编写时不带该前缀
const HTTP_SCHEME: &str = "http://";

/// 黑名单分类，构建后不可变
#[derive(Debug)]
pub struct Category {
    name: String,
    domain_patterns: PatternGroup,
    url_patterns: PatternGroup,
}

impl Category {
    /// 从 `base_path/name/{domains,urls}` 加载分类
    /// 文件缺失不算错误，对应维度为空
    pub fn load(name: &str, base_path: &Path, compiler: &PatternCompiler) -> Self {
        let dir = base_path.join(name);
        let domain_patterns = Self::load_patterns(name, &dir, PatternKind::Domains, compiler);
        let url_patterns = Self::load_patterns(name, &dir, PatternKind::Urls, compiler);

        Self {
            name: name.to_string(),
            domain_patterns,
            url_patterns,
        }
    }

    /// 直接由模式行构建（测试与嵌入场景）
    pub fn from_patterns<D, U>(name: &str, domains: &[D], urls: &[U], compiler: &PatternCompiler) -> Self
    where
        D: AsRef<str>,
        U: AsRef<str>,
    {
        Self {
            name: name.to_string(),
            domain_patterns: compiler.compile(name, PatternKind::Domains, domains),
            url_patterns: compiler.compile(name, PatternKind::Urls, urls),
        }
    }

    fn load_patterns(name: &str, dir: &Path, kind: PatternKind, compiler: &PatternCompiler) -> PatternGroup {
        let path = dir.join(kind.file_name());
        info!("Processing Category: {}, Path: {}", name, path.display());

        let raw = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return PatternGroup::new(),
            Err(e) => {
                warn!("Category: {}, Type: {}, read failed: {}", name, kind, e);
                return PatternGroup::new();
            }
        };

        let text = String::from_utf8_lossy(&raw);
        let lines = PatternCompiler::parse_lines(&text);
        compiler.compile(name, kind, &lines)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 至少一个维度非空才是有效分类
    pub fn is_valid(&self) -> bool {
        !self.domain_patterns.is_empty() || !self.url_patterns.is_empty()
    }

    pub fn domain_patterns(&self) -> &PatternGroup {
        &self.domain_patterns
    }

    pub fn url_patterns(&self) -> &PatternGroup {
        &self.url_patterns
    }

    pub fn domain_match(&self, text: &str) -> bool {
        self.domain_patterns.is_match(text)
    }

    /// 去掉 `http://` 前缀（区分大小写）后匹配
    pub fn url_match(&self, text: &str) -> bool {
        let text = text.strip_prefix(HTTP_SCHEME).unwrap_or(text);
        self.url_patterns.is_match(text)
    }
}

impl Drop for Category {
    fn drop(&mut self) {
        if !self.is_valid() {
            error!("Category: {} is invalid", self.name);
        }
        debug!("Category: {} destroyed", self.name);
    }
}
