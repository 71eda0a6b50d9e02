//! 黑名单注册表
//! 持有不可变的分类快照；重载时完整构建新快照后原子替换，读路径无锁

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwapOption;
use tracing::{error, info, warn};

use super::category::Category;
use crate::compiler::PatternCompiler;
use crate::config::GlobalConfig;
use crate::error::{GuardError, GuardResult};

/// 分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// 尚无可用快照，调用方应跳过分类（放行）
    NotReady,
    /// 已分类，未命中
    NoMatch,
    /// 命中的分类名
    Matched(String),
}

impl Classification {
    pub fn is_match(&self) -> bool {
        matches!(self, Classification::Matched(_))
    }
}

/// 分类快照：目录枚举顺序即匹配优先级
#[derive(Debug)]
pub struct Snapshot {
    categories: Vec<Category>,
}

impl Snapshot {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// 按注册顺序逐个分类先测域名再测URL，返回首个命中的分类
    pub fn classify(&self, domain: &str, url: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|cat| cat.domain_match(domain) || cat.url_match(url))
            .map(Category::name)
    }
}

/// 黑名单
#[derive(Debug)]
pub struct Blacklist {
    base_path: PathBuf,
    compiler: PatternCompiler,
    snapshot: ArcSwapOption<Snapshot>,
    ready: AtomicBool,
}

impl Blacklist {
    /// 创建空注册表（不加载），需调用 reload 或 install
    pub fn new(base_path: impl Into<PathBuf>, compiler: PatternCompiler) -> Self {
        Self {
            base_path: base_path.into(),
            compiler,
            snapshot: ArcSwapOption::empty(),
            ready: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &GlobalConfig) -> Self {
        Self::new(config.blacklist_path.clone(), PatternCompiler::from_config(config))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// 是否有可查询的快照（重载进行中为 false）
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// 当前快照
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.load_full()
    }

    /// 同步重载，返回发布的分类数
    /// 没有有效分类时保留旧快照，返回 Ok(0)
    pub fn reload(&self) -> GuardResult<usize> {
        self.ready.store(false, Ordering::Release);

        let categories = match self.scan() {
            Ok(categories) => categories,
            Err(e) => {
                error!("Blacklist reload failed: {}", e);
                self.restore_ready();
                return Err(e);
            }
        };

        if categories.is_empty() {
            warn!("!!! No blacklist activated !!!");
            self.restore_ready();
            return Ok(0);
        }

        Ok(self.install(categories))
    }

    /// 发布一组分类作为新快照；空集合不发布
    pub fn install(&self, categories: Vec<Category>) -> usize {
        let count = categories.len();
        if count == 0 {
            self.restore_ready();
            return 0;
        }

        let (domain_matchers, url_matchers) = categories.iter().fold((0, 0), |(d, u), cat| {
            (d + cat.domain_patterns().matcher_count(), u + cat.url_patterns().matcher_count())
        });

        self.snapshot.store(Some(Arc::new(Snapshot::new(categories))));
        self.ready.store(true, Ordering::Release);
        info!(
            "Blacklist activated: {} categories, {} domain matchers, {} url matchers",
            count, domain_matchers, url_matchers
        );
        count
    }

    /// 枚举根目录的直接子目录并加载，丢弃无效分类
    /// 按目录名排序，保证优先级可复现
    pub fn scan(&self) -> GuardResult<Vec<Category>> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => GuardError::BasePathMissing(self.base_path.clone()),
            _ => GuardError::IoError(e),
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Blacklist base path {}: skip entry: {}", self.base_path.display(), e);
                    continue;
                }
            };
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();

        Ok(names
            .iter()
            .map(|name| Category::load(name, &self.base_path, &self.compiler))
            .filter(Category::is_valid)
            .collect())
    }

    /// 分类查询：整个调用只读取一次快照
    pub fn classify(&self, domain: &str, url: &str) -> Classification {
        let guard = self.snapshot.load();
        let Some(snapshot) = &*guard else {
            return Classification::NotReady;
        };

        match snapshot.classify(domain, url) {
            Some(name) => Classification::Matched(name.to_string()),
            None => Classification::NoMatch,
        }
    }

    fn restore_ready(&self) {
        let has_snapshot = self.snapshot.load().is_some();
        self.ready.store(has_snapshot, Ordering::Release);
    }
}
