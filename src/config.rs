//! 全局配置管理,存储所有可配置项
//! 支持读取代理插件的 JSON 配置文件（tg.conf）

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::{GuardError, GuardResult};
use crate::utils::LandingPage;

/// 全局配置
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    // 黑名单根目录（每个子目录为一个分类）
    pub blacklist_path: PathBuf,
    // 命中后的重定向落地页
    pub landing_page: String,
    // 匹配工作线程数
    pub workers: usize,
    // 待匹配队列容量
    pub queue_capacity: usize,
    // 单个候选正则合并的最大行数
    pub batch_size: usize,
    // 正则引擎编译体积上限（字节）
    pub regex_size_limit: usize,
    // 是否启用详细日志
    pub verbose: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            blacklist_path: PathBuf::from("/etc/trafficguard/blacklists"),
            landing_page: "http://localhost/blocked".to_string(),
            workers: 2,
            queue_capacity: 256,
            batch_size: 1000,
            regex_size_limit: 10 * (1 << 20),
            verbose: false,
        }
    }
}

impl GlobalConfig {
    /// 数值项下限修正：线程数、队列容量、批大小至少为 1
    pub fn normalized(mut self) -> Self {
        self.workers = self.workers.max(1);
        self.queue_capacity = self.queue_capacity.max(1);
        self.batch_size = self.batch_size.max(1);
        self
    }

    /// 解析落地页
    pub fn landing(&self) -> GuardResult<LandingPage> {
        LandingPage::parse(&self.landing_page)
    }
}

/// 配置文件结构（键名沿用插件配置的 PascalCase）
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct FileConfig {
    landing_page: Option<String>,
    workers: Option<i64>,
    blacklist_path: Option<PathBuf>,
    queue_capacity: Option<i64>,
    batch_size: Option<i64>,
    regex_size_limit: Option<i64>,
    verbose: Option<bool>,
}

/// 配置管理器（单例）
pub struct ConfigManager;

impl ConfigManager {
    /// 插件默认配置文件路径
    pub const DEFAULT_CONFIG_PATH: &'static str = "/etc/trafficguard/tg.conf";

    /// 获取默认配置
    pub fn get_default() -> GlobalConfig {
        GlobalConfig::default()
    }

    /// 自定义配置
    pub fn custom() -> CustomConfigBuilder {
        CustomConfigBuilder::new()
    }

    /// 从 JSON 配置文件加载，缺省项保持默认值
    pub fn load_file(path: impl AsRef<Path>) -> GuardResult<GlobalConfig> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let config = Self::from_json(&raw)?;

        info!("TrafficGuard config: {}", path.display());
        info!("  -- LandingPage = {}", config.landing_page);
        info!("  -- Workers     = {}", config.workers);

        Ok(config)
    }

    /// 解析 JSON 配置文本
    pub fn from_json(raw: &str) -> GuardResult<GlobalConfig> {
        let file: FileConfig = serde_json::from_str(raw)?;
        let mut builder = Self::custom();

        if let Some(landing_page) = file.landing_page {
            builder = builder.landing_page(landing_page);
        }
        if let Some(workers) = file.workers {
            builder = builder.workers(Self::non_negative("Workers", workers)?);
        }
        if let Some(path) = file.blacklist_path {
            builder = builder.blacklist_path(path);
        }
        if let Some(capacity) = file.queue_capacity {
            builder = builder.queue_capacity(Self::non_negative("QueueCapacity", capacity)?);
        }
        if let Some(batch_size) = file.batch_size {
            builder = builder.batch_size(Self::non_negative("BatchSize", batch_size)?);
        }
        if let Some(limit) = file.regex_size_limit {
            builder = builder.regex_size_limit(Self::non_negative("RegexSizeLimit", limit)?);
        }
        if let Some(verbose) = file.verbose {
            builder = builder.verbose(verbose);
        }

        let config = builder.build();
        // 落地页必须是绝对URL
        config.landing()?;
        Ok(config)
    }

    fn non_negative(key: &str, value: i64) -> GuardResult<usize> {
        usize::try_from(value)
            .map_err(|_| GuardError::ConfigError(format!("{} must not be negative, got {}", key, value)))
    }
}

/// 配置构建器（便于自定义配置）
#[derive(Debug, Clone)]
pub struct CustomConfigBuilder {
    config: GlobalConfig,
}

impl Default for CustomConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: GlobalConfig::default(),
        }
    }

    pub fn blacklist_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.blacklist_path = path.into();
        self
    }

    pub fn landing_page(mut self, url: impl Into<String>) -> Self {
        self.config.landing_page = url.into();
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn regex_size_limit(mut self, limit: usize) -> Self {
        self.config.regex_size_limit = limit;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    pub fn build(self) -> GlobalConfig {
        self.config.normalized()
    }
}
