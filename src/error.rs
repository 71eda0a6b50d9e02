//! 全局错误类型定义
//! 仅用于初始化/配置/重载等外围路径；分类边界本身不返回错误

use std::io::Error as IoError;
use std::path::PathBuf;

use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use url::ParseError as UrlParseError;

#[derive(Error, Debug)]
pub enum GuardError {
    // 黑名单相关错误
    #[error("黑名单根目录不存在：{0}")]
    BasePathMissing(PathBuf),

    // 配置/运行时错误
    #[error("配置无效：{0}")]
    ConfigError(String),
    #[error("工作线程启动失败：{0}")]
    WorkerSpawnError(String),
    #[error("黑名单未初始化")]
    NotInitialized,

    // 基础错误
    #[error("IO操作失败：{0}")]
    IoError(#[from] IoError),
    #[error("JSON解析失败：{0}")]
    JsonError(#[from] SerdeJsonError),
    #[error("URL解析失败：{0}")]
    UrlError(#[from] UrlParseError),
}

// 全局Result类型
pub type GuardResult<T> = Result<T, GuardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(GuardError::NotInitialized.to_string(), "黑名单未初始化");
        assert_eq!(
            GuardError::BasePathMissing(PathBuf::from("/etc/trafficguard/blacklists")).to_string(),
            "黑名单根目录不存在：/etc/trafficguard/blacklists"
        );
    }
}
