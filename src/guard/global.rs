//! 全局黑名单单例管理
//! 进程内只维护一份分类注册表，供插件入口与便捷函数共享

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, info};

use crate::blacklist::{Blacklist, Classification};
use crate::config::GlobalConfig;
use crate::error::{GuardError, GuardResult};

/// 全局黑名单实例
static GLOBAL_BLACKLIST: OnceCell<Arc<Blacklist>> = OnceCell::new();

/// 初始化全局黑名单并同步完成首次加载
/// 幂等：已初始化则直接返回现有实例；首次加载失败时不登记，可重试
pub fn init_global_blacklist(config: &GlobalConfig) -> GuardResult<Arc<Blacklist>> {
    if let Some(existing) = GLOBAL_BLACKLIST.get() {
        debug!("Global blacklist already initialized, skip reinitialization");
        return Ok(Arc::clone(existing));
    }

    let blacklist = Arc::new(Blacklist::from_config(config));
    blacklist.reload()?;

    // 并发初始化时以先登记者为准
    let registered = GLOBAL_BLACKLIST.get_or_init(|| Arc::clone(&blacklist));
    info!("Global blacklist initialized, ready: {}", registered.is_ready());
    Ok(Arc::clone(registered))
}

/// 获取全局黑名单
pub fn global_blacklist() -> GuardResult<Arc<Blacklist>> {
    GLOBAL_BLACKLIST.get().cloned().ok_or(GuardError::NotInitialized)
}

/// 使用全局黑名单分类；未初始化视为未就绪
pub fn classify_global(domain: &str, url: &str) -> Classification {
    match GLOBAL_BLACKLIST.get() {
        Some(blacklist) => blacklist.classify(domain, url),
        None => Classification::NotReady,
    }
}

/// 同步重载全局黑名单
pub fn reload_global() -> GuardResult<usize> {
    global_blacklist()?.reload()
}
