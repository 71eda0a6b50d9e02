//! TrafficGuard 门面：对代理请求层暴露的全部接口
use std::sync::Arc;

use tracing::info;

use crate::blacklist::{Blacklist, Classification, Reloader};
use crate::config::GlobalConfig;
use crate::error::GuardResult;
use crate::queue::{MatchQueue, MatchRequest, RequestHandle, WorkerPool};
use crate::utils::LandingPage;

/// 黑名单分类引擎
/// `R` 为宿主请求引用类型，由完成回调解释
pub struct TrafficGuard<R: Send + 'static> {
    landing: LandingPage,
    blacklist: Arc<Blacklist>,
    pool: Option<WorkerPool<R>>,
    reloader: Option<Reloader>,
}

impl<R: Send + 'static> TrafficGuard<R> {
    /// 创建引擎并在后台开始首次加载
    pub fn new(config: GlobalConfig) -> GuardResult<Self> {
        let blacklist = Arc::new(Blacklist::from_config(&config));
        let guard = Self::with_blacklist(config, blacklist)?;
        guard.trigger_reload();
        Ok(guard)
    }

    /// 使用已有注册表创建引擎（不触发加载）
    pub fn with_blacklist(config: GlobalConfig, blacklist: Arc<Blacklist>) -> GuardResult<Self> {
        let config = config.normalized();
        let landing = config.landing()?;

        info!("TrafficGuard starting, blacklists at {}", blacklist.base_path().display());

        let reloader = Reloader::spawn(Arc::clone(&blacklist))?;
        let queue = MatchQueue::new(config.queue_capacity);
        let pool = WorkerPool::spawn(queue, Arc::clone(&blacklist), config.workers)?;

        Ok(Self {
            landing,
            blacklist,
            pool: Some(pool),
            reloader: Some(reloader),
        })
    }

    /// 提交分类请求，不阻塞
    /// 未就绪或队列满返回 false，调用方应直接放行请求
    pub fn submit_for_classification(
        &self,
        domain: impl Into<String>,
        url: impl Into<String>,
        handle: RequestHandle<R>,
    ) -> bool {
        if !self.is_ready() {
            return false;
        }
        self.pool
            .as_ref()
            .is_some_and(|pool| pool.submit(MatchRequest::new(handle, domain, url)))
    }

    /// 异步重载；返回 false 表示已有待执行的重载
    pub fn trigger_reload(&self) -> bool {
        self.reloader.as_ref().is_some_and(Reloader::trigger)
    }

    pub fn is_ready(&self) -> bool {
        self.blacklist.is_ready()
    }

    /// 同步分类（不经过队列）
    pub fn classify(&self, domain: &str, url: &str) -> Classification {
        self.blacklist.classify(domain, url)
    }

    /// 已完成的后台重载次数
    pub fn reloads_completed(&self) -> usize {
        self.reloader.as_ref().map_or(0, Reloader::completed)
    }

    pub fn blacklist(&self) -> &Arc<Blacklist> {
        &self.blacklist
    }

    pub fn landing(&self) -> &LandingPage {
        &self.landing
    }
}

impl<R: Send + 'static> Drop for TrafficGuard<R> {
    fn drop(&mut self) {
        // 线程池销毁时关闭入口并处理完已接受的请求
        drop(self.pool.take());
        drop(self.reloader.take());
        info!("TrafficGuard stopped");
    }
}
