//! 请求句柄与生命周期守护
//!
//! 句柄不拥有代理侧的请求对象，只持有一个引用 `R`（由宿主决定具体类型）。
//! 宿主在请求不再可用时调用 [`RequestHandle::mark_destroyed`]；工作线程通过
//! [`RequestHandle::complete`] 投递结论。两者在同一把句柄级互斥锁下检查并修改状态：
//!
//! - 回调在持锁期间执行，`mark_destroyed` 返回后不会再有任何回调触碰请求；
//! - 先被销毁的句柄，结论被静默丢弃，`R` 不会被解引用；
//! - 每个句柄至多投递一次结论，进入终态后的任何信号都是空操作。
//!
//! 回调签名为 `(&mut R, &Verdict)`：回调拿到的是请求引用本身而不是句柄，
//! 只有在锁内确认未销毁后才会被调用；分类名通过 [`Verdict::category`] 取得，未命中为空串。
//! 回调内不得再调用同一句柄的方法（锁不可重入）。

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::blacklist::Classification;
use crate::utils::LandingPage;

/// 投递给回调的结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Matched(String),
    Unmatched,
}

impl Verdict {
    /// 命中的分类名；未命中为空串
    pub fn category(&self) -> &str {
        match self {
            Verdict::Matched(name) => name,
            Verdict::Unmatched => "",
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Verdict::Matched(_))
    }

    /// 命中时的重定向地址
    pub fn redirect_location(&self, landing: &LandingPage, origin: &str) -> Option<String> {
        match self {
            Verdict::Matched(name) => Some(landing.location(name, origin)),
            Verdict::Unmatched => None,
        }
    }
}

/// 未就绪按未命中放行
impl From<Classification> for Verdict {
    fn from(classification: Classification) -> Self {
        match classification {
            Classification::Matched(name) => Verdict::Matched(name),
            Classification::NoMatch | Classification::NotReady => Verdict::Unmatched,
        }
    }
}

/// 句柄状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// 已入队，尚未有结论
    Pending,
    Matched,
    Unmatched,
    /// 结论到达前请求已被宿主销毁
    Destroyed,
}

/// complete 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// 回调已执行
    Delivered,
    /// 请求已销毁，结论丢弃
    Discarded,
    /// 已经投递过
    AlreadyResolved,
}

/// 完成回调：持锁调用，可安全访问请求引用
pub type Completion<R> = Box<dyn FnOnce(&mut R, &Verdict) + Send>;

struct Slot<R> {
    state: HandleState,
    request: Option<R>,
    completion: Option<Completion<R>>,
}

/// 请求句柄，克隆后共享同一状态
/// 完成回调收到 `(&mut R, &Verdict)` 而非句柄本身，回调内不要再调用本句柄
pub struct RequestHandle<R> {
    slot: Arc<Mutex<Slot<R>>>,
}

impl<R> Clone for RequestHandle<R> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<R> fmt::Debug for RequestHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle").field("state", &self.state()).finish()
    }
}

impl<R> RequestHandle<R> {
    pub fn new<F>(request: R, completion: F) -> Self
    where
        F: FnOnce(&mut R, &Verdict) + Send + 'static,
    {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                state: HandleState::Pending,
                request: Some(request),
                completion: Some(Box::new(completion)),
            })),
        }
    }

    pub fn state(&self) -> HandleState {
        self.lock().state
    }

    pub fn is_destroyed(&self) -> bool {
        self.state() == HandleState::Destroyed
    }

    /// 宿主通知请求不再可用
    /// 返回 true 表示句柄由 Pending 进入 Destroyed；已有结论时为空操作
    /// 若回调正在执行，本调用会等待其结束
    pub fn mark_destroyed(&self) -> bool {
        let mut slot = self.lock();
        if slot.state != HandleState::Pending {
            return false;
        }

        slot.state = HandleState::Destroyed;
        slot.request = None;
        slot.completion = None;
        true
    }

    /// 投递结论；仅 Pending 状态下执行回调
    pub fn complete(&self, verdict: Verdict) -> Delivery {
        let mut slot = self.lock();
        match slot.state {
            HandleState::Pending => {}
            HandleState::Destroyed => return Delivery::Discarded,
            HandleState::Matched | HandleState::Unmatched => return Delivery::AlreadyResolved,
        }

        // 先落终态，回调即使 panic 也不会被再次调用
        slot.state = if verdict.is_match() {
            HandleState::Matched
        } else {
            HandleState::Unmatched
        };
        let request = slot.request.take();
        let completion = slot.completion.take();

        if let (Some(mut request), Some(completion)) = (request, completion) {
            completion(&mut request, &verdict);
        }
        Delivery::Delivered
    }

    // 状态在任何 panic 点都保持一致，中毒后直接取回
    fn lock(&self) -> MutexGuard<'_, Slot<R>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
