//! 匹配队列模块：请求句柄、有界队列、工作线程池
pub mod handle;
pub mod worker;

pub use self::handle::{Completion, Delivery, HandleState, RequestHandle, Verdict};
pub use self::worker::{Classifier, MatchQueue, MatchRequest, WorkerPool};
