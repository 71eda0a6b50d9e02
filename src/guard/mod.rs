//! 引擎模块：对外门面与全局单例
pub mod engine;
pub mod global;

pub use self::engine::TrafficGuard;
pub use self::global::{classify_global, global_blacklist, init_global_blacklist, reload_global};
