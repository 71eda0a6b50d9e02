//! rstrafficguard - 代理请求路径上的实时 URL/域名黑名单分类器
//!
//! 分类（成千上万条正则）不在代理热路径上同步执行：请求层创建
//! [`RequestHandle`] 并非阻塞地提交，工作线程池取出后对当前快照分类，
//! 再通过句柄回调投递结论；请求若已被宿主销毁，结论被静默丢弃。

// 导出全局错误类型
pub use self::error::{GuardError, GuardResult};

// 导出配置模块
pub use self::config::{ConfigManager, CustomConfigBuilder, GlobalConfig};

// 导出编译模块核心接口
pub use self::compiler::{CompileFailure, CompiledMatcher, PatternCompiler, PatternGroup, PatternKind};

// 导出黑名单模块核心接口
pub use self::blacklist::{Blacklist, Category, Classification, Reloader, Snapshot};

// 导出匹配队列核心接口
pub use self::queue::{
    Classifier, Completion, Delivery, HandleState, MatchQueue, MatchRequest, RequestHandle, Verdict,
    WorkerPool,
};

// 导出引擎门面及全局接口
pub use self::guard::{
    TrafficGuard,
    classify_global,
    global_blacklist,
    init_global_blacklist,
    reload_global,
};

// 导出工具模块核心接口
pub use self::utils::{LandingPage, preview_compact};

// 声明所有子模块
pub mod config;
pub mod error;
pub mod compiler;
pub mod blacklist;
pub mod queue;
pub mod guard;
pub mod utils;
