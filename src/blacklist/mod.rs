//! 黑名单模块：分类加载、快照注册表、后台重载
pub mod category;
pub mod registry;
pub mod reloader;

pub use self::category::Category;
pub use self::registry::{Blacklist, Classification, Snapshot};
pub use self::reloader::Reloader;
