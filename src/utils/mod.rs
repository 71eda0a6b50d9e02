//! 工具模块：日志预览、落地页地址
pub mod landing;
pub mod preview;

pub use self::landing::LandingPage;
pub use self::preview::{preview_compact, PATTERN_PREVIEW_LEN};
