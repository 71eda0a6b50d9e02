//! 编译模块：将模式文件行编译为分块的正则匹配器
pub mod pattern;
pub mod compiler;

pub use self::pattern::{CompiledMatcher, PatternGroup, PatternKind};
pub use self::compiler::{CompileFailure, PatternCompiler};
