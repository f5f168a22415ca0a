//! 核心模块
//!
//! 包含骨骼子系统的基础设施：
//! - `error` - 错误类型定义
//! - `progress` - 显式传递的进度句柄
//! - `macros` - 样板代码宏

pub mod error;
pub mod progress;
#[macro_use]
pub mod macros;

// 重新导出错误类型
pub use error::{RigError, RigResult};
pub use progress::{Progress, ProgressCallback};
