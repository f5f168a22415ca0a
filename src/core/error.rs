//! 统一错误处理模块
//!
//! 提供骨骼子系统范围内的统一错误类型定义
//!
//! ## 错误类型分层
//!
//! - **结构错误**: 重复骨骼名、未知父骨骼、未知骨骼名等，必须返回给调用者
//! - **数值退化** / **数据不完整**: 不会出现在这里，只通过 `tracing` 记录，批处理继续执行
//!
//! `RigError` 同时覆盖配置层 (`ConfigError`) 的错误。

use thiserror::Error;

use crate::config::ConfigError;

/// 骨骼子系统错误类型
#[derive(Error, Debug)]
pub enum RigError {
    #[error("Skeleton {skeleton} already contains a bone named {bone}")]
    DuplicateBone { skeleton: String, bone: String },

    #[error("Unknown parent bone {parent} for bone {bone}")]
    UnknownParent { bone: String, parent: String },

    #[error("No such bone in skeleton: {0}")]
    BoneNotFound(String),

    #[error("Pose has {actual} matrices, skeleton has {expected} bones")]
    PoseLengthMismatch { expected: usize, actual: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Face group not found: {0}")]
    FaceGroupNotFound(String),

    #[error("Skeleton has no root bone")]
    EmptySkeleton,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RigError {
    /// 是否为结构错误（畸形骨骼定义）
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            RigError::DuplicateBone { .. }
                | RigError::UnknownParent { .. }
                | RigError::BoneNotFound(_)
                | RigError::EmptySkeleton
        )
    }
}

/// 骨骼子系统结果类型别名
pub type RigResult<T> = Result<T, RigError>;
