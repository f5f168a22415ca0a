//! 骨骼动画模块
//!
//! 提供骨骼层级、静止/姿态矩阵运算和线性混合蒙皮。
//!
//! ## 功能特性
//!
//! - 骨骼层级（构建阶段 + 姿态阶段）
//! - 静止朝向与坐标约定转换
//! - 四元数 / 欧拉角姿态访问
//! - 交互式姿态编辑与极向目标修正
//! - 线性混合蒙皮
//!
//! ## 使用示例
//!
//! ```rust
//! use character_rig::animation::{BoneWeights, SkeletonBuilder, VertexBoneWeights};
//! use glam::{Vec3, Vec4};
//!
//! let mut builder = SkeletonBuilder::new("demo");
//! builder.add_bone("root", None, Vec3::ZERO, Vec3::Y, 0.0)?;
//! builder.add_bone("child", Some("root"), Vec3::Y, Vec3::new(0.0, 2.0, 0.0), 0.0)?;
//! let mut skeleton = builder.build();
//!
//! skeleton.bone_mut("child")?.set_rotation(Vec3::new(0.0, 0.0, 0.5));
//! skeleton.update();
//!
//! let mut weights = VertexBoneWeights::new();
//! weights.insert("child".to_string(), BoneWeights::new(vec![0], vec![1.0]));
//! let posed = skeleton.skin_mesh(&[Vec4::new(0.0, 2.0, 0.0, 1.0)], &weights);
//! assert_eq!(posed.len(), 1);
//! # Ok::<(), character_rig::core::RigError>(())
//! ```

pub mod bone;
pub mod orientation;
pub mod service;
pub mod skeleton;
pub mod skin;

pub use bone::{Bone, BoneDefinition, BoneRotation};
pub use orientation::{get_matrix, transform_bone_matrix, LocalBoneAxis, MeshOrientation};
pub use service::PoseService;
pub use skeleton::{Skeleton, SkeletonBuilder};
pub use skin::{
    skin_mesh, skin_mesh_vec3_with_config, skin_mesh_with_config, BoneWeights, VertexBoneWeights,
};
