//! 骨架构建适配层
//!
//! 从声明式骨架定义构建 [`Skeleton`]，并把未归一化的原始权重转换为
//! 蒙皮使用的权重表。
//!
//! - `source` - 骨架/网格数据源接口与内置实现
//! - `weights` - 权重归一化
//! - `joints` - 关节标记位置

pub mod joints;
pub mod source;
pub mod weights;

pub use joints::{joint_position, joint_positions};
pub use source::{ArmatureSource, MeshSource, RawVertexWeights, RigDefinition, StaticMesh};
pub use weights::{normalize_weights, normalize_weights_with_root};

use crate::animation::{Skeleton, SkeletonBuilder, VertexBoneWeights};
use crate::core::{Progress, RigError, RigResult};

/// 构建骨架并生成归一化的权重表
///
/// 骨骼按数据源给出的顺序添加，父骨骼必须先出现。没有任何权重的顶点
/// 被分配给第一个根骨骼。
pub fn load_rig<A, M>(
    source: &A,
    mesh: &M,
    progress: &mut Progress<'_>,
) -> RigResult<(Skeleton, VertexBoneWeights)>
where
    A: ArmatureSource + ?Sized,
    M: MeshSource + ?Sized,
{
    let mut builder = SkeletonBuilder::new(source.name());
    for definition in source.bone_definitions() {
        builder.add_definition(definition.clone())?;
    }

    let skeleton = builder.build_with_progress(progress);
    let root = skeleton.root_bone().ok_or(RigError::EmptySkeleton)?;

    let weights = normalize_weights_with_root(
        source.raw_vertex_weights(),
        mesh.vertex_count(),
        root.name(),
    );

    tracing::info!(
        target: "rig",
        "Loaded rig {} ({} bones, {} weighted bones, {} vertices)",
        skeleton.name(),
        skeleton.bone_count(),
        weights.len(),
        mesh.vertex_count()
    );
    Ok((skeleton, weights))
}

/// 不报告进度的 [`load_rig`]
pub fn from_options<A, M>(source: &A, mesh: &M) -> RigResult<(Skeleton, VertexBoneWeights)>
where
    A: ArmatureSource + ?Sized,
    M: MeshSource + ?Sized,
{
    load_rig(source, mesh, &mut Progress::silent())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::BoneDefinition;
    use glam::Vec3;

    fn biped() -> RigDefinition {
        let mut rig = RigDefinition::new("biped");
        rig.bones = vec![
            BoneDefinition::new("root", None, Vec3::ZERO, Vec3::Y, 0.0),
            BoneDefinition::new("spine", Some("root"), Vec3::Y, Vec3::new(0.0, 2.0, 0.0), 0.0),
            BoneDefinition::new(
                "head",
                Some("spine"),
                Vec3::new(0.0, 2.0, 0.0),
                Vec3::new(0.0, 3.0, 0.0),
                0.0,
            ),
        ];
        rig.weights.insert("spine".to_string(), vec![(1, 1.0), (2, 1.0)]);
        rig.weights.insert("head".to_string(), vec![(2, 3.0)]);
        rig
    }

    #[test]
    fn test_load_rig() {
        let mesh = StaticMesh::new(vec![Vec3::ZERO; 4]);
        let (skeleton, weights) = from_options(&biped(), &mesh).unwrap();

        assert_eq!(skeleton.name(), "biped");
        assert_eq!(skeleton.bone_count(), 3);
        assert_eq!(weights["root"].vertices, vec![0, 3]);
        assert!((weights["head"].weights[0] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_children_before_parents_rejected() {
        let mut rig = biped();
        rig.bones.swap(1, 2);
        let mesh = StaticMesh::new(vec![Vec3::ZERO; 4]);
        let err = from_options(&rig, &mesh).unwrap_err();
        assert!(matches!(err, RigError::UnknownParent { .. }));
    }

    #[test]
    fn test_empty_rig() {
        let rig = RigDefinition::new("nothing");
        let mesh = StaticMesh::new(vec![Vec3::ZERO]);
        assert!(matches!(
            from_options(&rig, &mesh),
            Err(RigError::EmptySkeleton)
        ));
    }

    #[test]
    fn test_load_rig_reports_progress() {
        let mesh = StaticMesh::new(vec![Vec3::ZERO; 4]);
        let mut calls = 0;
        {
            let mut callback = |_: f32| calls += 1;
            let mut progress = Progress::new(Some(&mut callback), 0);
            load_rig(&biped(), &mesh, &mut progress).unwrap();
        }
        assert_eq!(calls, 3);
    }
}
