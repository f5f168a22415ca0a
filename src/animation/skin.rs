//! 线性混合蒙皮
//!
//! 权重表以骨骼名称为键，每个条目给出受影响的顶点索引与对应权重。
//! 权重在构建时已经按顶点归一化，蒙皮时只做累加。

use std::collections::BTreeMap;

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use super::skeleton::Skeleton;
use crate::config::SkinningConfig;

/// 单个骨骼影响的顶点及权重
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoneWeights {
    pub vertices: Vec<usize>,
    pub weights: Vec<f32>,
}

impl BoneWeights {
    pub fn new(vertices: Vec<usize>, weights: Vec<f32>) -> Self {
        Self { vertices, weights }
    }

    pub fn len(&self) -> usize {
        self.vertices.len().min(self.weights.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.vertices.iter().copied().zip(self.weights.iter().copied())
    }
}

/// 顶点-骨骼权重表：骨骼名称 → 顶点权重
pub type VertexBoneWeights = BTreeMap<String, BoneWeights>;

/// 对齐次坐标的静止顶点做线性混合蒙皮
///
/// 权重表中引用了不存在的骨骼时记录警告并跳过该条目；
/// 越界的顶点索引同样被跳过。
pub fn skin_mesh(
    skeleton: &Skeleton,
    rest_coords: &[Vec4],
    weights: &VertexBoneWeights,
) -> Vec<Vec3> {
    skin_mesh_with_config(skeleton, rest_coords, weights, &SkinningConfig::default())
}

pub fn skin_mesh_with_config(
    skeleton: &Skeleton,
    rest_coords: &[Vec4],
    weights: &VertexBoneWeights,
    config: &SkinningConfig,
) -> Vec<Vec3> {
    let mut result = vec![Vec3::ZERO; rest_coords.len()];
    let mut skipped = 0usize;

    for (bone_name, entry) in weights {
        let bone = match skeleton.bone(bone_name) {
            Ok(bone) => bone,
            Err(_) => {
                if config.warn_missing_bones {
                    tracing::warn!(
                        target: "skinning",
                        "Weight table references bone {} missing from skeleton {}",
                        bone_name,
                        skeleton.name()
                    );
                }
                continue;
            }
        };

        let matrix = *bone.pose_verts();
        for (vertex, weight) in entry.iter() {
            match rest_coords.get(vertex) {
                Some(coord) => result[vertex] += weight * (matrix * *coord).truncate(),
                None => skipped += 1,
            }
        }
    }

    if skipped > 0 {
        tracing::warn!(
            target: "skinning",
            "Skipped {} weights with vertex indices beyond {} vertices",
            skipped,
            rest_coords.len()
        );
    }
    result
}

/// 三维坐标输入的蒙皮，先补齐 `w = 1`（较慢，调用方应尽量直接提供齐次坐标）
pub fn skin_mesh_vec3(
    skeleton: &Skeleton,
    rest_coords: &[Vec3],
    weights: &VertexBoneWeights,
) -> Vec<Vec3> {
    skin_mesh_vec3_with_config(skeleton, rest_coords, weights, &SkinningConfig::default())
}

pub fn skin_mesh_vec3_with_config(
    skeleton: &Skeleton,
    rest_coords: &[Vec3],
    weights: &VertexBoneWeights,
    config: &SkinningConfig,
) -> Vec<Vec3> {
    if config.log_unoptimized_input {
        tracing::debug!(
            target: "skinning",
            "Unoptimized skinning input: {} vertices without homogeneous coordinate",
            rest_coords.len()
        );
    }
    let homogeneous: Vec<Vec4> = rest_coords.iter().map(|v| v.extend(1.0)).collect();
    skin_mesh_with_config(skeleton, &homogeneous, weights, config)
}

/// 每个顶点的权重总和
pub fn vertex_weight_sums(weights: &VertexBoneWeights, vertex_count: usize) -> Vec<f32> {
    let mut sums = vec![0.0f32; vertex_count];
    for entry in weights.values() {
        for (vertex, weight) in entry.iter() {
            if let Some(sum) = sums.get_mut(vertex) {
                *sum += weight;
            }
        }
    }
    sums
}
