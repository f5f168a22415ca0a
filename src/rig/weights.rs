//! 顶点权重归一化

use crate::animation::{BoneWeights, VertexBoneWeights};

use super::source::RawVertexWeights;

/// 按顶点归一化权重：每个权重除以该顶点所有权重之和
///
/// 越界的顶点索引被丢弃；总权重为零的顶点不会出现在结果中。
pub fn normalize_weights(raw: &RawVertexWeights, vertex_count: usize) -> VertexBoneWeights {
    normalize_by_totals(raw, &weight_totals(raw, vertex_count))
}

fn normalize_by_totals(raw: &RawVertexWeights, totals: &[f32]) -> VertexBoneWeights {
    let mut result = VertexBoneWeights::new();
    for (bone_name, group) in raw {
        let mut entry = BoneWeights::default();
        for &(vertex, weight) in group {
            match totals.get(vertex) {
                Some(&total) if total != 0.0 => {
                    entry.vertices.push(vertex);
                    entry.weights.push(weight / total);
                }
                _ => {}
            }
        }
        if !entry.is_empty() {
            result.insert(bone_name.clone(), entry);
        }
    }
    result
}

/// 归一化权重，并把没有任何权重的顶点整体分配给 `root_bone`（权重 1.0）
pub fn normalize_weights_with_root(
    raw: &RawVertexWeights,
    vertex_count: usize,
    root_bone: &str,
) -> VertexBoneWeights {
    let totals = weight_totals(raw, vertex_count);
    let mut result = normalize_by_totals(raw, &totals);

    let mut informed = false;
    for (vertex, _) in totals.iter().enumerate().filter(|&(_, &total)| total == 0.0) {
        if !informed {
            tracing::info!(
                target: "rig",
                "Adding trivial bone weights to bone {} for unweighted vertices",
                root_bone
            );
            informed = true;
        }
        let entry = result.entry(root_bone.to_string()).or_default();
        entry.vertices.push(vertex);
        entry.weights.push(1.0);
    }
    result
}

fn weight_totals(raw: &RawVertexWeights, vertex_count: usize) -> Vec<f32> {
    let mut totals = vec![0.0f32; vertex_count];
    let mut out_of_range = 0usize;
    for group in raw.values() {
        for &(vertex, weight) in group {
            match totals.get_mut(vertex) {
                Some(total) => *total += weight,
                None => out_of_range += 1,
            }
        }
    }
    if out_of_range > 0 {
        tracing::warn!(
            target: "rig",
            "Ignoring {} weights referencing vertices beyond {}",
            out_of_range,
            vertex_count
        );
    }
    totals
}
