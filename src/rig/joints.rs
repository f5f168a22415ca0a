//! 关节标记解析
//!
//! 关节位置是网格中名为 `joint-<name>` 的面组所含顶点的中心，可在静止
//! 坐标或当前坐标上求值。

use std::collections::BTreeMap;

use glam::Vec3;

use super::source::MeshSource;
use crate::core::{RigError, RigResult};

const JOINT_PREFIX: &str = "joint-";

/// 关节标记的位置
///
/// `name` 可以带或不带 `joint-` 前缀。`rest` 为真时使用静止坐标。
pub fn joint_position<M: MeshSource + ?Sized>(mesh: &M, name: &str, rest: bool) -> RigResult<Vec3> {
    let group = if name.starts_with(JOINT_PREFIX) {
        name.to_string()
    } else {
        format!("{JOINT_PREFIX}{name}")
    };

    let vertices = mesh
        .face_group_vertices(&group)
        .ok_or_else(|| RigError::FaceGroupNotFound(group.clone()))?;
    let coords = if rest {
        mesh.rest_coordinates()
    } else {
        mesh.coordinates()
    };

    let mut sum = Vec3::ZERO;
    let mut count = 0usize;
    for &vertex in vertices {
        match coords.get(vertex) {
            Some(coord) => {
                sum += *coord;
                count += 1;
            }
            None => tracing::warn!(
                target: "rig",
                "Face group {} references missing vertex {}",
                group,
                vertex
            ),
        }
    }

    if count == 0 {
        return Err(RigError::InvalidParameter(format!(
            "face group {group} has no vertices"
        )));
    }
    Ok(sum / count as f32)
}

/// 所有 `joint-*` 面组的位置，键为去掉前缀的关节名称
pub fn joint_positions<M: MeshSource + ?Sized>(
    mesh: &M,
    rest: bool,
) -> RigResult<BTreeMap<String, Vec3>> {
    mesh.face_group_names()
        .into_iter()
        .filter_map(|group| group.strip_prefix(JOINT_PREFIX))
        .map(|name| Ok((name.to_string(), joint_position(mesh, name, rest)?)))
        .collect()
}
