//! 姿态服务层
//!
//! 遵循贫血模型，`Skeleton`/`Bone` 只保存数据与派生矩阵，需要同时读取
//! 父骨骼状态的交互式姿态操作（世界空间旋转、指向目标、极向目标修正）
//! 封装在 `PoseService` 中。
//!
//! 这些操作只刷新被修改的骨骼本身；子骨骼需要随后调用
//! `Skeleton::update`。

use glam::{Mat3, Mat4, Vec3};

use super::orientation::{
    cardinal_axis, get_matrix, mat3_to_euler_zyx, orthonormal_rotation, with_rotation_block,
    PARALLEL_EPSILON,
};
use super::skeleton::Skeleton;
use crate::core::{RigError, RigResult};

/// 姿态服务 - 封装交互式姿态编辑逻辑
pub struct PoseService;

impl PoseService {
    /// 绕基本坐标轴 (0=x, 1=y, 2=z) 旋转骨骼
    ///
    /// `in_world_space` 为真时旋转作用于 `pose_global`，再反推局部姿态；
    /// 否则直接作用于局部姿态矩阵。平移保持不变。
    pub fn rotate(
        skeleton: &mut Skeleton,
        index: usize,
        angle: f32,
        axis: usize,
        in_world_space: bool,
    ) -> RigResult<()> {
        if !in_world_space {
            bone_at_mut(skeleton, index)?.rotate_local(angle, axis)?;
            return skeleton.update_bone(index);
        }

        let rotation = Mat3::from_axis_angle(cardinal_axis(axis)?, angle);
        let global = *bone_at(skeleton, index)?.pose_global();
        let rotated = rotation * Mat3::from_mat4(global);
        Self::apply_global(skeleton, index, with_rotation_block(global, rotated))
    }

    /// 让骨骼指向世界空间中的目标位置
    ///
    /// `do_stretch` 为真时沿局部 Y 轴缩放，使 tail 恰好落在目标上；
    /// 否则保持原长度，目标只决定方向。
    pub fn stretch_to(
        skeleton: &mut Skeleton,
        index: usize,
        goal: Vec3,
        do_stretch: bool,
    ) -> RigResult<()> {
        let bone = bone_at(skeleton, index)?;
        let (length, mut global) = get_matrix(bone.head(), goal, 0.0);

        if do_stretch {
            if bone.length() > PARALLEL_EPSILON {
                global.y_axis *= length / bone.length();
            } else {
                tracing::debug!(
                    target: "skeleton",
                    "Cannot stretch zero-length bone {}",
                    bone.name()
                );
            }
        }

        let roll = bone.roll();
        let parent = skeleton.parent_of(index).map(|p| *p.pose_global());
        let pose = bone.pose_from(&global, parent.as_ref());
        let twist = mat3_to_euler_zyx(&orthonormal_rotation(&pose)).y;

        let rotated = Mat3::from_mat4(global) * Mat3::from_rotation_y(-twist + roll);
        Self::apply_global(skeleton, index, with_rotation_block(global, rotated))
    }

    /// 极向目标修正（单一用途的 IK 辅助）
    ///
    /// 绕骨骼自身 Y 轴扭转，使局部 Z 轴与极向方向（pole 在垂直于
    /// head→goal 的平面上的投影）满足 `asin(pole·z) = angle`。
    /// 投影过短时跳过修正并返回 `false`。
    pub fn pole_target_correct(
        skeleton: &mut Skeleton,
        index: usize,
        head: Vec3,
        goal: Vec3,
        pole: Vec3,
        angle: f32,
    ) -> RigResult<bool> {
        let bone = bone_at(skeleton, index)?;

        let y_vec = goal - head;
        let y_len2 = y_vec.length_squared();
        if y_len2 <= f32::EPSILON {
            tracing::debug!(
                target: "skeleton",
                "Pole target correction skipped for bone {}: goal coincides with head",
                bone.name()
            );
            return Ok(false);
        }

        let x_vec = pole - head;
        let x_vec = x_vec - (x_vec.dot(y_vec) / y_len2) * y_vec;
        let x_len = x_vec.length();
        if x_len <= PARALLEL_EPSILON {
            tracing::debug!(
                target: "skeleton",
                "Pole target correction skipped for bone {}: pole projects to zero length",
                bone.name()
            );
            return Ok(false);
        }
        let x_vec = x_vec / x_len;

        let global = *bone.pose_global();
        let z_vec = global.z_axis.truncate().normalize_or_zero();
        let angle0 = x_vec.dot(z_vec).clamp(-1.0, 1.0).asin();

        let rotated = Mat3::from_mat4(global) * Mat3::from_rotation_y(angle - angle0);
        Self::apply_global(skeleton, index, with_rotation_block(global, rotated))?;
        Ok(true)
    }

    /// 写入新的 `pose_global`，反推局部姿态并刷新该骨骼
    fn apply_global(skeleton: &mut Skeleton, index: usize, global: Mat4) -> RigResult<()> {
        let parent = skeleton.parent_of(index).map(|p| *p.pose_global());
        let bone = skeleton
            .bone_at_mut(index)
            .ok_or_else(|| out_of_range(index))?;
        let pose = bone.pose_from(&global, parent.as_ref());
        bone.set_pose(pose);
        skeleton.update_bone(index)
    }
}

fn bone_at(skeleton: &Skeleton, index: usize) -> RigResult<&super::bone::Bone> {
    skeleton.bone_at(index).ok_or_else(|| out_of_range(index))
}

fn bone_at_mut(skeleton: &mut Skeleton, index: usize) -> RigResult<&mut super::bone::Bone> {
    skeleton.bone_at_mut(index).ok_or_else(|| out_of_range(index))
}

fn out_of_range(index: usize) -> RigError {
    RigError::InvalidParameter(format!("bone index {index} out of range"))
}
