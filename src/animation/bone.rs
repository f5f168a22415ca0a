//! 骨骼节点
//!
//! 骨骼由 head/tail 两个关节位置和 roll 角定义。骨骼之间可以分离
//! （子骨骼的 head 不必与父骨骼的 tail 重合）。
//!
//! 矩阵约定：
//! - `rest_global`   静止矩阵，世界空间
//! - `rest_relative` 静止矩阵，相对父骨骼
//! - `pose`          姿态矩阵，相对父骨骼及自身静止姿态
//! - `pose_global`   姿态矩阵，世界空间
//! - `pose_verts`    作用于网格顶点的矩阵 (`pose_global * rest_global⁻¹`)

use glam::{Mat3, Mat4, Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use super::orientation::{
    self, cardinal_axis, euler_zyx_to_mat3, get_matrix, mat3_to_euler_xyz,
    normalize_quaternion, orthonormal_rotation, quaternion_from_matrix, try_inverse,
    with_rotation_block, LocalBoneAxis, MeshOrientation,
};
use crate::config::ExportConfig;
use crate::core::{RigError, RigResult};

// ============================================================================
// 骨骼定义
// ============================================================================

/// 声明式骨骼定义（名称、父骨骼、静止几何）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneDefinition {
    pub name: String,
    /// 父骨骼名称（None 或空字符串表示根骨骼）
    #[serde(default)]
    pub parent: Option<String>,
    pub head: Vec3,
    pub tail: Vec3,
    /// roll 角（弧度）
    #[serde(default)]
    pub roll: f32,
}

impl BoneDefinition {
    pub fn new(
        name: impl Into<String>,
        parent: Option<&str>,
        head: Vec3,
        tail: Vec3,
        roll: f32,
    ) -> Self {
        Self {
            name: name.into(),
            parent: parent.filter(|p| !p.is_empty()).map(str::to_string),
            head,
            tail,
            roll,
        }
    }

    /// 父骨骼名称，空字符串视为无父骨骼
    pub fn parent_name(&self) -> Option<&str> {
        self.parent.as_deref().filter(|p| !p.is_empty())
    }
}

/// 骨骼局部旋转的两种表示
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneRotation {
    /// 单位四元数，实部非负
    pub quat: Quat,
    /// 欧拉角（弧度），静态坐标轴，依次绕 X、Y、Z
    pub euler: Vec3,
}

// ============================================================================
// 骨骼节点
// ============================================================================

/// 骨骼节点
///
/// 由 `Skeleton` 独占持有，父子关系以骨骼数组中的索引表示。
#[derive(Clone, Debug)]
pub struct Bone {
    /// 骨骼名称（在所属骨架内唯一）
    pub(crate) name: String,
    /// 广度优先顺序中的索引
    pub(crate) index: usize,
    /// 父骨骼索引（None 表示根骨骼）
    pub(crate) parent: Option<usize>,
    /// 子骨骼索引列表
    pub(crate) children: Vec<usize>,

    head: Vec3,
    tail: Vec3,
    roll: f32,

    length: f32,
    /// 沿骨骼长度方向的齐次向量 `(0, length, 0, 1)`
    y_vector: Vec4,

    rest_global: Mat4,
    rest_relative: Mat4,
    pose: Mat4,
    pose_global: Mat4,
    pose_verts: Mat4,
}

impl Bone {
    pub(crate) fn new(
        name: String,
        index: usize,
        parent: Option<usize>,
        head: Vec3,
        tail: Vec3,
        roll: f32,
    ) -> Self {
        Self {
            name,
            index,
            parent,
            children: Vec::new(),
            head,
            tail,
            roll,
            length: 0.0,
            y_vector: Vec4::W,
            rest_global: Mat4::IDENTITY,
            rest_relative: Mat4::IDENTITY,
            pose: Mat4::IDENTITY,
            pose_global: Mat4::IDENTITY,
            pose_verts: Mat4::IDENTITY,
        }
    }

    // ------------------------------------------------------------------
    // 构建与更新
    // ------------------------------------------------------------------

    /// 从 head/tail/roll 重新计算全部静止矩阵，姿态重置为单位矩阵
    ///
    /// 父骨骼必须已经构建完毕。
    pub(crate) fn build(&mut self, parent: Option<(&Mat4, &Mat4)>) {
        self.pose = Mat4::IDENTITY;

        let (length, rest_global) = get_matrix(self.head, self.tail, self.roll);
        self.length = length;
        self.rest_global = rest_global;
        self.rest_relative = match parent {
            Some((parent_rest_global, _)) => match try_inverse(parent_rest_global) {
                Some(inverse) => inverse * rest_global,
                None => {
                    tracing::warn!(
                        target: "skeleton",
                        "Parent rest matrix of bone {} is singular, using global rest matrix",
                        self.name
                    );
                    rest_global
                }
            },
            None => rest_global,
        };
        self.y_vector = Vec4::new(0.0, length, 0.0, 1.0);

        self.update(parent.map(|(_, pose_global)| pose_global));
    }

    /// 重新计算 `pose_global` 与 `pose_verts`
    ///
    /// 静止矩阵奇异时只记录日志，`pose_verts` 保持旧值，返回 `false`。
    pub(crate) fn update(&mut self, parent_pose_global: Option<&Mat4>) -> bool {
        self.pose_global = match parent_pose_global {
            Some(parent) => *parent * (self.rest_relative * self.pose),
            None => self.rest_relative * self.pose,
        };

        match try_inverse(&self.rest_global) {
            Some(inverse) => {
                self.pose_verts = self.pose_global * inverse;
                true
            }
            None => {
                tracing::debug!(
                    target: "skeleton",
                    "Cannot calculate pose verts matrix for bone {} {} {}",
                    self.name,
                    self.head,
                    self.tail
                );
                false
            }
        }
    }

    /// 由给定的世界空间姿态矩阵反推局部姿态矩阵
    pub(crate) fn pose_from(&self, pose_global: &Mat4, parent_pose_global: Option<&Mat4>) -> Mat4 {
        let inverse_rest = match try_inverse(&self.rest_relative) {
            Some(inverse) => inverse,
            None => {
                tracing::debug!(target: "skeleton", "Singular rest matrix for bone {}", self.name);
                return self.pose;
            }
        };
        match parent_pose_global {
            Some(parent) => match try_inverse(parent) {
                Some(inverse_parent) => inverse_rest * (inverse_parent * *pose_global),
                None => {
                    tracing::debug!(
                        target: "skeleton",
                        "Singular parent pose matrix for bone {}",
                        self.name
                    );
                    self.pose
                }
            },
            None => inverse_rest * *pose_global,
        }
    }

    pub(crate) fn set_rest_geometry(&mut self, head: Vec3, tail: Vec3, roll: f32) {
        self.head = head;
        self.tail = tail;
        self.roll = roll;
    }

    // ------------------------------------------------------------------
    // 拓扑
    // ------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 广度优先顺序中的索引
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    // ------------------------------------------------------------------
    // 静止几何
    // ------------------------------------------------------------------

    pub fn rest_head(&self) -> Vec3 {
        self.head
    }

    pub fn rest_tail(&self) -> Vec3 {
        self.tail
    }

    /// 定义时给出的 roll 角（弧度）
    pub fn roll(&self) -> f32 {
        self.roll
    }

    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn rest_global(&self) -> &Mat4 {
        &self.rest_global
    }

    pub fn rest_relative(&self) -> &Mat4 {
        &self.rest_relative
    }

    /// 静止朝向的四元数
    pub fn rest_orientation_quat(&self) -> Quat {
        quaternion_from_matrix(&self.rest_global)
    }

    /// 从静止矩阵的旋转块重建 roll 角
    ///
    /// 迹接近退化（`trace + 1 < 1e-4`）时返回 π。
    pub fn rest_roll(&self) -> f32 {
        let r = &self.rest_global;
        // r[0][2] - r[2][0]
        let qy = r.z_axis.x - r.x_axis.z;
        let qw = r.x_axis.x + r.y_axis.y + r.z_axis.z + 1.0;
        if qw < 1e-4 {
            std::f32::consts::PI
        } else {
            2.0 * qy.atan2(qw)
        }
    }

    /// 按导出约定重新表达的静止矩阵
    pub fn rest_matrix(
        &self,
        mesh_orientation: MeshOrientation,
        local_bone_axis: LocalBoneAxis,
        offset: Vec3,
    ) -> Mat4 {
        orientation::transform_bone_matrix(
            &self.rest_global,
            mesh_orientation,
            local_bone_axis,
            offset,
        )
    }

    /// 按导出配置重新表达的静止矩阵
    pub fn rest_matrix_with(&self, config: &ExportConfig) -> Mat4 {
        self.rest_matrix(config.mesh_orientation, config.local_bone_axis, config.offset())
    }

    /// 绑定矩阵 `(bind, bind_inverse)`
    ///
    /// `bind_inverse` 为加上偏移后静止矩阵的转置，`bind` 为其逆。
    pub fn bind_matrix(&self, offset: Vec3) -> (Mat4, Mat4) {
        let mut rest = self.rest_global;
        rest.w_axis += offset.extend(0.0);
        let bind_inverse = rest.transpose();
        let bind = try_inverse(&bind_inverse).unwrap_or_else(|| {
            tracing::debug!(target: "skeleton", "Singular bind matrix for bone {}", self.name);
            Mat4::IDENTITY
        });
        (bind, bind_inverse)
    }

    // ------------------------------------------------------------------
    // 姿态
    // ------------------------------------------------------------------

    pub fn pose(&self) -> &Mat4 {
        &self.pose
    }

    pub fn pose_global(&self) -> &Mat4 {
        &self.pose_global
    }

    pub fn pose_verts(&self) -> &Mat4 {
        &self.pose_verts
    }

    /// 直接设置姿态矩阵；需要随后调用 `Skeleton::update`
    pub fn set_pose(&mut self, pose: Mat4) {
        self.pose = pose;
    }

    /// 姿态矩阵严格等于单位矩阵（无容差）
    pub fn is_in_rest_pose(&self) -> bool {
        self.pose == Mat4::IDENTITY
    }

    /// 世界空间中的姿态 head 位置
    pub fn head(&self) -> Vec3 {
        self.pose_global.w_axis.truncate()
    }

    /// 世界空间中的姿态 tail 位置
    pub fn tail(&self) -> Vec3 {
        (self.pose_global * self.y_vector).truncate()
    }

    pub fn pose_quaternion(&self) -> Quat {
        quaternion_from_matrix(&self.pose)
    }

    /// 以四元数设置局部姿态（平移被清除）
    pub fn set_pose_quaternion(&mut self, quat: Quat) {
        self.pose = Mat4::from_quat(quat.normalize());
    }

    /// 以欧拉角设置局部旋转：静态坐标轴，依次绕 Z、Y、X
    ///
    /// 只替换旋转块，平移保持不变。
    pub fn set_rotation(&mut self, angles: Vec3) {
        self.pose = with_rotation_block(self.pose, euler_zyx_to_mat3(angles));
    }

    /// 局部旋转的四元数与欧拉角（静态坐标轴，依次绕 X、Y、Z）
    pub fn rotation(&self) -> BoneRotation {
        BoneRotation {
            quat: self.pose_quaternion(),
            euler: mat3_to_euler_xyz(&orthonormal_rotation(&self.pose)),
        }
    }

    /// 修改单个旋转通道 (1=x, 2=y, 3=z)
    ///
    /// `use_quat` 为真时把 `value` 写入四元数对应的虚部分量并重新计算实部，
    /// 否则把 `value` 作为该轴的欧拉角（弧度）。返回修改后的四元数。
    pub fn set_rotation_index(&mut self, index: usize, value: f32, use_quat: bool) -> RigResult<Quat> {
        if !(1..=3).contains(&index) {
            return Err(RigError::InvalidParameter(format!(
                "rotation channel must be 1, 2 or 3, got {index}"
            )));
        }

        if use_quat {
            let mut quat = self.pose_quaternion();
            match index {
                1 => quat.x = value,
                2 => quat.y = value,
                _ => quat.z = value,
            }
            let quat = normalize_quaternion(quat);
            self.pose = Mat4::from_quat(quat);
            Ok(quat)
        } else {
            let mut euler = self.rotation().euler;
            match index {
                1 => euler.x = value,
                2 => euler.y = value,
                _ => euler.z = value,
            }
            let rotation = orientation::euler_xyz_to_mat3(euler);
            self.pose = with_rotation_block(self.pose, rotation);
            Ok(Quat::from_mat3(&rotation))
        }
    }

    /// 在局部空间绕基本坐标轴 (0=x, 1=y, 2=z) 旋转
    pub fn rotate_local(&mut self, angle: f32, axis: usize) -> RigResult<()> {
        let rotation = Mat3::from_axis_angle(cardinal_axis(axis)?, angle);
        let rotated = rotation * Mat3::from_mat4(self.pose);
        self.pose = with_rotation_block(self.pose, rotated);
        Ok(())
    }

    pub(crate) fn display(&self) {
        tracing::debug!(
            target: "skeleton",
            "  <Bone {} index={} parent={:?} head={} tail={} roll={} length={}>",
            self.name,
            self.index,
            self.parent,
            self.head,
            self.tail,
            self.roll,
            self.length
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn built_root(head: Vec3, tail: Vec3, roll: f32) -> Bone {
        let mut bone = Bone::new("root".to_string(), 0, None, head, tail, roll);
        bone.build(None);
        bone
    }

    #[test]
    fn test_definition_empty_parent_is_root() {
        let def = BoneDefinition::new("root", Some(""), Vec3::ZERO, Vec3::Y, 0.0);
        assert_eq!(def.parent_name(), None);
    }

    #[test]
    fn test_build_resets_pose() {
        let mut bone = built_root(Vec3::ZERO, Vec3::Y, 0.0);
        bone.set_rotation(Vec3::new(0.1, 0.2, 0.3));
        assert!(!bone.is_in_rest_pose());

        bone.build(None);
        assert!(bone.is_in_rest_pose());
        assert_eq!(bone.pose_global(), bone.rest_global());
    }

    #[test]
    fn test_head_and_tail_at_rest() {
        let head = Vec3::new(0.0, 1.0, 0.0);
        let tail = Vec3::new(0.5, 2.0, 0.5);
        let bone = built_root(head, tail, 0.4);

        assert!(bone.head().abs_diff_eq(head, 1e-5));
        assert!(bone.tail().abs_diff_eq(tail, 1e-5));
        assert!((bone.length() - (tail - head).length()).abs() < 1e-5);
    }

    #[test]
    fn test_pose_verts_identity_at_rest() {
        let bone = built_root(Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 1.0), 0.2);
        assert!(bone.pose_verts().abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn test_rest_roll_recovers_roll() {
        let bone = built_root(Vec3::ZERO, Vec3::Y, 0.5);
        assert!((bone.rest_roll() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_rest_roll_half_turn_trace_degenerate() {
        // roll = ±π 时旋转块的迹为 -1
        for roll in [std::f32::consts::PI, -std::f32::consts::PI] {
            let bone = built_root(Vec3::ZERO, Vec3::Y, roll);
            let r = bone.rest_global();
            assert!((r.x_axis.x + r.y_axis.y + r.z_axis.z + 1.0).abs() < 1e-4);
            assert_eq!(bone.rest_roll(), std::f32::consts::PI);
        }
    }

    #[test]
    fn test_set_rotation_and_read_back() {
        let mut bone = built_root(Vec3::ZERO, Vec3::Y, 0.0);
        bone.set_rotation(Vec3::new(0.0, 0.0, 0.7));

        // 单轴旋转在两种欧拉约定下一致
        let rotation = bone.rotation();
        assert!(rotation.euler.abs_diff_eq(Vec3::new(0.0, 0.0, 0.7), 1e-5));
        assert!(rotation.quat.abs_diff_eq(Quat::from_rotation_z(0.7), 1e-5));
    }

    #[test]
    fn test_pose_quaternion_round_trip() {
        let mut bone = built_root(Vec3::ZERO, Vec3::Y, 0.0);
        let q = Quat::from_euler(glam::EulerRot::XYZ, 0.2, -0.4, 0.9);
        bone.set_pose_quaternion(q);
        assert!(bone.pose_quaternion().abs_diff_eq(q, 1e-5));
    }

    #[test]
    fn test_set_rotation_index_quaternion() {
        let mut bone = built_root(Vec3::ZERO, Vec3::Y, 0.0);
        let quat = bone.set_rotation_index(1, 0.6, true).unwrap();
        assert!((quat.x - 0.6).abs() < 1e-6);
        assert!((quat.w - 0.8).abs() < 1e-6);
        assert!(bone.pose_quaternion().abs_diff_eq(quat, 1e-5));
    }

    #[test]
    fn test_set_rotation_index_euler() {
        let mut bone = built_root(Vec3::ZERO, Vec3::Y, 0.0);
        bone.set_rotation_index(2, 0.3, false).unwrap();
        bone.set_rotation_index(3, -0.2, false).unwrap();
        let euler = bone.rotation().euler;
        assert!(euler.abs_diff_eq(Vec3::new(0.0, 0.3, -0.2), 1e-5));
    }

    #[test]
    fn test_set_rotation_index_invalid_channel() {
        let mut bone = built_root(Vec3::ZERO, Vec3::Y, 0.0);
        assert!(bone.set_rotation_index(0, 0.1, true).is_err());
        assert!(bone.set_rotation_index(4, 0.1, false).is_err());
        assert!(bone.is_in_rest_pose());
    }

    #[test]
    fn test_rotate_local_keeps_translation() {
        let mut bone = built_root(Vec3::ZERO, Vec3::Y, 0.0);
        bone.set_pose(Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)));
        bone.rotate_local(FRAC_PI_2, 2).unwrap();

        assert_eq!(bone.pose().w_axis, Vec4::new(1.0, 2.0, 3.0, 1.0));
        assert!(bone
            .pose()
            .x_axis
            .truncate()
            .abs_diff_eq(Vec3::Y, 1e-5));
        assert!(bone.rotate_local(0.1, 5).is_err());
    }

    #[test]
    fn test_rest_matrix_with_config() {
        let bone = built_root(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 2.0, 0.0), 0.0);
        let config = ExportConfig {
            local_bone_axis: LocalBoneAxis::Global,
            offset: [1.0, 0.0, 0.0],
            ..Default::default()
        };
        let mat = bone.rest_matrix_with(&config);
        assert_eq!(mat.w_axis, Vec4::new(1.0, 1.0, 0.0, 1.0));
        assert_eq!(Mat3::from_mat4(mat), Mat3::IDENTITY);
    }

    #[test]
    fn test_bind_matrix_is_inverse_pair() {
        let bone = built_root(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.3, 2.0, 0.1), 0.0);
        let (bind, bind_inverse) = bone.bind_matrix(Vec3::new(0.0, 0.5, 0.0));
        assert!((bind * bind_inverse).abs_diff_eq(Mat4::IDENTITY, 1e-5));
        // 平移在转置后位于第四行
        assert!((bind_inverse.x_axis.w - 0.0).abs() < 1e-6);
        assert!((bind_inverse.y_axis.w - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_singular_rest_matrix_leaves_pose_verts_stale() {
        let mut bone = built_root(Vec3::ZERO, Vec3::Y, 0.0);
        let stale = *bone.pose_verts();
        bone.rest_global = Mat4::ZERO;
        bone.set_pose(Mat4::from_rotation_x(0.3));
        assert!(!bone.update(None));
        assert_eq!(*bone.pose_verts(), stale);
    }
}
