//! 矩阵与朝向工具
//!
//! 纯函数集合：
//! - 骨骼静止朝向矩阵的计算（head/tail/roll → 4x4）
//! - Y-up / Z-up 坐标系转换
//! - 导出用的网格朝向与骨骼局部轴转换
//! - 欧拉角 / 四元数 / 矩阵之间的转换
//!
//! 骨骼系统内部始终使用 Y-up 约定，矩阵作用于列向量（`M * v`）。

use std::f32::consts::{FRAC_PI_2, PI};
use std::fmt;
use std::str::FromStr;

use glam::{Mat3, Mat4, Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::core::{RigError, RigResult};

/// 判定骨骼方向与参考轴平行的容差
pub const PARALLEL_EPSILON: f32 = 1e-6;

/// 行列式绝对值低于该值的矩阵视为奇异
pub const SINGULAR_EPSILON: f32 = 1e-12;

/// Z-up → Y-up 的基变换：`(x, y, z) -> (x, z, -y)`
const Y_UP_FROM_Z_UP: Mat4 = Mat4::from_cols(
    Vec4::new(1.0, 0.0, 0.0, 0.0),
    Vec4::new(0.0, 0.0, -1.0, 0.0),
    Vec4::new(0.0, 1.0, 0.0, 0.0),
    Vec4::new(0.0, 0.0, 0.0, 1.0),
);

// ============================================================================
// 坐标约定
// ============================================================================

/// 网格朝向：哪个轴朝上，模型面向哪个方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MeshOrientation {
    /// Y 朝上，面向 +Z（骨骼系统的原生约定）
    #[default]
    #[serde(rename = "yUpFaceZ")]
    YUpFaceZ,
    /// Y 朝上，面向 +X
    #[serde(rename = "yUpFaceX")]
    YUpFaceX,
    /// Z 朝上，面向 -Y
    #[serde(rename = "zUpFaceNegY")]
    ZUpFaceNegY,
    /// Z 朝上，面向 +X
    #[serde(rename = "zUpFaceX")]
    ZUpFaceX,
}

impl MeshOrientation {
    pub const ALL: [MeshOrientation; 4] = [
        MeshOrientation::YUpFaceZ,
        MeshOrientation::YUpFaceX,
        MeshOrientation::ZUpFaceNegY,
        MeshOrientation::ZUpFaceX,
    ];

    /// 从原生约定到该朝向的旋转
    pub fn rotation(self) -> Mat4 {
        match self {
            MeshOrientation::YUpFaceZ => Mat4::IDENTITY,
            MeshOrientation::YUpFaceX => Mat4::from_rotation_y(FRAC_PI_2),
            MeshOrientation::ZUpFaceNegY => Mat4::from_rotation_x(FRAC_PI_2),
            MeshOrientation::ZUpFaceX => {
                Mat4::from_rotation_z(FRAC_PI_2) * Mat4::from_rotation_x(FRAC_PI_2)
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MeshOrientation::YUpFaceZ => "yUpFaceZ",
            MeshOrientation::YUpFaceX => "yUpFaceX",
            MeshOrientation::ZUpFaceNegY => "zUpFaceNegY",
            MeshOrientation::ZUpFaceX => "zUpFaceX",
        }
    }
}

impl fmt::Display for MeshOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeshOrientation {
    type Err = RigError;

    /// 接受名称或数字编号 (0-3)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0" | "yUpFaceZ" => Ok(MeshOrientation::YUpFaceZ),
            "1" | "yUpFaceX" => Ok(MeshOrientation::YUpFaceX),
            "2" | "zUpFaceNegY" => Ok(MeshOrientation::ZUpFaceNegY),
            "3" | "zUpFaceX" => Ok(MeshOrientation::ZUpFaceX),
            other => Err(RigError::InvalidParameter(format!(
                "invalid mesh orientation {other}"
            ))),
        }
    }
}

/// 骨骼局部轴约定：哪个局部轴沿骨骼长度方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalBoneAxis {
    /// Y 沿骨骼，X 为弯曲轴
    #[default]
    Y,
    /// X 沿骨骼，Y 为弯曲轴
    X,
    /// 全局坐标系：只保留平移，丢弃旋转
    #[serde(rename = "g")]
    Global,
}

impl LocalBoneAxis {
    pub fn as_str(self) -> &'static str {
        match self {
            LocalBoneAxis::Y => "y",
            LocalBoneAxis::X => "x",
            LocalBoneAxis::Global => "g",
        }
    }
}

impl fmt::Display for LocalBoneAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocalBoneAxis {
    type Err = RigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "y" => Ok(LocalBoneAxis::Y),
            "x" => Ok(LocalBoneAxis::X),
            "g" => Ok(LocalBoneAxis::Global),
            other => Err(RigError::InvalidParameter(format!(
                "invalid local bone axis {other}"
            ))),
        }
    }
}

// ============================================================================
// 坐标系转换
// ============================================================================

/// 向量从 Y-up 转到 Z-up：`(x, y, z) -> (x, -z, y)`
#[inline]
pub fn to_z_up(vec: Vec3) -> Vec3 {
    Vec3::new(vec.x, -vec.z, vec.y)
}

/// 矩阵从 Z-up 转回 Y-up（左乘基变换）
#[inline]
pub fn from_z_up(mat: Mat4) -> Mat4 {
    Y_UP_FROM_Z_UP * mat
}

// ============================================================================
// 静止朝向
// ============================================================================

/// 计算 head 与 tail 之间骨骼的静止朝向矩阵
///
/// 返回 `(骨骼长度, 世界空间静止矩阵)`。矩阵的局部 Y 轴从 head 指向 tail，
/// 平移部分为 head。方向向量的推导在 Z-up 空间中完成后再转换回 Y-up。
///
/// 零长度骨骼的方向退化为固定轴，不会失败。
pub fn get_matrix(head: Vec3, tail: Vec3, roll: f32) -> (f32, Mat4) {
    let vector = to_z_up(tail - head);
    let length = vector.length();
    let vector = if length == 0.0 {
        tracing::debug!(target: "skeleton", "Zero-length bone at {head}, using fixed axis");
        Vec3::Z
    } else {
        vector / length
    };

    let yproj = vector.dot(Vec3::Y);
    let (axis, angle) = if yproj > 1.0 - PARALLEL_EPSILON {
        (Vec3::Y, 0.0)
    } else if yproj < -1.0 + PARALLEL_EPSILON {
        // 反平行：绕 X 轴翻转 180°
        (Vec3::X, PI)
    } else {
        (Vec3::Y.cross(vector).normalize(), yproj.acos())
    };

    let mut mat = Mat4::from_axis_angle(axis, angle);
    if roll != 0.0 {
        mat *= Mat4::from_axis_angle(Vec3::Y, roll);
    }
    let mut mat = from_z_up(mat);
    mat.w_axis = head.extend(1.0);
    (length, mat)
}

/// 将静止/姿态矩阵按指定的网格朝向和骨骼局部轴重新表达
///
/// 只被导出器使用；骨骼系统内部始终使用原生 Y-up 约定。
pub fn transform_bone_matrix(
    mat: &Mat4,
    mesh_orientation: MeshOrientation,
    local_bone_axis: LocalBoneAxis,
    offset: Vec3,
) -> Mat4 {
    let mut mat = *mat;
    mat.w_axis += offset.extend(0.0);

    let rot = mesh_orientation.rotation();
    match local_bone_axis {
        LocalBoneAxis::Y => rot * mat,
        LocalBoneAxis::X => {
            let rot_xy = Mat4::from_rotation_x(-FRAC_PI_2) * Mat4::from_rotation_y(FRAC_PI_2);
            rot * mat * rot_xy
        }
        LocalBoneAxis::Global => {
            Mat4::from_cols(Vec4::X, Vec4::Y, Vec4::Z, rot * mat.w_axis)
        }
    }
}

// ============================================================================
// 矩阵辅助
// ============================================================================

/// 求逆；奇异或非有限矩阵返回 `None`
pub fn try_inverse(mat: &Mat4) -> Option<Mat4> {
    let det = mat.determinant();
    if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
        return None;
    }
    let inverse = mat.inverse();
    if inverse.is_finite() {
        Some(inverse)
    } else {
        None
    }
}

/// 替换矩阵的 3x3 旋转块，保留平移列
#[inline]
pub fn with_rotation_block(mat: Mat4, rotation: Mat3) -> Mat4 {
    Mat4::from_cols(
        rotation.x_axis.extend(0.0),
        rotation.y_axis.extend(0.0),
        rotation.z_axis.extend(0.0),
        mat.w_axis,
    )
}

/// 列向量归一化后的旋转部分（去掉缩放）
pub fn orthonormal_rotation(mat: &Mat4) -> Mat3 {
    let m = Mat3::from_mat4(*mat);
    Mat3::from_cols(
        m.x_axis.normalize_or_zero(),
        m.y_axis.normalize_or_zero(),
        m.z_axis.normalize_or_zero(),
    )
}

/// 矩阵旋转部分对应的单位四元数，实部非负
pub fn quaternion_from_matrix(mat: &Mat4) -> Quat {
    let quat = Quat::from_mat3(&orthonormal_rotation(mat)).normalize();
    if quat.w < 0.0 {
        -quat
    } else {
        quat
    }
}

// ============================================================================
// 欧拉角
// ============================================================================

/// 静态坐标轴，先绕 X、再绕 Y、最后绕 Z：`Rz * Ry * Rx`
pub fn euler_xyz_to_mat3(angles: Vec3) -> Mat3 {
    Mat3::from_rotation_z(angles.z) * Mat3::from_rotation_y(angles.y) * Mat3::from_rotation_x(angles.x)
}

/// `euler_xyz_to_mat3` 的逆运算
pub fn mat3_to_euler_xyz(m: &Mat3) -> Vec3 {
    // m[row][col] == m.col(col)[row]
    let m00 = m.x_axis.x;
    let m10 = m.x_axis.y;
    let m20 = m.x_axis.z;
    let cy = (m00 * m00 + m10 * m10).sqrt();
    if cy > 4.0 * f32::EPSILON {
        Vec3::new(
            m.y_axis.z.atan2(m.z_axis.z),
            (-m20).atan2(cy),
            m10.atan2(m00),
        )
    } else {
        Vec3::new((-m.z_axis.y).atan2(m.y_axis.y), (-m20).atan2(cy), 0.0)
    }
}

/// 静态坐标轴，先绕 Z、再绕 Y、最后绕 X：`Rx * Ry * Rz`
pub fn euler_zyx_to_mat3(angles: Vec3) -> Mat3 {
    Mat3::from_rotation_x(angles.x) * Mat3::from_rotation_y(angles.y) * Mat3::from_rotation_z(angles.z)
}

/// `euler_zyx_to_mat3` 的逆运算
pub fn mat3_to_euler_zyx(m: &Mat3) -> Vec3 {
    let m00 = m.x_axis.x;
    let m01 = m.y_axis.x;
    let m02 = m.z_axis.x;
    let cy = (m00 * m00 + m01 * m01).sqrt();
    if cy > 4.0 * f32::EPSILON {
        Vec3::new(
            (-m.z_axis.y).atan2(m.z_axis.z),
            m02.atan2(cy),
            (-m01).atan2(m00),
        )
    } else {
        Vec3::new(m.y_axis.z.atan2(m.y_axis.y), m02.atan2(cy), 0.0)
    }
}

// ============================================================================
// 四元数
// ============================================================================

/// 修改某个虚部分量后重新计算实部
///
/// `w = sign(w) * sqrt(1 - min(1, x² + y² + z²))`，用于交互式逐通道旋转编辑。
pub fn normalize_quaternion(quat: Quat) -> Quat {
    let r2 = (quat.x * quat.x + quat.y * quat.y + quat.z * quat.z).min(1.0);
    let sign = if quat.w >= 0.0 { 1.0 } else { -1.0 };
    Quat::from_xyzw(quat.x, quat.y, quat.z, sign * (1.0 - r2).sqrt())
}

/// 四元数的近似欧拉角（`2 * atan(v / w)`），实部接近零时返回零
pub fn quat_angles(quat: Quat) -> Vec3 {
    if quat.w.abs() < 1e-4 {
        Vec3::ZERO
    } else {
        Vec3::new(
            2.0 * (quat.x / quat.w).atan(),
            2.0 * (quat.y / quat.w).atan(),
            2.0 * (quat.z / quat.w).atan(),
        )
    }
}

/// 基本坐标轴 (0=x, 1=y, 2=z)
pub fn cardinal_axis(axis: usize) -> RigResult<Vec3> {
    match axis {
        0 => Ok(Vec3::X),
        1 => Ok(Vec3::Y),
        2 => Ok(Vec3::Z),
        other => Err(RigError::InvalidParameter(format!(
            "rotation axis must be 0, 1 or 2, got {other}"
        ))),
    }
}
