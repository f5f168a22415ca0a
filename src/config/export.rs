use super::{ConfigError, ConfigResult};
use crate::animation::{LocalBoneAxis, MeshOrientation};
use crate::impl_default;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// 导出约定
///
/// 导出器读取骨骼静止矩阵时使用的网格朝向、局部骨骼轴与平移偏移。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// 网格朝向
    pub mesh_orientation: MeshOrientation,

    /// 骨骼局部轴
    pub local_bone_axis: LocalBoneAxis,

    /// 平移偏移
    pub offset: [f32; 3],
}

impl_default!(ExportConfig {
    mesh_orientation: MeshOrientation::YUpFaceZ,
    local_bone_axis: LocalBoneAxis::Y,
    offset: [0.0; 3],
});

impl ExportConfig {
    pub fn offset(&self) -> Vec3 {
        Vec3::from_array(self.offset)
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.offset.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::ValidationError(
                "Export offset must be finite".to_string(),
            ));
        }
        Ok(())
    }
}
