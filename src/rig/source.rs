//! 骨架与网格数据源
//!
//! 骨架构建依赖两个外部协作者：
//! - [`ArmatureSource`]：声明式骨骼列表与未归一化的顶点权重
//! - [`MeshSource`]：顶点坐标与命名面组（用于解析关节标记）

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::animation::BoneDefinition;
use crate::core::{RigError, RigResult};

/// 未归一化的顶点权重：骨骼名称 → `(顶点索引, 权重)` 列表
pub type RawVertexWeights = BTreeMap<String, Vec<(usize, f32)>>;

/// 骨架定义来源
pub trait ArmatureSource {
    /// 骨架名称
    fn name(&self) -> &str;

    /// 骨骼定义，父骨骼必须先于子骨骼出现
    fn bone_definitions(&self) -> &[BoneDefinition];

    /// 未归一化的顶点权重，不同骨骼之间可以重叠
    fn raw_vertex_weights(&self) -> &RawVertexWeights;
}

/// 网格数据来源
pub trait MeshSource {
    fn vertex_count(&self) -> usize;

    /// 静止姿态的顶点坐标
    fn rest_coordinates(&self) -> &[Vec3];

    /// 当前（可能已变形）的顶点坐标
    fn coordinates(&self) -> &[Vec3];

    /// 命名面组包含的顶点索引
    fn face_group_vertices(&self, name: &str) -> Option<&[usize]>;

    fn face_group_names(&self) -> Vec<&str>;
}

// ============================================================================
// 声明式骨架定义
// ============================================================================

/// 可序列化的骨架定义
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RigDefinition {
    pub name: String,
    pub bones: Vec<BoneDefinition>,
    #[serde(default)]
    pub weights: RawVertexWeights,
}

impl RigDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// 从JSON字符串解析
    pub fn from_json_str(content: &str) -> RigResult<Self> {
        serde_json::from_str(content).map_err(|e| RigError::Parse(e.to_string()))
    }

    /// 从JSON文件加载
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> RigResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// 从TOML字符串解析
    pub fn from_toml_str(content: &str) -> RigResult<Self> {
        toml::from_str(content).map_err(|e| RigError::Parse(e.to_string()))
    }

    pub fn to_json_string(&self) -> RigResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| RigError::Parse(e.to_string()))
    }
}

impl ArmatureSource for RigDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn bone_definitions(&self) -> &[BoneDefinition] {
        &self.bones
    }

    fn raw_vertex_weights(&self) -> &RawVertexWeights {
        &self.weights
    }
}

// ============================================================================
// 静态网格
// ============================================================================

/// 内存中的静态网格
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticMesh {
    pub rest_coords: Vec<Vec3>,
    /// 变形后的坐标；为空时与静止坐标相同
    #[serde(default)]
    pub coords: Vec<Vec3>,
    #[serde(default)]
    pub face_groups: BTreeMap<String, Vec<usize>>,
}

impl StaticMesh {
    pub fn new(rest_coords: Vec<Vec3>) -> Self {
        Self {
            rest_coords,
            ..Default::default()
        }
    }

    pub fn with_face_group(mut self, name: impl Into<String>, vertices: Vec<usize>) -> Self {
        self.face_groups.insert(name.into(), vertices);
        self
    }

    pub fn set_coords(&mut self, coords: Vec<Vec3>) {
        self.coords = coords;
    }
}

impl MeshSource for StaticMesh {
    fn vertex_count(&self) -> usize {
        self.rest_coords.len()
    }

    fn rest_coordinates(&self) -> &[Vec3] {
        &self.rest_coords
    }

    fn coordinates(&self) -> &[Vec3] {
        if self.coords.is_empty() {
            &self.rest_coords
        } else {
            &self.coords
        }
    }

    fn face_group_vertices(&self, name: &str) -> Option<&[usize]> {
        self.face_groups.get(name).map(Vec::as_slice)
    }

    fn face_group_names(&self) -> Vec<&str> {
        self.face_groups.keys().map(String::as_str).collect()
    }
}
