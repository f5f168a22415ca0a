//! 骨骼层级
//!
//! 骨架分为两个阶段：
//! - [`SkeletonBuilder`]：可变拓扑，逐个添加骨骼
//! - [`Skeleton`]：拓扑冻结，可以设置姿态与蒙皮
//!
//! `Skeleton` 中的骨骼数组按广度优先顺序存放（根骨骼按添加顺序入队，
//! 子骨骼按子列表顺序入队），因此数组索引就是外部可见的规范索引，
//! 并且父骨骼的索引总是小于子骨骼。

use std::collections::{HashMap, VecDeque};

use glam::{Mat3, Mat4, Vec3, Vec4};

use super::bone::{Bone, BoneDefinition};
use super::orientation::{try_inverse, LocalBoneAxis, MeshOrientation};
use super::skin::{self, VertexBoneWeights};
use crate::config::SkinningConfig;
use crate::core::{Progress, RigError, RigResult};

// ============================================================================
// 构建阶段
// ============================================================================

/// 骨架构建器（拓扑可变）
#[derive(Clone, Debug, Default)]
pub struct SkeletonBuilder {
    name: String,
    definitions: Vec<BoneDefinition>,
    /// 骨骼名称到定义索引的映射
    lookup: HashMap<String, usize>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl SkeletonBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 添加骨骼
    ///
    /// 名称重复或父骨骼未知时返回结构错误，构建器保持不变。
    /// `parent` 为 `None` 或空字符串时作为根骨骼。
    pub fn add_bone(
        &mut self,
        name: &str,
        parent: Option<&str>,
        head: Vec3,
        tail: Vec3,
        roll: f32,
    ) -> RigResult<usize> {
        self.add_definition(BoneDefinition::new(name, parent, head, tail, roll))
    }

    /// 以声明式定义添加骨骼
    pub fn add_definition(&mut self, definition: BoneDefinition) -> RigResult<usize> {
        if self.lookup.contains_key(&definition.name) {
            return Err(RigError::DuplicateBone {
                skeleton: self.name.clone(),
                bone: definition.name,
            });
        }

        let parent = match definition.parent_name() {
            Some(parent_name) => match self.lookup.get(parent_name) {
                Some(&index) => Some(index),
                None => {
                    return Err(RigError::UnknownParent {
                        bone: definition.name.clone(),
                        parent: parent_name.to_string(),
                    })
                }
            },
            None => None,
        };

        let index = self.definitions.len();
        match parent {
            Some(parent_index) => self.children[parent_index].push(index),
            None => self.roots.push(index),
        }
        self.lookup.insert(definition.name.clone(), index);
        self.children.push(Vec::new());
        self.definitions.push(definition);
        Ok(index)
    }

    pub fn bone_count(&self) -> usize {
        self.definitions.len()
    }

    pub fn contains_bone(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }

    pub fn definitions(&self) -> &[BoneDefinition] {
        &self.definitions
    }

    /// 计算广度优先顺序并构建所有骨骼的静止矩阵
    pub fn build(self) -> Skeleton {
        self.build_with_progress(&mut Progress::silent())
    }

    pub fn build_with_progress(self, progress: &mut Progress<'_>) -> Skeleton {
        let count = self.definitions.len();
        progress.set_steps(count);

        let mut order = Vec::with_capacity(count);
        let mut queue: VecDeque<usize> = self.roots.iter().copied().collect();
        while let Some(index) = queue.pop_front() {
            order.push(index);
            queue.extend(self.children[index].iter().copied());
        }

        let mut remap = vec![0usize; count];
        for (position, &original) in order.iter().enumerate() {
            remap[original] = position;
        }

        let mut definitions: Vec<Option<BoneDefinition>> =
            self.definitions.into_iter().map(Some).collect();

        let mut bones = Vec::with_capacity(count);
        for (position, &original) in order.iter().enumerate() {
            let Some(definition) = definitions[original].take() else {
                continue;
            };
            let parent = definition
                .parent_name()
                .and_then(|parent_name| self.lookup.get(parent_name))
                .map(|&parent| remap[parent]);

            let mut bone = Bone::new(
                definition.name,
                position,
                parent,
                definition.head,
                definition.tail,
                definition.roll,
            );
            bone.children = self.children[original].iter().map(|&c| remap[c]).collect();
            bones.push(bone);
        }

        let lookup = bones
            .iter()
            .map(|bone| (bone.name.clone(), bone.index))
            .collect();
        let roots = self.roots.iter().map(|&r| remap[r]).collect();

        let mut skeleton = Skeleton {
            name: self.name,
            bones,
            lookup,
            roots,
        };
        for index in 0..skeleton.bones.len() {
            skeleton.build_bone(index);
            progress.step();
        }

        tracing::debug!(
            target: "skeleton",
            "Built skeleton {} with {} bones",
            skeleton.name,
            skeleton.bones.len()
        );
        skeleton
    }
}

// ============================================================================
// 姿态阶段
// ============================================================================

/// 骨架（拓扑冻结，可设置姿态）
#[derive(Clone, Debug)]
pub struct Skeleton {
    name: String,
    /// 广度优先顺序
    bones: Vec<Bone>,
    /// 骨骼名称到索引的映射
    lookup: HashMap<String, usize>,
    roots: Vec<usize>,
}

impl Skeleton {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    // ------------------------------------------------------------------
    // 查询
    // ------------------------------------------------------------------

    /// 广度优先顺序的骨骼列表
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// 根骨骼索引（按添加顺序）
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// 第一个根骨骼
    pub fn root_bone(&self) -> Option<&Bone> {
        self.roots.first().map(|&index| &self.bones[index])
    }

    /// 通过名称获取骨骼，未知名称为结构错误
    pub fn bone(&self, name: &str) -> RigResult<&Bone> {
        match self.lookup.get(name) {
            Some(&index) => Ok(&self.bones[index]),
            None => Err(RigError::BoneNotFound(name.to_string())),
        }
    }

    pub fn bone_mut(&mut self, name: &str) -> RigResult<&mut Bone> {
        match self.lookup.get(name) {
            Some(&index) => Ok(&mut self.bones[index]),
            None => Err(RigError::BoneNotFound(name.to_string())),
        }
    }

    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    pub fn bone_at(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    pub fn bone_at_mut(&mut self, index: usize) -> Option<&mut Bone> {
        self.bones.get_mut(index)
    }

    pub fn contains_bone(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }

    /// 规范的广度优先 名称→索引 映射
    pub fn bone_to_index_mapping(&self) -> &HashMap<String, usize> {
        &self.lookup
    }

    /// 深度优先的关节名称（从第一个根骨骼开始，BVH 顺序）
    pub fn joint_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.bones.len());
        let Some(&root) = self.roots.first() else {
            return names;
        };

        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            let bone = &self.bones[index];
            names.push(bone.name.clone());
            stack.extend(bone.children.iter().rev().copied());
        }
        names
    }

    pub(crate) fn parent_of(&self, index: usize) -> Option<&Bone> {
        self.bones
            .get(index)
            .and_then(|bone| bone.parent)
            .map(|parent| &self.bones[parent])
    }

    fn checked_index(&self, index: usize) -> RigResult<usize> {
        if index < self.bones.len() {
            Ok(index)
        } else {
            Err(RigError::InvalidParameter(format!(
                "bone index {index} out of range for {} bones",
                self.bones.len()
            )))
        }
    }

    // ------------------------------------------------------------------
    // 静止几何
    // ------------------------------------------------------------------

    /// 骨骼 head 相对父骨骼 head 的偏移（根骨骼为 head 本身）
    pub fn rest_offset(&self, index: usize) -> RigResult<Vec3> {
        let index = self.checked_index(index)?;
        let head = self.bones[index].rest_head();
        Ok(match self.parent_of(index) {
            Some(parent) => head - parent.rest_head(),
            None => head,
        })
    }

    /// `rest_offset` 的单位向量（偏移为零时返回零向量）
    pub fn rest_direction(&self, index: usize) -> RigResult<Vec3> {
        Ok(self.rest_offset(index)?.normalize_or_zero())
    }

    /// 相对父骨骼的静止矩阵，按导出约定表达
    pub fn relative_matrix(
        &self,
        index: usize,
        mesh_orientation: MeshOrientation,
        local_bone_axis: LocalBoneAxis,
        offset: Vec3,
    ) -> RigResult<Mat4> {
        let index = self.checked_index(index)?;
        let rest = self.bones[index].rest_matrix(mesh_orientation, local_bone_axis, offset);
        let Some(parent) = self.parent_of(index) else {
            return Ok(rest);
        };

        let parent_rest = parent.rest_matrix(mesh_orientation, local_bone_axis, offset);
        match try_inverse(&parent_rest) {
            Some(inverse) => Ok(inverse * rest),
            None => {
                tracing::debug!(
                    target: "skeleton",
                    "Singular export matrix for parent of bone {}",
                    self.bones[index].name
                );
                Ok(rest)
            }
        }
    }

    /// 替换已有骨骼的静止几何并重建静止矩阵（姿态被重置）
    ///
    /// 所有定义先全部校验，任一名称未知时不做任何修改。拓扑不变，
    /// 定义中的父骨骼字段被忽略。
    pub fn update_joints(&mut self, definitions: &[BoneDefinition]) -> RigResult<()> {
        let indices = definitions
            .iter()
            .map(|definition| {
                self.bone_index(&definition.name)
                    .ok_or_else(|| RigError::BoneNotFound(definition.name.clone()))
            })
            .collect::<RigResult<Vec<_>>>()?;

        for (definition, index) in definitions.iter().zip(indices) {
            self.bones[index].set_rest_geometry(definition.head, definition.tail, definition.roll);
        }
        for index in 0..self.bones.len() {
            self.build_bone(index);
        }
        Ok(())
    }

    /// 复制出一个静止 head/tail 等比缩放的独立骨架
    pub fn scaled(&self, factor: f32) -> Skeleton {
        let mut builder = SkeletonBuilder::new(self.name.clone());
        for bone in &self.bones {
            let parent = bone.parent.map(|p| self.bones[p].name.as_str());
            // 广度优先顺序保证父骨骼先于子骨骼添加
            if let Err(err) = builder.add_bone(
                &bone.name,
                parent,
                bone.rest_head() * factor,
                bone.rest_tail() * factor,
                bone.roll(),
            ) {
                tracing::warn!(target: "skeleton", "Skipping bone while scaling: {}", err);
            }
        }
        builder.build()
    }

    /// 统一骨骼命名：小写，空格与连字符替换为下划线
    ///
    /// 规范化后出现重名时返回结构错误，骨架保持不变。
    pub fn canonicalize_bone_names(&mut self) -> RigResult<()> {
        let canonical: Vec<String> = self
            .bones
            .iter()
            .map(|bone| canonical_bone_name(&bone.name))
            .collect();

        let mut lookup = HashMap::with_capacity(canonical.len());
        for (index, name) in canonical.iter().enumerate() {
            if lookup.insert(name.clone(), index).is_some() {
                return Err(RigError::DuplicateBone {
                    skeleton: self.name.clone(),
                    bone: name.clone(),
                });
            }
        }

        for (bone, name) in self.bones.iter_mut().zip(canonical) {
            bone.name = name;
        }
        self.lookup = lookup;
        Ok(())
    }

    /// 回到构建阶段以修改拓扑
    pub fn into_builder(self) -> SkeletonBuilder {
        let mut builder = SkeletonBuilder::new(self.name);
        for bone in &self.bones {
            let parent = bone.parent.map(|p| self.bones[p].name.as_str());
            if let Err(err) = builder.add_bone(
                &bone.name,
                parent,
                bone.rest_head(),
                bone.rest_tail(),
                bone.roll(),
            ) {
                tracing::warn!(target: "skeleton", "Dropping bone while unfreezing: {}", err);
            }
        }
        builder
    }

    // ------------------------------------------------------------------
    // 构建与更新
    // ------------------------------------------------------------------

    fn build_bone(&mut self, index: usize) {
        let (before, rest) = self.bones.split_at_mut(index);
        let bone = &mut rest[0];
        let parent = bone
            .parent
            .map(|p| (before[p].rest_global(), before[p].pose_global()));
        bone.build(parent);
    }

    /// 更新单个骨骼的 `pose_global` 与 `pose_verts`（子骨骼不更新）
    pub fn update_bone(&mut self, index: usize) -> RigResult<()> {
        let index = self.checked_index(index)?;
        let (before, rest) = self.bones.split_at_mut(index);
        let bone = &mut rest[0];
        bone.update(bone.parent.map(|p| before[p].pose_global()));
        Ok(())
    }

    /// 按广度优先顺序更新所有骨骼
    pub fn update(&mut self) {
        let mut stale = 0usize;
        for index in 0..self.bones.len() {
            let (before, rest) = self.bones.split_at_mut(index);
            let bone = &mut rest[0];
            if !bone.update(bone.parent.map(|p| before[p].pose_global())) {
                stale += 1;
            }
        }
        if stale > 0 {
            tracing::debug!(
                target: "skeleton",
                "{} bones of skeleton {} kept stale pose verts matrices",
                stale,
                self.name
            );
        }
    }

    /// 由骨骼当前的 `pose_global` 反推局部姿态矩阵
    pub fn pose_from_global(&self, index: usize) -> RigResult<Mat4> {
        let index = self.checked_index(index)?;
        let bone = &self.bones[index];
        Ok(bone.pose_from(bone.pose_global(), self.parent_of(index).map(Bone::pose_global)))
    }

    // ------------------------------------------------------------------
    // 姿态
    // ------------------------------------------------------------------

    /// 将单个骨骼恢复静止姿态
    pub fn set_bone_to_rest_pose(&mut self, index: usize) -> RigResult<()> {
        let index = self.checked_index(index)?;
        self.bones[index].set_pose(Mat4::IDENTITY);
        self.update_bone(index)
    }

    pub fn set_to_rest_pose(&mut self) {
        for bone in &mut self.bones {
            bone.set_pose(Mat4::IDENTITY);
        }
        self.update();
    }

    pub fn is_in_rest_pose(&self) -> bool {
        self.bones.iter().all(Bone::is_in_rest_pose)
    }

    /// 所有骨骼的局部姿态矩阵（广度优先顺序）
    pub fn get_pose(&self) -> Vec<Mat4> {
        self.bones.iter().map(|bone| *bone.pose()).collect()
    }

    /// `get_pose` 的扁平 `f32` 形式（每个矩阵 16 个分量，列主序）
    pub fn pose_matrices_flat(&self) -> Vec<f32> {
        let poses = self.get_pose();
        bytemuck::cast_slice::<Mat4, f32>(&poses).to_vec()
    }

    /// 以完整姿态矩阵（旋转 + 平移）设置姿态
    ///
    /// 旋转块被变换到骨骼的局部姿态空间
    /// (`rest_global⁻¹ · R · rest_global`)，平移直接拷贝。
    /// 所有骨骼设置完后统一更新一次。
    pub fn set_pose(&mut self, matrices: &[Mat4]) -> RigResult<()> {
        self.check_pose_length(matrices.len())?;
        for (bone, matrix) in self.bones.iter_mut().zip(matrices) {
            let mut pose = local_pose_from_rotation(bone, Mat3::from_mat4(*matrix));
            pose.w_axis = Vec4::new(matrix.w_axis.x, matrix.w_axis.y, matrix.w_axis.z, 1.0);
            bone.set_pose(pose);
        }
        self.update();
        Ok(())
    }

    /// 以纯旋转数据设置姿态，平移清零
    pub fn set_pose_rotations(&mut self, rotations: &[Mat3]) -> RigResult<()> {
        self.check_pose_length(rotations.len())?;
        for (bone, rotation) in self.bones.iter_mut().zip(rotations) {
            let pose = local_pose_from_rotation(bone, *rotation);
            bone.set_pose(pose);
        }
        self.update();
        Ok(())
    }

    fn check_pose_length(&self, actual: usize) -> RigResult<()> {
        if actual != self.bones.len() {
            return Err(RigError::PoseLengthMismatch {
                expected: self.bones.len(),
                actual,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // 蒙皮
    // ------------------------------------------------------------------

    /// 线性混合蒙皮（齐次坐标输入，默认蒙皮配置）
    pub fn skin_mesh(&self, rest_coords: &[Vec4], weights: &VertexBoneWeights) -> Vec<Vec3> {
        self.skin_mesh_with_config(rest_coords, weights, &SkinningConfig::default())
    }

    pub fn skin_mesh_with_config(
        &self,
        rest_coords: &[Vec4],
        weights: &VertexBoneWeights,
        config: &SkinningConfig,
    ) -> Vec<Vec3> {
        skin::skin_mesh_with_config(self, rest_coords, weights, config)
    }

    /// 线性混合蒙皮（三维坐标输入，较慢）
    pub fn skin_mesh_vec3(&self, rest_coords: &[Vec3], weights: &VertexBoneWeights) -> Vec<Vec3> {
        self.skin_mesh_vec3_with_config(rest_coords, weights, &SkinningConfig::default())
    }

    pub fn skin_mesh_vec3_with_config(
        &self,
        rest_coords: &[Vec3],
        weights: &VertexBoneWeights,
        config: &SkinningConfig,
    ) -> Vec<Vec3> {
        skin::skin_mesh_vec3_with_config(self, rest_coords, weights, config)
    }

    /// 以调试级别输出骨骼树
    pub fn display(&self) {
        tracing::debug!(
            target: "skeleton",
            "<Skeleton {}> ({} bones, {} roots)",
            self.name,
            self.bones.len(),
            self.roots.len()
        );
        for bone in &self.bones {
            bone.display();
        }
    }
}

fn local_pose_from_rotation(bone: &Bone, rotation: Mat3) -> Mat4 {
    let rest = *bone.rest_global();
    match try_inverse(&rest) {
        Some(inverse) => inverse * Mat4::from_mat3(rotation) * rest,
        None => {
            tracing::debug!(
                target: "skeleton",
                "Singular rest matrix for bone {}, using pose rotation as is",
                bone.name()
            );
            Mat4::from_mat3(rotation)
        }
    }
}

fn canonical_bone_name(name: &str) -> String {
    name.to_lowercase().replace([' ', '-'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn arm_builder() -> SkeletonBuilder {
        let mut builder = SkeletonBuilder::new("arm");
        builder
            .add_bone("root", None, Vec3::ZERO, Vec3::Y, 0.0)
            .unwrap();
        builder
            .add_bone("upper", Some("root"), Vec3::Y, Vec3::new(1.0, 1.0, 0.0), 0.0)
            .unwrap();
        builder
            .add_bone("spine", Some("root"), Vec3::Y, Vec3::new(0.0, 2.0, 0.0), 0.0)
            .unwrap();
        builder
            .add_bone(
                "lower",
                Some("upper"),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(2.0, 1.0, 0.0),
                0.0,
            )
            .unwrap();
        builder
    }

    #[test]
    fn test_duplicate_bone_rejected() {
        let mut builder = arm_builder();
        let err = builder
            .add_bone("upper", Some("root"), Vec3::ZERO, Vec3::X, 0.0)
            .unwrap_err();
        assert!(matches!(err, RigError::DuplicateBone { .. }));
        assert_eq!(builder.bone_count(), 4);
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let mut builder = arm_builder();
        let err = builder
            .add_bone("hand", Some("missing"), Vec3::ZERO, Vec3::X, 0.0)
            .unwrap_err();
        assert!(matches!(err, RigError::UnknownParent { .. }));
        assert!(!builder.contains_bone("hand"));
        assert_eq!(builder.bone_count(), 4);
    }

    #[test]
    fn test_breadth_first_order() {
        let skeleton = arm_builder().build();
        let names: Vec<&str> = skeleton.bones().iter().map(Bone::name).collect();
        assert_eq!(names, vec!["root", "upper", "spine", "lower"]);

        for bone in skeleton.bones() {
            assert_eq!(skeleton.bone_index(bone.name()), Some(bone.index()));
            if let Some(parent) = bone.parent() {
                assert!(parent < bone.index());
                assert!(skeleton.bones()[parent].children().contains(&bone.index()));
            }
        }
    }

    #[test]
    fn test_joint_names_depth_first() {
        let skeleton = arm_builder().build();
        assert_eq!(skeleton.joint_names(), vec!["root", "upper", "lower", "spine"]);
    }

    #[test]
    fn test_bone_lookup() {
        let skeleton = arm_builder().build();
        assert!(skeleton.bone("lower").is_ok());
        assert!(matches!(
            skeleton.bone("tail"),
            Err(RigError::BoneNotFound(_))
        ));
        assert!(skeleton.contains_bone("spine"));
        assert_eq!(skeleton.root_bone().map(Bone::name), Some("root"));
    }

    #[test]
    fn test_built_skeleton_is_in_rest_pose() {
        let skeleton = arm_builder().build();
        assert!(skeleton.is_in_rest_pose());
        for bone in skeleton.bones() {
            assert!(bone.pose_global().abs_diff_eq(*bone.rest_global(), 1e-5));
        }
    }

    #[test]
    fn test_rest_relative_composes_to_rest_global() {
        let skeleton = arm_builder().build();
        for bone in skeleton.bones() {
            let composed = match bone.parent() {
                Some(parent) => *skeleton.bones()[parent].rest_global() * *bone.rest_relative(),
                None => *bone.rest_relative(),
            };
            assert!(composed.abs_diff_eq(*bone.rest_global(), 1e-5));
        }
    }

    #[test]
    fn test_pose_propagates_to_children() {
        let mut skeleton = arm_builder().build();
        let root = skeleton.bone_index("root").unwrap();
        skeleton.bones[root].set_rotation(Vec3::new(0.0, 0.0, FRAC_PI_2));
        skeleton.update();

        // 根骨骼绕 Z 旋转 90°，upper 的 head (0,1,0) 被带到 (-1,0,0)
        let upper = skeleton.bone("upper").unwrap();
        assert!(upper.head().abs_diff_eq(Vec3::new(-1.0, 0.0, 0.0), 1e-5));
        assert!(!skeleton.is_in_rest_pose());

        skeleton.set_to_rest_pose();
        assert!(skeleton.is_in_rest_pose());
        let upper = skeleton.bone("upper").unwrap();
        assert!(upper.head().abs_diff_eq(Vec3::Y, 1e-5));
    }

    #[test]
    fn test_set_pose_length_mismatch() {
        let mut skeleton = arm_builder().build();
        let err = skeleton.set_pose(&[Mat4::IDENTITY]).unwrap_err();
        assert!(matches!(
            err,
            RigError::PoseLengthMismatch {
                expected: 4,
                actual: 1
            }
        ));
        assert!(skeleton.set_pose_rotations(&[]).is_err());
    }

    #[test]
    fn test_set_pose_round_trip_at_rest() {
        let mut skeleton = arm_builder().build();
        let pose = skeleton.get_pose();
        skeleton.set_pose(&pose).unwrap();
        for (bone, before) in skeleton.bones().iter().zip(&pose) {
            assert!(bone.pose().abs_diff_eq(*before, 1e-5));
        }
    }

    #[test]
    fn test_set_pose_rotations_conjugates_by_rest() {
        let mut skeleton = arm_builder().build();
        let rotation = Mat3::from_rotation_z(0.4);
        let rotations = vec![rotation; skeleton.bone_count()];
        skeleton.set_pose_rotations(&rotations).unwrap();

        for bone in skeleton.bones() {
            let expected = try_inverse(bone.rest_global()).unwrap()
                * Mat4::from_mat3(rotation)
                * *bone.rest_global();
            assert!(bone.pose().abs_diff_eq(expected, 1e-5));
        }
    }

    #[test]
    fn test_pose_matrices_flat() {
        let skeleton = arm_builder().build();
        let flat = skeleton.pose_matrices_flat();
        assert_eq!(flat.len(), 4 * 16);
        assert_eq!(&flat[..16], &Mat4::IDENTITY.to_cols_array());
    }

    #[test]
    fn test_scaled_is_independent() {
        let mut skeleton = arm_builder().build();
        let scaled = skeleton.scaled(2.0);

        let lower = scaled.bone("lower").unwrap();
        assert!(lower.rest_tail().abs_diff_eq(Vec3::new(4.0, 2.0, 0.0), 1e-6));
        assert!((lower.length() - 2.0).abs() < 1e-5);

        skeleton.bones[0].set_rotation(Vec3::new(0.3, 0.0, 0.0));
        skeleton.update();
        assert!(scaled.is_in_rest_pose());
    }

    #[test]
    fn test_update_joints_rebuilds_rest() {
        let mut skeleton = arm_builder().build();
        skeleton.bones[1].set_rotation(Vec3::new(0.3, 0.0, 0.0));

        let moved = BoneDefinition::new(
            "lower",
            Some("upper"),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 3.0),
            0.0,
        );
        skeleton.update_joints(&[moved]).unwrap();

        assert!(skeleton.is_in_rest_pose());
        let lower = skeleton.bone("lower").unwrap();
        assert!((lower.length() - 3.0).abs() < 1e-5);
        assert!(lower.tail().abs_diff_eq(Vec3::new(1.0, 1.0, 3.0), 1e-5));
    }

    #[test]
    fn test_update_joints_unknown_bone_changes_nothing() {
        let mut skeleton = arm_builder().build();
        let defs = [
            BoneDefinition::new("spine", Some("root"), Vec3::Y, Vec3::new(0.0, 5.0, 0.0), 0.0),
            BoneDefinition::new("ghost", None, Vec3::ZERO, Vec3::Y, 0.0),
        ];
        assert!(skeleton.update_joints(&defs).is_err());
        assert!((skeleton.bone("spine").unwrap().length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_canonicalize_bone_names() {
        let mut builder = SkeletonBuilder::new("human");
        builder
            .add_bone("Upper Arm-L", None, Vec3::ZERO, Vec3::Y, 0.0)
            .unwrap();
        let mut skeleton = builder.build();
        skeleton.canonicalize_bone_names().unwrap();
        assert!(skeleton.contains_bone("upper_arm_l"));
        assert!(!skeleton.contains_bone("Upper Arm-L"));
    }

    #[test]
    fn test_canonicalize_collision_rejected() {
        let mut builder = SkeletonBuilder::new("human");
        builder.add_bone("Neck", None, Vec3::ZERO, Vec3::Y, 0.0).unwrap();
        builder.add_bone("neck", None, Vec3::ZERO, Vec3::Y, 0.0).unwrap();
        let mut skeleton = builder.build();
        assert!(skeleton.canonicalize_bone_names().is_err());
        assert!(skeleton.contains_bone("Neck"));
    }

    #[test]
    fn test_into_builder_allows_topology_change() {
        let skeleton = arm_builder().build();
        let mut builder = skeleton.into_builder();
        builder
            .add_bone(
                "hand",
                Some("lower"),
                Vec3::new(2.0, 1.0, 0.0),
                Vec3::new(2.5, 1.0, 0.0),
                0.0,
            )
            .unwrap();
        let skeleton = builder.build();
        assert_eq!(skeleton.bone_count(), 5);
        assert_eq!(skeleton.bones()[4].name(), "hand");
    }

    #[test]
    fn test_rest_offset_and_direction() {
        let skeleton = arm_builder().build();
        let lower = skeleton.bone_index("lower").unwrap();
        assert!(skeleton
            .rest_offset(lower)
            .unwrap()
            .abs_diff_eq(Vec3::X, 1e-6));
        assert!(skeleton
            .rest_direction(lower)
            .unwrap()
            .abs_diff_eq(Vec3::X, 1e-6));
        assert!(skeleton.rest_offset(99).is_err());
        assert!(skeleton.rest_direction(99).is_err());
    }

    #[test]
    fn test_rest_direction_follows_offset_not_bone_axis() {
        let mut builder = SkeletonBuilder::new("offset");
        builder.add_bone("root", None, Vec3::ZERO, Vec3::Y, 0.0).unwrap();
        builder
            .add_bone("side", Some("root"), Vec3::Y, Vec3::new(1.0, 1.0, 0.0), 0.0)
            .unwrap();
        let skeleton = builder.build();
        let side = skeleton.bone_index("side").unwrap();

        assert!(skeleton.rest_offset(side).unwrap().abs_diff_eq(Vec3::Y, 1e-6));
        // 骨骼本身沿 +X，方向取自 head 偏移
        assert!(skeleton.rest_direction(side).unwrap().abs_diff_eq(Vec3::Y, 1e-6));
        assert_eq!(skeleton.rest_direction(0).unwrap(), Vec3::ZERO);
    }

    #[test]
    fn test_update_leaves_only_singular_bone_stale() {
        let mut builder = SkeletonBuilder::new("singular");
        builder.add_bone("root", None, Vec3::ZERO, Vec3::Y, 0.0).unwrap();
        builder
            .add_bone("good", Some("root"), Vec3::Y, Vec3::new(0.0, 2.0, 0.0), 0.0)
            .unwrap();
        builder
            .add_bone(
                "broken",
                Some("root"),
                Vec3::new(f32::NAN, 1.0, 0.0),
                Vec3::new(0.0, 2.0, 0.0),
                0.0,
            )
            .unwrap();
        let mut skeleton = builder.build();
        let good = skeleton.bone_index("good").unwrap();
        let broken = skeleton.bone_index("broken").unwrap();
        let stale = *skeleton.bones()[broken].pose_verts();
        assert!(stale.is_finite());

        for index in [0, good, broken] {
            skeleton
                .bone_at_mut(index)
                .unwrap()
                .set_rotation(Vec3::new(0.0, 0.0, 0.4));
        }
        skeleton.update();

        assert_eq!(*skeleton.bones()[broken].pose_verts(), stale);
        let good_verts = *skeleton.bones()[good].pose_verts();
        assert!(good_verts.is_finite());
        assert!(!good_verts.abs_diff_eq(Mat4::IDENTITY, 1e-3));
        assert!(!skeleton.bones()[0].pose_verts().abs_diff_eq(Mat4::IDENTITY, 1e-3));
    }

    #[test]
    fn test_relative_matrix_default_convention() {
        let skeleton = arm_builder().build();
        let lower = skeleton.bone_index("lower").unwrap();
        let relative = skeleton
            .relative_matrix(lower, MeshOrientation::YUpFaceZ, LocalBoneAxis::Y, Vec3::ZERO)
            .unwrap();
        assert!(relative.abs_diff_eq(*skeleton.bones()[lower].rest_relative(), 1e-5));
    }

    #[test]
    fn test_progress_reports_each_bone() {
        let mut values = Vec::new();
        {
            let mut callback = |value: f32| values.push(value);
            let mut progress = Progress::new(Some(&mut callback), 0);
            arm_builder().build_with_progress(&mut progress);
        }
        assert_eq!(values.len(), 4);
        assert_eq!(values.last().copied(), Some(1.0));
    }
}
