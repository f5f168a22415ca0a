//! # Character Rig
//!
//! Skeleton and armature subsystem for character modeling: a hierarchical
//! bone graph, rest-pose and pose-space matrix algebra, and a linear blend
//! skinning engine.
//!
//! ## Architecture Design
//!
//! This crate follows the **Anemic Domain Model (贫血模型)** pattern:
//! - **State**: `Skeleton` and `Bone` store topology, rest geometry and pose matrices
//! - **Service**: `PoseService` encapsulates interactive posing with static methods
//! - **Adapter**: the `rig` module builds skeletons and weight tables from external sources
//!
//! Skeletons go through two stages. A `SkeletonBuilder` accepts bones one at a
//! time; `build()` freezes the topology into a `Skeleton` whose bones are
//! stored in breadth-first order, so a bone index is also its canonical
//! pose-array index.
//!
//! ### Example
//!
//! ```
//! use character_rig::rig::{from_options, RigDefinition, StaticMesh};
//! use glam::Vec3;
//!
//! let rig = RigDefinition::from_json_str(r#"{
//!     "name": "arm",
//!     "bones": [
//!         {"name": "upper", "head": [0, 0, 0], "tail": [0, 1, 0]},
//!         {"name": "lower", "parent": "upper", "head": [0, 1, 0], "tail": [0, 2, 0]}
//!     ],
//!     "weights": {"lower": [[1, 1.0]]}
//! }"#)?;
//! let mesh = StaticMesh::new(vec![Vec3::ZERO, Vec3::new(0.0, 1.5, 0.0)]);
//!
//! let (skeleton, weights) = from_options(&rig, &mesh)?;
//! let skinned = skeleton.skin_mesh_vec3(&mesh.rest_coords, &weights);
//! assert!(skinned[1].abs_diff_eq(Vec3::new(0.0, 1.5, 0.0), 1e-5));
//! # Ok::<(), character_rig::core::RigError>(())
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Errors, progress reporting and helper macros
//! - [`config`]: Configuration and logging setup
//! - [`animation`]: Bones, skeletons, orientation utilities and skinning
//! - [`rig`]: Rig construction from declarative sources

/// Errors, progress reporting and helper macros
#[macro_use]
pub mod core;
/// Configuration system
pub mod config;
/// Skeleton, pose algebra and skinning
pub mod animation;
/// Rig-construction adapter
pub mod rig;

pub use animation::{Bone, PoseService, Skeleton, SkeletonBuilder};
pub use core::{RigError, RigResult};
