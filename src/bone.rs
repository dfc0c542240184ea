//! Bone hierarchy and bone controllers (additive parents, IK solvers).

use crate::error::{get, Result};
use crate::types::{BoneFlags, Document, IKLink, RigidCalcMethod, Vec3};

/// name of the synthetic node parentless bones hang from
pub const MODEL_ROOT_NAME: &str = "Model";

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BoneParent {
    Bone(usize),
    ModelRoot,
}

/// transform node mirroring one PMX bone
#[derive(Debug, Clone, PartialEq)]
pub struct BoneNode {
    pub name: String,
    /// rest position in model space, scaled
    pub position: Vec3,
    pub parent: BoneParent,
}

/// Create one node per bone. A bone whose parent is absent or out of range
/// hangs from [`MODEL_ROOT_NAME`].
pub fn create_bones(doc: &Document, scale: f32) -> Vec<BoneNode> {
    let count = doc.bones.len();
    doc.bones
        .iter()
        .map(|b| {
            let [x, y, z] = b.position;
            BoneNode {
                name: b.name.clone(),
                position: [x * scale, y * scale, z * scale],
                parent: match b.parent {
                    Some(p) if p < count => BoneParent::Bone(p),
                    _ => BoneParent::ModelRoot,
                },
            }
        })
        .collect()
}

/// Bones ordered for controller evaluation: bones deformed after physics go
/// last, ties broken by transform level. The sort is stable.
pub fn bone_processing_order(doc: &Document) -> Vec<usize> {
    let mut order: Vec<usize> = (0..doc.bones.len()).collect();
    order.sort_by_key(|&i| {
        let bone = &doc.bones[i];
        (
            bone.flags.contains(BoneFlags::PHYSICS_AFTER_DEFORM),
            bone.deform_depth,
        )
    });
    order
}

/// 付与親
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AdditiveParent {
    pub parent: usize,
    pub rate: f32,
    pub add_local: bool,
    pub add_move: bool,
    pub add_rotate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IkSolver {
    /// effector bone
    pub target: usize,
    /// per iteration angle limit, a quarter of the PMX value
    pub control_weight: f32,
    pub iterations: i32,
    pub chains: Vec<IKLink>,
    /// off when physics drives a bone of the chain
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoneController {
    pub bone: usize,
    pub additive_parent: Option<AdditiveParent>,
    pub ik_solver: Option<IkSolver>,
    /// target followed by chain bones
    pub ik_solver_targets: Vec<usize>,
}

impl BoneController {
    fn new(doc: &Document, bone_index: usize, use_ik: bool) -> Result<Self> {
        let bone = get(&doc.bones, "bone", bone_index)?;
        let mut result = BoneController {
            bone: bone_index,
            additive_parent: None,
            ik_solver: None,
            ik_solver_targets: vec![],
        };
        if let Some(append) = bone.append {
            if append.rate != 0.0 {
                if let Some(parent) = append.parent {
                    get(&doc.bones, "bone", parent)?;
                    result.additive_parent = Some(AdditiveParent {
                        parent,
                        rate: append.rate,
                        add_local: bone.flags.contains(BoneFlags::INHERIT_LOCAL),
                        add_move: bone.flags.contains(BoneFlags::INHERIT_TRANSLATION),
                        add_rotate: bone.flags.contains(BoneFlags::INHERIT_ROTATION),
                    });
                }
            }
        }
        if !use_ik || !bone.flags.contains(BoneFlags::IK) {
            return Ok(result);
        }
        if let Some(ik) = &bone.ik_info {
            get(&doc.bones, "bone", ik.ik_target_bone_index)?;
            let targets: Vec<usize> = std::iter::once(ik.ik_target_bone_index)
                .chain(ik.ik_links.iter().map(|l| l.ik_bone_index))
                .collect();
            for &t in &targets {
                get(&doc.bones, "bone", t)?;
            }
            let physics_driven = doc.rigid_bodies.iter().any(|r| {
                r.calc_method != RigidCalcMethod::Static
                    && r.bone_index.map_or(false, |b| targets.contains(&b))
            });
            if physics_driven {
                log::debug!("ik \"{}\" disabled, chain is physics driven", bone.name);
            }
            result.ik_solver = Some(IkSolver {
                target: ik.ik_target_bone_index,
                control_weight: ik.ik_limit_angle / 4.0,
                iterations: ik.ik_iter_count,
                chains: ik.ik_links.clone(),
                enabled: !physics_driven,
            });
            result.ik_solver_targets = targets;
        }
        Ok(result)
    }
}

/// One controller per bone in [`bone_processing_order`].
pub fn entry_bone_controllers(doc: &Document, use_ik: bool) -> Result<Vec<BoneController>> {
    bone_processing_order(doc)
        .into_iter()
        .map(|i| BoneController::new(doc, i, use_ik))
        .collect()
}
