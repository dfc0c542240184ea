//! Rigid bodies, physics bodies and joint constraints.
//!
//! Rigid body objects hang from the bone they belong to. A rigid body without
//! a bone borrows the bone of a rigid body it is jointed to, found by
//! [`nearest_bone`], or hangs from [`PHYSICS_ROOT_NAME`].

use crate::bone::{BoneNode, BoneParent};
use crate::error::{get, Error, Result};
use crate::types::{Document, Joint, Rigid, RigidCalcMethod, RigidForm, Vec3};
use std::collections::HashMap;

/// name of the node detached physics objects are moved under
pub const PHYSICS_ROOT_NAME: &str = "Physics";

/// number of non collision groups
pub const MAX_GROUP: usize = 16;

/// scene node an object is parented to or a component lives on
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum NodeRef {
    ModelRoot,
    PhysicsRoot,
    Bone(usize),
    Rigid(usize),
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ColliderShape {
    Sphere { radius: f32 },
    /// full extents
    Box { size: Vec3 },
    Capsule { radius: f32, height: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicMaterial {
    pub name: String,
    pub bounciness: f32,
    pub static_friction: f32,
    pub dynamic_friction: f32,
}

/// collider object created for one rigid body
#[derive(Debug, Clone, PartialEq)]
pub struct RigidObject {
    pub name: String,
    pub position: Vec3,
    /// euler angles in degrees
    pub rotation: Vec3,
    pub collider: ColliderShape,
    pub material: PhysicMaterial,
    pub parent: NodeRef,
}

/// simulated body. several rigid bodies on one bone share a body.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsBody {
    pub target: NodeRef,
    pub is_kinematic: bool,
    pub mass: f32,
    pub drag: f32,
    pub angular_drag: f32,
    /// rigid bodies merged into this one
    pub rigids: Vec<usize>,
}

impl PhysicsBody {
    fn new(target: NodeRef, index: usize, rigid: &Rigid) -> Self {
        Self {
            target,
            is_kinematic: rigid.calc_method == RigidCalcMethod::Static,
            mass: rigid.mass.max(f32::MIN_POSITIVE),
            drag: rigid.move_resist,
            angular_drag: rigid.rotation_resist,
            rigids: vec![index],
        }
    }

    /// mass is summed, drags are averaged pairwise
    fn merge(&mut self, index: usize, rigid: &Rigid) {
        self.mass += rigid.mass;
        self.drag = (self.drag + rigid.move_resist) * 0.5;
        self.angular_drag = (self.angular_drag + rigid.rotation_resist) * 0.5;
        self.rigids.push(index);
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum AxisMotion {
    Locked,
    Limited { lower: f32, upper: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct JointConstraint {
    /// index into [`Document::joints`]
    pub joint_index: usize,
    /// body of rigid B, which carries the joint
    pub owner: NodeRef,
    /// body of rigid A
    pub connected: NodeRef,
    /// scaled
    pub linear: [AxisMotion; 3],
    /// degrees, sign flipped
    pub angular_x: AxisMotion,
    /// degrees, symmetric
    pub angular_y: AxisMotion,
    /// degrees, symmetric
    pub angular_z: AxisMotion,
    /// position spring per linear axis, scaled
    pub linear_drive: [Option<f32>; 3],
    pub angular_x_drive: Option<f32>,
    pub angular_yz_drive: Option<f32>,
}

/// object carrying a joint and its parent before it was moved to the physics root
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ConnectBone {
    pub object: NodeRef,
    pub parent: NodeRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsSetup {
    pub rigids: Vec<RigidObject>,
    pub bodies: Vec<PhysicsBody>,
    pub joints: Vec<JointConstraint>,
    pub connect_bone_list: Vec<ConnectBone>,
    /// joint objects reparented to the physics root
    pub globalized: Vec<NodeRef>,
    /// rigid indices of every group
    pub ignore_groups: Vec<Vec<usize>>,
    /// per rigid body, the mask of groups it does not collide with
    pub group_targets: Vec<u16>,
}

fn valid_bone(doc: &Document, rigid: &Rigid) -> Option<usize> {
    rigid.bone_index.filter(|&b| b < doc.bones.len())
}

/// Bone a rigid body follows.
///
/// The rigid body's own bone when it has one. Otherwise a depth first search
/// over joints: rigid bodies on the A side of joints whose B side is this
/// one are tried first, then the B sides of joints whose A side is this one.
/// The first bone found wins, which is not necessarily the closest. Rigid
/// bodies already visited are skipped so cyclic joint graphs terminate.
pub fn nearest_bone(doc: &Document, rigid_index: usize) -> Option<usize> {
    let mut visited = vec![false; doc.rigid_bodies.len()];
    search_nearest_bone(doc, rigid_index, &mut visited)
}

fn search_nearest_bone(doc: &Document, rigid_index: usize, visited: &mut [bool]) -> Option<usize> {
    match visited.get_mut(rigid_index) {
        Some(seen) if !*seen => *seen = true,
        _ => return None,
    }
    if let Some(bone) = valid_bone(doc, &doc.rigid_bodies[rigid_index]) {
        return Some(bone);
    }
    let rigid_count = doc.rigid_bodies.len();
    let a_sides = doc
        .joints
        .iter()
        .filter(|j| j.b_rigid_index == rigid_index && j.a_rigid_index < rigid_count)
        .map(|j| j.a_rigid_index);
    let b_sides = doc
        .joints
        .iter()
        .filter(|j| j.a_rigid_index == rigid_index && j.b_rigid_index < rigid_count)
        .map(|j| j.b_rigid_index);
    for next in a_sides.chain(b_sides) {
        if let Some(bone) = search_nearest_bone(doc, next, visited) {
            return Some(bone);
        }
    }
    None
}

fn body_target(doc: &Document, rigid_index: usize) -> NodeRef {
    match valid_bone(doc, &doc.rigid_bodies[rigid_index]) {
        Some(bone) => NodeRef::Bone(bone),
        None => NodeRef::Rigid(rigid_index),
    }
}

fn scale3(v: Vec3, scale: f32) -> Vec3 {
    [v[0] * scale, v[1] * scale, v[2] * scale]
}

fn collider_shape(rigid: &Rigid, scale: f32) -> ColliderShape {
    let [x, y, _] = rigid.size;
    match rigid.form {
        RigidForm::Sphere => ColliderShape::Sphere { radius: x * scale },
        RigidForm::Box => ColliderShape::Box {
            size: scale3(rigid.size, 2.0 * scale),
        },
        RigidForm::Capsule => ColliderShape::Capsule {
            radius: x * scale,
            height: (y + x * 2.0) * scale,
        },
    }
}

fn convert_rigidbody(doc: &Document, index: usize, model_name: &str, scale: f32) -> RigidObject {
    let rigid = &doc.rigid_bodies[index];
    let [rx, ry, rz] = rigid.rotation;
    RigidObject {
        name: format!("r{}", rigid.name),
        position: scale3(rigid.position, scale),
        rotation: [rx.to_degrees(), ry.to_degrees(), rz.to_degrees()],
        collider: collider_shape(rigid, scale),
        material: PhysicMaterial {
            name: format!("{}_r{}", model_name, rigid.name),
            bounciness: rigid.repulsion,
            static_friction: rigid.friction,
            dynamic_friction: rigid.friction,
        },
        parent: nearest_bone(doc, index).map_or(NodeRef::PhysicsRoot, NodeRef::Bone),
    }
}

fn linear_motion(lower: f32, upper: f32, scale: f32) -> AxisMotion {
    if lower == 0.0 && upper == 0.0 {
        AxisMotion::Locked
    } else {
        AxisMotion::Limited {
            lower: lower * scale,
            upper: upper * scale,
        }
    }
}

/// X rotates the other way round, so the limits are negated before conversion.
fn angular_x_motion(lower: f32, upper: f32) -> AxisMotion {
    if lower == 0.0 && upper == 0.0 {
        return AxisMotion::Locked;
    }
    let high = (-lower).max(-upper);
    let low = (-lower).min(-upper);
    AxisMotion::Limited {
        lower: low.to_degrees().max(-180.0).min(180.0),
        upper: high.to_degrees().max(-180.0).min(180.0),
    }
}

/// symmetric limit from the smaller magnitude of the pair
fn angular_symmetric_motion(lower: f32, upper: f32) -> AxisMotion {
    if lower == 0.0 && upper == 0.0 {
        return AxisMotion::Locked;
    }
    let limit = lower.abs().min(upper.abs()).to_degrees().max(0.0).min(180.0);
    AxisMotion::Limited {
        lower: -limit,
        upper: limit,
    }
}

fn nonzero(v: f32) -> Option<f32> {
    if v != 0.0 {
        Some(v)
    } else {
        None
    }
}

fn joint_constraint(
    joint_index: usize,
    joint: &Joint,
    owner: NodeRef,
    connected: NodeRef,
    scale: f32,
) -> JointConstraint {
    let (down, up) = (joint.move_limit_down, joint.move_limit_up);
    let (rot_down, rot_up) = (joint.rotation_limit_down, joint.rotation_limit_up);
    let spring = joint.spring_const_move;
    let [sx, sy, sz] = joint.spring_const_rotation;
    JointConstraint {
        joint_index,
        owner,
        connected,
        linear: [
            linear_motion(down[0], up[0], scale),
            linear_motion(down[1], up[1], scale),
            linear_motion(down[2], up[2], scale),
        ],
        angular_x: angular_x_motion(rot_down[0], rot_up[0]),
        angular_y: angular_symmetric_motion(rot_down[1], rot_up[1]),
        angular_z: angular_symmetric_motion(rot_down[2], rot_up[2]),
        linear_drive: [
            nonzero(spring[0]).map(|s| s * scale),
            nonzero(spring[1]).map(|s| s * scale),
            nonzero(spring[2]).map(|s| s * scale),
        ],
        angular_x_drive: nonzero(sx),
        angular_yz_drive: if sy != 0.0 || sz != 0.0 {
            Some((sy + sz) * 0.5)
        } else {
            None
        },
    }
}

/// Non collision group membership, one list per group.
pub fn setting_ignore_rigid_groups(doc: &Document) -> Result<Vec<Vec<usize>>> {
    let mut result = vec![vec![]; MAX_GROUP];
    for (i, rigid) in doc.rigid_bodies.iter().enumerate() {
        let group = usize::from(rigid.group);
        result
            .get_mut(group)
            .ok_or_else(|| Error::range("collision group", group, MAX_GROUP))?
            .push(i);
    }
    Ok(result)
}

/// Derive every physics object of the document.
///
/// `bones` is the hierarchy from [`create_bones`](crate::bone::create_bones);
/// it supplies the parents recorded in [`PhysicsSetup::connect_bone_list`].
pub fn create_physics(
    doc: &Document,
    bones: &[BoneNode],
    model_name: &str,
    scale: f32,
) -> Result<PhysicsSetup> {
    let rigid_count = doc.rigid_bodies.len();
    let rigids: Vec<RigidObject> = (0..rigid_count)
        .map(|i| convert_rigidbody(doc, i, model_name, scale))
        .collect();

    let mut bodies: Vec<PhysicsBody> = vec![];
    let mut body_of: HashMap<NodeRef, usize> = HashMap::new();
    for (i, rigid) in doc.rigid_bodies.iter().enumerate() {
        let target = body_target(doc, i);
        match body_of.get(&target) {
            Some(&b) => bodies[b].merge(i, rigid),
            None => {
                body_of.insert(target, bodies.len());
                bodies.push(PhysicsBody::new(target, i, rigid));
            }
        }
    }

    let mut joints = vec![];
    for (i, joint) in doc.joints.iter().enumerate() {
        get(&doc.rigid_bodies, "rigid body", joint.a_rigid_index)?;
        get(&doc.rigid_bodies, "rigid body", joint.b_rigid_index)?;
        let connected = body_target(doc, joint.a_rigid_index);
        let owner = body_target(doc, joint.b_rigid_index);
        if connected == owner {
            log::warn!("joint \"{}\" connects a body to itself", joint.name);
            continue;
        }
        joints.push(joint_constraint(i, joint, owner, connected, scale));
    }

    // globalize: remember where joint objects hung, then detach the simulated ones
    let mut connect_bone_list: Vec<ConnectBone> = vec![];
    for c in &joints {
        if connect_bone_list.iter().any(|x| x.object == c.owner) {
            continue;
        }
        let parent = match c.owner {
            NodeRef::Bone(b) => match get(bones, "bone", b)?.parent {
                BoneParent::Bone(p) => NodeRef::Bone(p),
                BoneParent::ModelRoot => NodeRef::ModelRoot,
            },
            NodeRef::Rigid(r) => rigids[r].parent,
            other => other,
        };
        connect_bone_list.push(ConnectBone {
            object: c.owner,
            parent,
        });
    }
    let globalized = connect_bone_list
        .iter()
        .map(|c| c.object)
        .filter(|o| body_of.get(o).map_or(false, |&b| !bodies[b].is_kinematic))
        .collect();

    let setup = PhysicsSetup {
        rigids,
        bodies,
        joints,
        connect_bone_list,
        globalized,
        ignore_groups: setting_ignore_rigid_groups(doc)?,
        group_targets: doc
            .rigid_bodies
            .iter()
            .map(|r| r.un_collision_group_flag)
            .collect(),
    };
    log::info!(
        "{} rigid bodies merged into {} bodies, {} joints",
        rigid_count,
        setup.bodies.len(),
        setup.joints.len()
    );
    Ok(setup)
}
