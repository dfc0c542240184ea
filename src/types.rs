//! PMX type definitions.
//!
//! References between records are stored as indices into the flat arrays of
//! [`Document`]. A reference the format allows to be empty is an
//! `Option<usize>`: the `-1` sentinel of every index width decodes to `None`.

use bitflags::bitflags;
use std::convert::TryFrom;

pub type Vec2 = [f32; 2];
pub type Vec3 = [f32; 3];
pub type Vec4 = [f32; 4];

/// represent text encoding but all texts in pmx file are converted to String so you don't need to care
#[repr(u8)]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Encode {
    UTF8 = 0x01,
    Utf16Le = 0x00,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PMXVersion {
    V20,
    V21,
}

/// rustic wrapped header.
#[derive(Debug, Clone)]
pub struct Header {
    pub version: PMXVersion,
    pub encode: Encode,
    /// number of additional vec4 uv channels (0..=4)
    pub additional_uv: u8,
    pub(crate) s_vertex_index: VertexIndexKinds,
    pub(crate) s_texture_index: IndexKinds,
    pub(crate) s_material_index: IndexKinds,
    pub(crate) s_bone_index: IndexKinds,
    pub(crate) s_morph_index: IndexKinds,
    pub(crate) s_rigid_body_index: IndexKinds,
}

/// Pmx embedded comments and names
///
/// refer PMX仕様.txt 176~181
#[derive(Debug, Default, Eq, PartialEq, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub name_en: String,
    pub comment: String,
    pub comment_en: String,
}

/// Defining how to calculate skinning.
///
/// Unused bone slots of `BDEF4`/`QDEF` are usually written as `-1` and
/// decode to `None`.
///
/// refer PMX仕様.txt 190~197
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum VertexWeight {
    /// a bone with weight 1.0
    BDEF1(Option<usize>),
    /// 2 bones with normalized weight
    /// * bone_weight_1 : weight of bone_index_1
    /// * bone_weight_2 : 1.0 - bone_weight_1
    BDEF2 {
        bone_index_1: Option<usize>,
        bone_index_2: Option<usize>,
        bone_weight_1: f32,
    },
    /// 4 bones without normalized weights guaranty.
    BDEF4 {
        bone_indices: [Option<usize>; 4],
        bone_weights: [f32; 4],
    },
    /// spherical deforming bones
    SDEF {
        bone_index_1: Option<usize>,
        bone_index_2: Option<usize>,
        bone_weight_1: f32,
        sdef_c: Vec3,
        sdef_r0: Vec3,
        sdef_r1: Vec3,
    },
    /// DualQuaternion deforming
    QDEF {
        bone_indices: [Option<usize>; 4],
        bone_weights: [f32; 4],
    },
}

impl VertexWeight {
    /// wire tag of this weight method
    pub fn tag(&self) -> u8 {
        match self {
            Self::BDEF1(_) => 0,
            Self::BDEF2 { .. } => 1,
            Self::BDEF4 { .. } => 2,
            Self::SDEF { .. } => 3,
            Self::QDEF { .. } => 4,
        }
    }

    /// Every bone slot this weight refers to, paired with its weight.
    pub fn slots(&self) -> [(Option<usize>, f32); 4] {
        match *self {
            Self::BDEF1(bone) => [(bone, 1.0), (None, 0.0), (None, 0.0), (None, 0.0)],
            Self::BDEF2 {
                bone_index_1,
                bone_index_2,
                bone_weight_1,
            }
            | Self::SDEF {
                bone_index_1,
                bone_index_2,
                bone_weight_1,
                ..
            } => [
                (bone_index_1, bone_weight_1),
                (bone_index_2, 1.0 - bone_weight_1),
                (None, 0.0),
                (None, 0.0),
            ],
            Self::BDEF4 {
                bone_indices,
                bone_weights,
            }
            | Self::QDEF {
                bone_indices,
                bone_weights,
            } => [
                (bone_indices[0], bone_weights[0]),
                (bone_indices[1], bone_weights[1]),
                (bone_indices[2], bone_weights[2]),
                (bone_indices[3], bone_weights[3]),
            ],
        }
    }
}

/// refer PMX仕様.txt 184~252
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub norm: Vec3,
    pub uv: Vec2,
    /// only the first `header.additional_uv` entries are meaningful
    pub add_uv: [Vec4; 4],
    pub weight_type: VertexWeight,
    pub edge_mag: f32,
}

/// how to apply sphere mode texture
/// refer PMX仕様.txt 295
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SphereModeKind {
    Mul,
    Add,
    SubTexture,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SphereMode {
    pub index: Option<usize>,
    pub kind: SphereModeKind,
}

/// represent which texture need to use for toon
/// * Separate use texture in texture list
/// * Common use embedded texture `toon01.bmp`..`toon10.bmp`
/// refer PMX仕様.txt 297 ~ 303
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ToonMode {
    Separate(Option<usize>),
    Common(u8),
}

///  refer PMX仕様.txt 276~310
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub english_name: String,
    pub diffuse: Vec4,
    pub specular: Vec3,
    pub specular_factor: f32,
    pub ambient: Vec3,
    pub draw_mode: MaterialFlags,
    pub edge_color: Vec4,
    pub edge_size: f32,
    pub texture_index: Option<usize>,
    pub sphere_mode: Option<SphereMode>,
    pub toon_mode: ToonMode,
    pub memo: String,
    /// number of face indices this material consumes from the shared index buffer
    pub num_face_vertices: usize,
}

///from PMX仕様.txt 476 ~ 497
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub name: String,
    pub name_en: String,
    pub is_special: u8,
    pub inners: Vec<FrameInner>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FrameInner {
    pub target: Target,
    pub index: usize,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Target {
    Bone,
    Morph,
}

///refer PMX仕様.txt 348 ~ 354
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ConnectionDisplayMode {
    OtherBone(Option<usize>),
    Offset(Vec3),
}

impl Default for ConnectionDisplayMode {
    fn default() -> Self {
        Self::OtherBone(None)
    }
}

/// 付与親. present when the bone has rotation and/or translation inheritance.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AppendParent {
    pub parent: Option<usize>,
    pub rate: f32,
}

/// represent one bone
///
/// refer PMX仕様.txt 313 ~ 395
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub english_name: String,
    pub position: Vec3,
    pub parent: Option<usize>,
    /// transform level
    pub deform_depth: i32,
    pub flags: BoneFlags,
    pub connection_display_mode: ConnectionDisplayMode,
    /// 0x0100 | 0x0200
    pub append: Option<AppendParent>,
    /// 0x0400 refer PMX仕様.txt 362 ~ 365
    pub fixed_axis: Option<Vec3>,
    /// 0x0800 refer PMX仕様.txt 367 ~ 371
    pub local_axis: Option<(Vec3, Vec3)>,
    /// 0x2000 refer PMX仕様.txt 373 ~ 376
    pub external_parent: Option<i32>,
    /// 0x0020 refer PMX仕様.txt 378 ~ 396
    pub ik_info: Option<BoneIKInfo>,
}

impl Default for Bone {
    fn default() -> Self {
        Self {
            name: String::new(),
            english_name: String::new(),
            position: [0.0; 3],
            parent: None,
            deform_depth: 0,
            flags: BoneFlags::empty(),
            connection_display_mode: ConnectionDisplayMode::default(),
            append: None,
            fixed_axis: None,
            local_axis: None,
            external_parent: None,
            ik_info: None,
        }
    }
}

/// refer PMX仕様.txt 378 ~ 396
#[derive(Debug, Clone, PartialEq)]
pub struct BoneIKInfo {
    /// refer PMX仕様.txt 381
    pub ik_target_bone_index: usize,
    /// refer PMX仕様.txt 382
    pub ik_iter_count: i32,
    /// refer PMX仕様.txt 383
    pub ik_limit_angle: f32,
    /// refer PMX仕様.txt 385 ~ 395
    pub ik_links: Vec<IKLink>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IKLink {
    pub ik_bone_index: usize,
    pub angle_limit: Option<(Vec3, Vec3)>,
}

///PMX仕様.txt 399~459
#[derive(Debug, Clone, PartialEq)]
pub struct Morph {
    pub name: String,
    pub english_name: String,
    pub control_panel: ControlPanel,
    pub morph_data: MorphKinds,
}

/// where to place morph.
#[derive(Debug, Copy, Clone, PartialOrd, PartialEq, Ord, Eq)]
pub enum ControlPanel {
    System,
    BottomLeft,
    TopLeft,
    TopRight,
    BottomRight,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MorphKinds {
    Group(Vec<GroupMorph>),
    Vertex(Vec<VertexMorph>),
    Bone(Vec<BoneMorph>),
    UV(Vec<UVMorph>),
    UV1(Vec<UVMorph>),
    UV2(Vec<UVMorph>),
    UV3(Vec<UVMorph>),
    UV4(Vec<UVMorph>),
    Material(Vec<MaterialMorph>),
    Flip(Vec<FlipMorph>),
    Impulse(Vec<ImpulseMorph>),
}

impl MorphKinds {
    /// UV channel (0 = primary uv, 1..=4 = additional uv) and offsets of a UV morph.
    pub fn uv_channel(&self) -> Option<(usize, &[UVMorph])> {
        match self {
            Self::UV(v) => Some((0, v.as_slice())),
            Self::UV1(v) => Some((1, v.as_slice())),
            Self::UV2(v) => Some((2, v.as_slice())),
            Self::UV3(v) => Some((3, v.as_slice())),
            Self::UV4(v) => Some((4, v.as_slice())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexMorph {
    pub index: usize,
    pub offset: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UVMorph {
    pub index: usize,
    pub offset: Vec4,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GroupMorph {
    pub index: usize,
    pub morph_factor: f32,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoneMorph {
    pub index: usize,
    pub translates: Vec3,
    pub rotates: Vec4,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MaterialMorphMethod {
    Mul,
    Add,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialMorph {
    /// `None` targets every material
    pub index: Option<usize>,
    pub formula: MaterialMorphMethod,
    pub diffuse: Vec4,
    pub specular: Vec3,
    pub specular_factor: f32,
    pub ambient: Vec3,
    pub edge_color: Vec4,
    pub edge_size: f32,
    pub texture_factor: Vec4,
    pub sphere_texture_factor: Vec4,
    pub toon_texture_factor: Vec4,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlipMorph {
    pub index: usize,
    pub morph_factor: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseMorph {
    pub rigid_index: usize,
    pub is_local: u8,
    pub velocity: Vec3,
    pub torque: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rigid {
    pub name: String,
    pub name_en: String,
    pub bone_index: Option<usize>,
    pub group: u8,
    pub un_collision_group_flag: u16,
    pub form: RigidForm,
    pub size: Vec3,
    pub position: Vec3,
    pub rotation: Vec3,
    pub mass: f32,
    pub move_resist: f32,
    pub rotation_resist: f32,
    pub repulsion: f32,
    pub friction: f32,
    pub calc_method: RigidCalcMethod,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RigidForm {
    Sphere,
    Box,
    Capsule,
}

#[derive(Copy, Debug, Clone, Eq, PartialEq)]
pub enum RigidCalcMethod {
    /// bone driven
    Static,
    Dynamic,
    DynamicWithBonePosition,
}

/// PMX 2.0 only knows `Spring6DOF`; the other kinds are PMX 2.1 and share
/// the same parameter block.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum JointKind {
    Spring6DOF,
    SixDof,
    P2P,
    ConeTwist,
    Slider,
    Hinge,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Joint {
    pub name: String,
    pub name_en: String,
    pub kind: JointKind,
    pub a_rigid_index: usize,
    pub b_rigid_index: usize,
    pub position: Vec3,
    pub rotation: Vec3,
    pub move_limit_down: Vec3,
    pub move_limit_up: Vec3,
    pub rotation_limit_down: Vec3,
    pub rotation_limit_up: Vec3,
    pub spring_const_move: Vec3,
    pub spring_const_rotation: Vec3,
}

/// One decoded PMX file.
///
/// Immutable once decoded; every derived table of the conversion refers back
/// into these arrays by index.
#[derive(Debug, Clone)]
pub struct Document {
    pub header: Header,
    pub model_info: ModelInfo,
    pub vertices: Vec<Vertex>,
    /// flat triangle list, three entries per face
    pub indices: Vec<usize>,
    pub textures: Vec<String>,
    pub materials: Vec<Material>,
    pub bones: Vec<Bone>,
    pub morphs: Vec<Morph>,
    pub frames: Vec<Frame>,
    pub rigid_bodies: Vec<Rigid>,
    pub joints: Vec<Joint>,
}

bitflags! {
    pub struct MaterialFlags :u8 {
        const DISABLE_CULLING =0x01;
        const GROUND_SHADOW =0x02;
        const DRAW_SHADOW =0x04;
        const RECEIVE_SHADOW= 0x08;
        const HAS_EDGE =0x10;
        const VERTEX_COLOR = 0x20;
        const POINT_DRAW = 0x40;
        const LINE_DRAW =  0x80;
    }
}

bitflags! {
    pub struct BoneFlags : u16{
        const CONNECT_TO_OTHER_BONE=0x01;
        const ROTATABLE =0x02;
        const TRANSLATABLE =0x04;
        const IS_VISIBLE =0x08;
        const ENABLED = 0x10;
        const IK = 0x20;
        const INHERIT_LOCAL = 0x80;
        const INHERIT_ROTATION =0x100;
        const INHERIT_TRANSLATION = 0x200;
        const FIXED_AXIS = 0x400;
        const LOCAL_COORDINATE = 0x800;
        const PHYSICS_AFTER_DEFORM = 0x1000;
        const EXTERNAL_PARENT_DEFORM = 0x2000;
    }
}

/// width of texture/material/bone/morph/rigid references. signed on the wire.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IndexKinds {
    I8,
    I16,
    I32,
}

/// width of vertex references. unsigned for 1 and 2 bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VertexIndexKinds {
    U8,
    U16,
    I32,
}

impl TryFrom<u8> for IndexKinds {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::I8),
            2 => Ok(Self::I16),
            4 => Ok(Self::I32),
            _ => Err(()),
        }
    }
}

impl TryFrom<u8> for VertexIndexKinds {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::U8),
            2 => Ok(Self::U16),
            4 => Ok(Self::I32),
            _ => Err(()),
        }
    }
}
