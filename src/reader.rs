//! # PMX reading module.
//! this module separated to some parts.To avoid invalid reading.
//!
//! |Current stage|product|Next stage|
//! |-------------|-------|----------|
//! |[`ModelInfoStage`]|[`ModelInfo`]|[`VerticesStage`]|
//! |[`VerticesStage`]|[`Vec<Vertex>`]|[`FacesStage`]|
//! |[`FacesStage`]|[`Vec<usize>`]|[`TexturesStage`]|
//! |[`TexturesStage`]|[`Vec<String>`]|[`MaterialsStage`]|
//! |[`MaterialsStage`]|[`Vec<Material>`]|[`BonesStage`]|
//! |[`BonesStage`]|[`Vec<Bone>`]|[`MorphsStage`]|
//! |[`MorphsStage`]|[`Vec<Morph>`]|[`FrameStage`]|
//! |[`FrameStage`]|[`Vec<Frame>`]|[`RigidStage`]|
//! |[`RigidStage`]|[`Vec<Rigid>`]|[`JointStage`]|
//! |[`JointStage`]|[`Vec<Joint>`]|There are no reader|
//!
//! Most callers want [`Document::open`] or [`Document::read`], which run
//! every stage in order.

use crate::binary_reader::BinaryReader;
use crate::error::{Error, FormatError, Result};
use crate::types::{
    AppendParent, Bone, BoneFlags, BoneIKInfo, BoneMorph, ConnectionDisplayMode, ControlPanel,
    Document, Encode, FlipMorph, Frame, FrameInner, GroupMorph, Header, IKLink, ImpulseMorph,
    Joint, JointKind, Material, MaterialFlags, MaterialMorph, MaterialMorphMethod, ModelInfo,
    Morph, MorphKinds, PMXVersion, Rigid, RigidCalcMethod, RigidForm, SphereMode, SphereModeKind,
    Target, ToonMode, UVMorph, Vertex, VertexMorph, VertexWeight,
};
use crate::types::{IndexKinds, VertexIndexKinds};
use std::convert::TryFrom;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

type ReadResult<T> = std::result::Result<T, FormatError>;

const MAGIC: [u8; 4] = [0x50, 0x4d, 0x58, 0x20];

fn parse_header<R: Read>(inner: &mut BinaryReader<R>) -> ReadResult<Header> {
    if inner.read_magic()? != MAGIC {
        return Err(FormatError::InvalidMagic);
    }
    let version = inner.read_f32()?;
    let version = if (2.0..2.2).contains(&version) {
        if version > 2.05 {
            PMXVersion::V21
        } else {
            PMXVersion::V20
        }
    } else {
        return Err(FormatError::UnsupportedVersion(version));
    };
    let length = inner.read_u8()?;
    if length < 8 {
        return Err(FormatError::InvalidIndexSize(length));
    }
    let config = inner.read_vec(usize::from(length))?;
    let index_size = |b: u8| IndexKinds::try_from(b).map_err(|_| FormatError::InvalidIndexSize(b));
    let additional_uv = config[1];
    if additional_uv > 4 {
        return Err(FormatError::unknown_tag("additional uv count", additional_uv));
    }
    Ok(Header {
        version,
        encode: match config[0] {
            0 => Encode::Utf16Le,
            1 => Encode::UTF8,
            x => return Err(FormatError::InvalidEncoding(x)),
        },
        additional_uv,
        s_vertex_index: VertexIndexKinds::try_from(config[2])
            .map_err(|_| FormatError::InvalidIndexSize(config[2]))?,
        s_texture_index: index_size(config[3])?,
        s_material_index: index_size(config[4])?,
        s_bone_index: index_size(config[5])?,
        s_morph_index: index_size(config[6])?,
        s_rigid_body_index: index_size(config[7])?,
    })
}

pub struct ModelInfoStage<R>(ReaderInner<R>);

impl ModelInfoStage<BufReader<File>> {
    /// the start of reader module.
    ///
    /// # Errors
    /// * invalid path given
    /// * magic number is not `PMX `, or the header is malformed
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let inner = BinaryReader::open(path).map_err(|e| Error::resource(path, e))?;
        Ok(Self::from_binary(inner)?)
    }
}

impl<R: Read> ModelInfoStage<R> {
    /// start reading from any byte stream.
    pub fn new(stream: R) -> Result<Self> {
        Ok(Self::from_binary(BinaryReader::new(stream))?)
    }

    fn from_binary(mut inner: BinaryReader<R>) -> ReadResult<Self> {
        let header = parse_header(&mut inner)?;
        Ok(ModelInfoStage(ReaderInner { inner, header }))
    }

    pub fn get_header(&self) -> Header {
        self.0.header.clone()
    }

    pub fn read(mut self) -> Result<(ModelInfo, VerticesStage<R>)> {
        Ok((
            ModelInfo {
                name: self.0.read_text_buf()?,
                name_en: self.0.read_text_buf()?,
                comment: self.0.read_text_buf()?,
                comment_en: self.0.read_text_buf()?,
            },
            VerticesStage(self.0),
        ))
    }
}

pub struct VerticesStage<R>(ReaderInner<R>);

impl<R: Read> VerticesStage<R> {
    pub fn read(mut self) -> Result<(Vec<Vertex>, FacesStage<R>)> {
        let count = self.0.read_count()?;
        let vertices = (0..count)
            .map(|_| self.read_pmx_vertex())
            .collect::<ReadResult<_>>()?;
        Ok((vertices, FacesStage(self.0)))
    }

    fn read_pmx_vertex(&mut self) -> ReadResult<Vertex> {
        let position = self.0.read_vec3()?;
        let norm = self.0.read_vec3()?;
        let uv = self.0.read_vec2()?;
        let mut add_uv = [[0.0; 4]; 4];
        for slot in add_uv.iter_mut().take(usize::from(self.0.header.additional_uv)) {
            *slot = self.0.read_vec4()?;
        }
        let weight_type = match self.0.read_u8()? {
            0 => VertexWeight::BDEF1(self.0.read_bone_index()?),
            1 => VertexWeight::BDEF2 {
                bone_index_1: self.0.read_bone_index()?,
                bone_index_2: self.0.read_bone_index()?,
                bone_weight_1: self.0.read_f32()?,
            },
            2 => {
                let (bone_indices, bone_weights) = self.read_four_bones()?;
                VertexWeight::BDEF4 {
                    bone_indices,
                    bone_weights,
                }
            }
            3 => VertexWeight::SDEF {
                bone_index_1: self.0.read_bone_index()?,
                bone_index_2: self.0.read_bone_index()?,
                bone_weight_1: self.0.read_f32()?,
                sdef_c: self.0.read_vec3()?,
                sdef_r0: self.0.read_vec3()?,
                sdef_r1: self.0.read_vec3()?,
            },
            4 => {
                let (bone_indices, bone_weights) = self.read_four_bones()?;
                VertexWeight::QDEF {
                    bone_indices,
                    bone_weights,
                }
            }
            x => return Err(FormatError::unknown_tag("weight method", x)),
        };
        Ok(Vertex {
            position,
            norm,
            uv,
            add_uv,
            weight_type,
            edge_mag: self.0.read_f32()?,
        })
    }

    fn read_four_bones(&mut self) -> ReadResult<([Option<usize>; 4], [f32; 4])> {
        let mut indices = [None; 4];
        for i in indices.iter_mut() {
            *i = self.0.read_bone_index()?;
        }
        let mut weights = [0.0; 4];
        for w in weights.iter_mut() {
            *w = self.0.read_f32()?;
        }
        Ok((indices, weights))
    }
}

pub struct FacesStage<R>(ReaderInner<R>);

impl<R: Read> FacesStage<R> {
    /// Read the flat triangle index buffer.
    pub fn read(mut self) -> Result<(Vec<usize>, TexturesStage<R>)> {
        let count = self.0.read_count()?;
        let indices = (0..count)
            .map(|_| self.0.read_vertex_index())
            .collect::<ReadResult<_>>()?;
        Ok((indices, TexturesStage(self.0)))
    }
}

pub struct TexturesStage<R>(ReaderInner<R>);

impl<R: Read> TexturesStage<R> {
    /// Read relative texture path from current reading file
    ///
    /// # Note
    /// paths may use `\` as separator, see [`texture_path`](crate::path::texture_path)
    pub fn read(mut self) -> Result<(Vec<String>, MaterialsStage<R>)> {
        let count = self.0.read_count()?;
        let textures = (0..count)
            .map(|_| self.0.read_text_buf())
            .collect::<ReadResult<_>>()?;
        Ok((textures, MaterialsStage(self.0)))
    }
}

pub struct MaterialsStage<R>(ReaderInner<R>);

impl<R: Read> MaterialsStage<R> {
    ///Read material's information contains name ambient diffuse specular etc parameters.
    pub fn read(mut self) -> Result<(Vec<Material>, BonesStage<R>)> {
        let count = self.0.read_count()?;
        let materials = (0..count)
            .map(|_| self.read_pmx_material())
            .collect::<ReadResult<_>>()?;
        Ok((materials, BonesStage(self.0)))
    }

    fn read_pmx_material(&mut self) -> ReadResult<Material> {
        Ok(Material {
            name: self.0.read_text_buf()?,
            english_name: self.0.read_text_buf()?,
            diffuse: self.0.read_vec4()?,
            specular: self.0.read_vec3()?,
            specular_factor: self.0.read_f32()?,
            ambient: self.0.read_vec3()?,
            draw_mode: MaterialFlags::from_bits_truncate(self.0.read_u8()?),
            edge_color: self.0.read_vec4()?,
            edge_size: self.0.read_f32()?,
            texture_index: self.0.read_texture_index()?,
            sphere_mode: {
                let index = self.0.read_texture_index()?;
                let kind = match self.0.read_u8()? {
                    0 => None,
                    1 => Some(SphereModeKind::Mul),
                    2 => Some(SphereModeKind::Add),
                    3 => Some(SphereModeKind::SubTexture),
                    x => return Err(FormatError::unknown_tag("sphere mode", x)),
                };
                kind.map(|kind| SphereMode { index, kind })
            },
            toon_mode: match self.0.read_u8()? {
                0 => ToonMode::Separate(self.0.read_texture_index()?),
                1 => ToonMode::Common(self.0.read_u8()?),
                x => return Err(FormatError::unknown_tag("toon mode", x)),
            },
            memo: self.0.read_text_buf()?,
            num_face_vertices: self.0.read_count()?,
        })
    }
}

pub struct BonesStage<R>(ReaderInner<R>);

impl<R: Read> BonesStage<R> {
    /// read bone's information parent child IK etc.
    pub fn read(mut self) -> Result<(Vec<Bone>, MorphsStage<R>)> {
        let count = self.0.read_count()?;
        let bones = (0..count)
            .map(|_| self.read_pmx_bone())
            .collect::<ReadResult<_>>()?;
        Ok((bones, MorphsStage(self.0)))
    }

    fn read_pmx_bone(&mut self) -> ReadResult<Bone> {
        let mut ctx = Bone {
            name: self.0.read_text_buf()?,
            english_name: self.0.read_text_buf()?,
            position: self.0.read_vec3()?,
            parent: self.0.read_bone_index()?,
            deform_depth: self.0.read_i32()?,
            ..Bone::default()
        };
        let bone_flags = BoneFlags::from_bits_truncate(self.0.read_u16()?);
        ctx.flags = bone_flags;
        ctx.connection_display_mode = if bone_flags.intersects(BoneFlags::CONNECT_TO_OTHER_BONE) {
            ConnectionDisplayMode::OtherBone(self.0.read_bone_index()?)
        } else {
            ConnectionDisplayMode::Offset(self.0.read_vec3()?)
        };
        if bone_flags.intersects(BoneFlags::INHERIT_ROTATION | BoneFlags::INHERIT_TRANSLATION) {
            ctx.append = Some(AppendParent {
                parent: self.0.read_bone_index()?,
                rate: self.0.read_f32()?,
            });
        }
        if bone_flags.intersects(BoneFlags::FIXED_AXIS) {
            ctx.fixed_axis = Some(self.0.read_vec3()?);
        }
        if bone_flags.intersects(BoneFlags::LOCAL_COORDINATE) {
            ctx.local_axis = Some((self.0.read_vec3()?, self.0.read_vec3()?));
        }
        if bone_flags.intersects(BoneFlags::EXTERNAL_PARENT_DEFORM) {
            ctx.external_parent = Some(self.0.read_i32()?);
        }
        if bone_flags.intersects(BoneFlags::IK) {
            let ik_target_bone_index = self.0.read_required_bone_index()?;
            let ik_iter_count = self.0.read_i32()?;
            let ik_limit_angle = self.0.read_f32()?;
            let link_count = self.0.read_count()?;
            ctx.ik_info = Some(BoneIKInfo {
                ik_target_bone_index,
                ik_iter_count,
                ik_limit_angle,
                ik_links: (0..link_count)
                    .map(|_| self.read_iklink())
                    .collect::<ReadResult<_>>()?,
            });
        }
        Ok(ctx)
    }

    fn read_iklink(&mut self) -> ReadResult<IKLink> {
        Ok(IKLink {
            ik_bone_index: self.0.read_required_bone_index()?,
            angle_limit: match self.0.read_u8()? {
                0 => None,
                1 => Some((self.0.read_vec3()?, self.0.read_vec3()?)),
                x => return Err(FormatError::unknown_tag("ik angle limit", x)),
            },
        })
    }
}

pub struct MorphsStage<R>(ReaderInner<R>);

impl<R: Read> MorphsStage<R> {
    pub fn read(mut self) -> Result<(Vec<Morph>, FrameStage<R>)> {
        let count = self.0.read_count()?;
        let morphs = (0..count)
            .map(|_| self.read_pmx_morph())
            .collect::<ReadResult<_>>()?;
        Ok((morphs, FrameStage(self.0)))
    }

    fn read_pmx_morph(&mut self) -> ReadResult<Morph> {
        let name = self.0.read_text_buf()?;
        let english_name = self.0.read_text_buf()?;
        let control_panel = match self.0.read_u8()? {
            0 => ControlPanel::System,
            1 => ControlPanel::BottomLeft,
            2 => ControlPanel::TopLeft,
            3 => ControlPanel::TopRight,
            4 => ControlPanel::BottomRight,
            x => return Err(FormatError::unknown_tag("morph panel", x)),
        };
        let morph_kind = self.0.read_u8()?;
        let count = self.0.read_count()?;
        let morph_data = match morph_kind {
            0 => MorphKinds::Group(self.read_n(count, Self::read_group_morph)?),
            1 => MorphKinds::Vertex(self.read_n(count, Self::read_vertex_morph)?),
            2 => MorphKinds::Bone(self.read_n(count, Self::read_bone_morph)?),
            3 => MorphKinds::UV(self.read_n(count, Self::read_uv_morph)?),
            4 => MorphKinds::UV1(self.read_n(count, Self::read_uv_morph)?),
            5 => MorphKinds::UV2(self.read_n(count, Self::read_uv_morph)?),
            6 => MorphKinds::UV3(self.read_n(count, Self::read_uv_morph)?),
            7 => MorphKinds::UV4(self.read_n(count, Self::read_uv_morph)?),
            8 => MorphKinds::Material(self.read_n(count, Self::read_material_morph)?),
            9 => MorphKinds::Flip(self.read_n(count, Self::read_flip_morph)?),
            10 => MorphKinds::Impulse(self.read_n(count, Self::read_impulse_morph)?),
            x => return Err(FormatError::unknown_tag("morph kind", x)),
        };
        Ok(Morph {
            name,
            english_name,
            control_panel,
            morph_data,
        })
    }

    fn read_n<T>(
        &mut self,
        count: usize,
        f: fn(&mut Self) -> ReadResult<T>,
    ) -> ReadResult<Vec<T>> {
        (0..count).map(|_| f(self)).collect()
    }

    fn read_vertex_morph(&mut self) -> ReadResult<VertexMorph> {
        Ok(VertexMorph {
            index: self.0.read_vertex_index()?,
            offset: self.0.read_vec3()?,
        })
    }
    fn read_uv_morph(&mut self) -> ReadResult<UVMorph> {
        Ok(UVMorph {
            index: self.0.read_vertex_index()?,
            offset: self.0.read_vec4()?,
        })
    }
    fn read_bone_morph(&mut self) -> ReadResult<BoneMorph> {
        Ok(BoneMorph {
            index: self.0.read_required_bone_index()?,
            translates: self.0.read_vec3()?,
            rotates: self.0.read_vec4()?,
        })
    }
    fn read_material_morph(&mut self) -> ReadResult<MaterialMorph> {
        Ok(MaterialMorph {
            index: self.0.read_material_index()?,
            formula: match self.0.read_u8()? {
                0 => MaterialMorphMethod::Mul,
                1 => MaterialMorphMethod::Add,
                x => return Err(FormatError::unknown_tag("material morph method", x)),
            },
            diffuse: self.0.read_vec4()?,
            specular: self.0.read_vec3()?,
            specular_factor: self.0.read_f32()?,
            ambient: self.0.read_vec3()?,
            edge_color: self.0.read_vec4()?,
            edge_size: self.0.read_f32()?,
            texture_factor: self.0.read_vec4()?,
            sphere_texture_factor: self.0.read_vec4()?,
            toon_texture_factor: self.0.read_vec4()?,
        })
    }
    fn read_group_morph(&mut self) -> ReadResult<GroupMorph> {
        Ok(GroupMorph {
            index: self.0.read_required_morph_index()?,
            morph_factor: self.0.read_f32()?,
        })
    }
    fn read_flip_morph(&mut self) -> ReadResult<FlipMorph> {
        Ok(FlipMorph {
            index: self.0.read_required_morph_index()?,
            morph_factor: self.0.read_f32()?,
        })
    }
    fn read_impulse_morph(&mut self) -> ReadResult<ImpulseMorph> {
        Ok(ImpulseMorph {
            rigid_index: self.0.read_required_rigid_index()?,
            is_local: self.0.read_u8()?,
            velocity: self.0.read_vec3()?,
            torque: self.0.read_vec3()?,
        })
    }
}

pub struct FrameStage<R>(ReaderInner<R>);

impl<R: Read> FrameStage<R> {
    /// read `MMD` display frames
    pub fn read(mut self) -> Result<(Vec<Frame>, RigidStage<R>)> {
        let count = self.0.read_count()?;
        let frames = (0..count)
            .map(|_| self.read_frame())
            .collect::<ReadResult<_>>()?;
        Ok((frames, RigidStage(self.0)))
    }

    fn read_frame(&mut self) -> ReadResult<Frame> {
        let name = self.0.read_text_buf()?;
        let name_en = self.0.read_text_buf()?;
        let is_special = self.0.read_u8()?;
        let count = self.0.read_count()?;
        let inners = (0..count)
            .map(|_| match self.0.read_u8()? {
                0 => Ok(FrameInner {
                    target: Target::Bone,
                    index: self.0.read_required_bone_index()?,
                }),
                1 => Ok(FrameInner {
                    target: Target::Morph,
                    index: self.0.read_required_morph_index()?,
                }),
                x => Err(FormatError::unknown_tag("frame target", x)),
            })
            .collect::<ReadResult<_>>()?;
        Ok(Frame {
            name,
            name_en,
            is_special,
            inners,
        })
    }
}

pub struct RigidStage<R>(ReaderInner<R>);

impl<R: Read> RigidStage<R> {
    pub fn read(mut self) -> Result<(Vec<Rigid>, JointStage<R>)> {
        let count = self.0.read_count()?;
        let rigids = (0..count)
            .map(|_| self.read_rigid())
            .collect::<ReadResult<_>>()?;
        Ok((rigids, JointStage(self.0)))
    }

    fn read_rigid(&mut self) -> ReadResult<Rigid> {
        Ok(Rigid {
            name: self.0.read_text_buf()?,
            name_en: self.0.read_text_buf()?,
            bone_index: self.0.read_bone_index()?,
            group: self.0.read_u8()?,
            un_collision_group_flag: self.0.read_u16()?,
            form: match self.0.read_u8()? {
                0 => RigidForm::Sphere,
                1 => RigidForm::Box,
                2 => RigidForm::Capsule,
                x => return Err(FormatError::unknown_tag("rigid shape", x)),
            },
            size: self.0.read_vec3()?,
            position: self.0.read_vec3()?,
            rotation: self.0.read_vec3()?,
            mass: self.0.read_f32()?,
            move_resist: self.0.read_f32()?,
            rotation_resist: self.0.read_f32()?,
            repulsion: self.0.read_f32()?,
            friction: self.0.read_f32()?,
            calc_method: match self.0.read_u8()? {
                0 => RigidCalcMethod::Static,
                1 => RigidCalcMethod::Dynamic,
                2 => RigidCalcMethod::DynamicWithBonePosition,
                x => return Err(FormatError::unknown_tag("rigid operation", x)),
            },
        })
    }
}

pub struct JointStage<R>(ReaderInner<R>);

impl<R: Read> JointStage<R> {
    /// last stage. PMX 2.1 soft bodies that may follow are not read.
    pub fn read(mut self) -> Result<Vec<Joint>> {
        let count = self.0.read_count()?;
        Ok((0..count)
            .map(|_| self.read_joint())
            .collect::<ReadResult<_>>()?)
    }

    fn read_joint(&mut self) -> ReadResult<Joint> {
        Ok(Joint {
            name: self.0.read_text_buf()?,
            name_en: self.0.read_text_buf()?,
            kind: match self.0.read_u8()? {
                0 => JointKind::Spring6DOF,
                1 => JointKind::SixDof,
                2 => JointKind::P2P,
                3 => JointKind::ConeTwist,
                4 => JointKind::Slider,
                5 => JointKind::Hinge,
                x => return Err(FormatError::unknown_tag("joint kind", x)),
            },
            a_rigid_index: self.0.read_required_rigid_index()?,
            b_rigid_index: self.0.read_required_rigid_index()?,
            position: self.0.read_vec3()?,
            rotation: self.0.read_vec3()?,
            move_limit_down: self.0.read_vec3()?,
            move_limit_up: self.0.read_vec3()?,
            rotation_limit_down: self.0.read_vec3()?,
            rotation_limit_up: self.0.read_vec3()?,
            spring_const_move: self.0.read_vec3()?,
            spring_const_rotation: self.0.read_vec3()?,
        })
    }
}

struct ReaderInner<R> {
    inner: BinaryReader<R>,
    header: Header,
}

fn required(index: Option<usize>) -> ReadResult<usize> {
    index.ok_or(FormatError::InvalidIndex(-1))
}

impl<R: Read> ReaderInner<R> {
    fn read_vertex_index(&mut self) -> ReadResult<usize> {
        self.inner.read_vertex_index(self.header.s_vertex_index)
    }

    fn read_texture_index(&mut self) -> ReadResult<Option<usize>> {
        self.inner.read_sized(self.header.s_texture_index)
    }

    fn read_material_index(&mut self) -> ReadResult<Option<usize>> {
        self.inner.read_sized(self.header.s_material_index)
    }

    fn read_bone_index(&mut self) -> ReadResult<Option<usize>> {
        self.inner.read_sized(self.header.s_bone_index)
    }

    fn read_required_bone_index(&mut self) -> ReadResult<usize> {
        required(self.read_bone_index()?)
    }

    fn read_required_morph_index(&mut self) -> ReadResult<usize> {
        required(self.inner.read_sized(self.header.s_morph_index)?)
    }

    fn read_required_rigid_index(&mut self) -> ReadResult<usize> {
        required(self.inner.read_sized(self.header.s_rigid_body_index)?)
    }

    fn read_u8(&mut self) -> ReadResult<u8> {
        self.inner.read_u8()
    }

    fn read_u16(&mut self) -> ReadResult<u16> {
        self.inner.read_u16()
    }

    fn read_i32(&mut self) -> ReadResult<i32> {
        self.inner.read_i32()
    }

    fn read_count(&mut self) -> ReadResult<usize> {
        self.inner.read_count()
    }

    fn read_vec4(&mut self) -> ReadResult<[f32; 4]> {
        self.inner.read_vec4()
    }

    fn read_vec3(&mut self) -> ReadResult<[f32; 3]> {
        self.inner.read_vec3()
    }

    fn read_vec2(&mut self) -> ReadResult<[f32; 2]> {
        self.inner.read_vec2()
    }

    fn read_f32(&mut self) -> ReadResult<f32> {
        self.inner.read_f32()
    }

    fn read_text_buf(&mut self) -> ReadResult<String> {
        self.inner.read_text_buf(self.header.encode)
    }
}

/// Read only the header and the embedded names/comments.
pub fn read_header<P: AsRef<Path>>(path: P) -> Result<(Header, ModelInfo)> {
    let stage = ModelInfoStage::open(path)?;
    let header = stage.get_header();
    let (model_info, _) = stage.read()?;
    Ok((header, model_info))
}

impl Document {
    /// Decode a whole PMX file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("opening {}", path.display());
        Self::from_stage(ModelInfoStage::open(path)?)
    }

    /// Decode a whole PMX document from any byte stream.
    pub fn read<R: Read>(stream: R) -> Result<Self> {
        Self::from_stage(ModelInfoStage::new(stream)?)
    }

    fn from_stage<R: Read>(stage: ModelInfoStage<R>) -> Result<Self> {
        let header = stage.get_header();
        let (model_info, ns) = stage.read()?;
        let (vertices, ns) = ns.read()?;
        let (indices, ns) = ns.read()?;
        let (textures, ns) = ns.read()?;
        let (materials, ns) = ns.read()?;
        let (bones, ns) = ns.read()?;
        let (morphs, ns) = ns.read()?;
        let (frames, ns) = ns.read()?;
        let (rigid_bodies, ns) = ns.read()?;
        let joints = ns.read()?;
        log::info!(
            "decoded \"{}\": {} vertices, {} faces, {} materials, {} bones, {} morphs, {} rigid bodies, {} joints",
            model_info.name,
            vertices.len(),
            indices.len() / 3,
            materials.len(),
            bones.len(),
            morphs.len(),
            rigid_bodies.len(),
            joints.len()
        );
        Ok(Document {
            header,
            model_info,
            vertices,
            indices,
            textures,
            materials,
            bones,
            morphs,
            frames,
            rigid_bodies,
            joints,
        })
    }
}
