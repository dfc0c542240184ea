//! Conversion options and the end to end pipeline from a decoded
//! [`Document`] to engine agnostic scene descriptors.

use crate::bone::{create_bones, entry_bone_controllers, BoneController, BoneNode};
use crate::error::{get, Error, Result};
use crate::mesh::{create_mesh_creation_info_multi, MeshCreationInfo, MeshGeometry, MAX_VERTEX_COUNT_IN_MESH};
use crate::morph::{create_morph, MorphManager};
use crate::physics::{create_physics, PhysicsSetup};
use crate::progress::Progress;
use crate::transparency::{classify_materials, AlphaReadableTextures};
use crate::types::{Document, Material, MaterialFlags, SphereModeKind, ToonMode, Vec3, Vec4};
#[cfg(feature = "derive_serde")]
use serde::{Deserialize, Serialize};

/// scale at which outline widths match the original renderer
pub const DEFAULT_SCALE: f32 = 0.085;

/// render queue of transparent geometry
pub const RENDER_QUEUE_TRANSPARENT: i32 = 3000;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
pub enum ShaderType {
    Default,
    HalfLambert,
    MMDShader,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
pub enum AnimationType {
    GenericMecanim,
    HumanMecanim,
    LegacyAnimation,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
pub struct ConvertOptions {
    pub shader_type: ShaderType,
    pub use_rigidbody: bool,
    pub animation_type: AnimationType,
    pub use_ik: bool,
    pub scale: f32,
    /// vertex ceiling of one mesh group
    pub max_vertex_count: usize,
    /// order transparent materials by material index
    pub enable_render_queue: bool,
    pub render_queue_value: i32,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            shader_type: ShaderType::MMDShader,
            use_rigidbody: true,
            animation_type: AnimationType::GenericMecanim,
            use_ik: true,
            scale: DEFAULT_SCALE,
            max_vertex_count: MAX_VERTEX_COUNT_IN_MESH,
            enable_render_queue: false,
            render_queue_value: RENDER_QUEUE_TRANSPARENT,
        }
    }
}

impl ConvertOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.scale > 0.0) || !self.scale.is_finite() {
            return Err(Error::InvalidOption(format!(
                "scale must be positive, got {}",
                self.scale
            )));
        }
        // a single triangle has to fit below the ceiling
        if self.max_vertex_count < 4 {
            return Err(Error::InvalidOption(format!(
                "max vertex count must be at least 4, got {}",
                self.max_vertex_count
            )));
        }
        Ok(())
    }
}

/// Material settings for the host renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDescriptor {
    pub name: String,
    pub shader_path: String,
    pub color: Vec4,
    pub ambient_color: Vec3,
    pub opacity: f32,
    pub specular_color: Vec3,
    pub shininess: f32,
    pub outline_width: f32,
    pub outline_color: Vec4,
    /// `-1` keeps the shader's queue
    pub render_queue: i32,
    /// index into [`Document::textures`]
    pub main_texture: Option<usize>,
    /// sub textures have no shader slot and are left out
    pub sphere_texture: Option<(usize, SphereModeKind)>,
    pub toon_texture: Option<String>,
    pub is_transparent: bool,
}

/// Everything the host needs to assemble the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedModel {
    pub name: String,
    pub shader_type: ShaderType,
    pub animation_type: AnimationType,
    pub scale: f32,
    pub creation_list: Vec<MeshCreationInfo>,
    /// one per entry of `creation_list`
    pub meshes: Vec<MeshGeometry>,
    pub materials: Vec<MaterialDescriptor>,
    pub bones: Vec<BoneNode>,
    pub bone_controllers: Vec<BoneController>,
    /// bones carrying an IK solver
    pub ik_list: Vec<usize>,
    pub morph: MorphManager,
    /// `None` when physics is turned off
    pub physics: Option<PhysicsSetup>,
}

/// `MMD/[Transparent/]PMDMaterial[-with-Outline][-CullBack][-NoCastShadow]`
pub fn mmd_shader_path(material: &Material, is_transparent: bool) -> String {
    let mut result = String::from("MMD/");
    if is_transparent {
        result += "Transparent/";
    }
    result += "PMDMaterial";
    if material.draw_mode.contains(MaterialFlags::HAS_EDGE) {
        result += "-with-Outline";
    }
    if !material.draw_mode.contains(MaterialFlags::DISABLE_CULLING) {
        result += "-CullBack";
    }
    if !material.draw_mode.contains(MaterialFlags::GROUND_SHADOW) {
        result += "-NoCastShadow";
    }
    result
}

fn texture_index(doc: &Document, index: Option<usize>) -> Option<usize> {
    index.filter(|&i| doc.textures.get(i).map_or(false, |t| !t.is_empty()))
}

/// Common toon `n` refers to the shared `toon{n+1:02}.bmp`.
fn toon_texture(doc: &Document, toon: ToonMode) -> Option<String> {
    match toon {
        ToonMode::Common(n) => Some(format!("toon{:02}.bmp", u32::from(n) + 1)),
        ToonMode::Separate(index) => texture_index(doc, index).map(|i| doc.textures[i].clone()),
    }
}

pub fn convert_material(
    doc: &Document,
    material_index: usize,
    is_transparent: bool,
    options: &ConvertOptions,
) -> Result<MaterialDescriptor> {
    let material = get(&doc.materials, "material", material_index)?;
    let render_queue = if options.enable_render_queue && is_transparent {
        options.render_queue_value + material_index as i32
    } else {
        -1
    };
    let sphere_texture = material.sphere_mode.and_then(|s| {
        let index = texture_index(doc, s.index)?;
        match s.kind {
            SphereModeKind::SubTexture => None,
            kind => Some((index, kind)),
        }
    });
    Ok(MaterialDescriptor {
        name: material.name.clone(),
        shader_path: mmd_shader_path(material, is_transparent),
        color: material.diffuse,
        ambient_color: material.ambient,
        opacity: material.diffuse[3],
        specular_color: material.specular,
        shininess: material.specular_factor,
        outline_width: material.edge_size * options.scale / DEFAULT_SCALE,
        outline_color: material.edge_color,
        render_queue,
        main_texture: texture_index(doc, material.texture_index),
        sphere_texture,
        toon_texture: toon_texture(doc, material.toon_mode),
        is_transparent,
    })
}

fn phase(progress: &mut dyn Progress, message: &str, fraction: f32) -> Result<()> {
    progress.report(message, fraction);
    if progress.is_cancelled() {
        log::info!("cancelled before {}", message);
        return Err(Error::Cancelled);
    }
    Ok(())
}

/// Run every conversion phase on `doc`.
///
/// The document is validated first, so later phases only see in range
/// indices. `textures` enables the texture alpha rule of the transparency
/// classifier. Cancellation is checked between phases.
pub fn convert(
    doc: &Document,
    options: &ConvertOptions,
    textures: Option<&AlphaReadableTextures>,
    progress: &mut dyn Progress,
) -> Result<ConvertedModel> {
    options.validate()?;
    doc.validate()?;
    let scale = options.scale;

    phase(progress, "Import Pmx(CreateMesh)...", 0.0)?;
    let creation_list = create_mesh_creation_info_multi(doc, options.max_vertex_count)?;
    let meshes = creation_list
        .iter()
        .map(|c| MeshGeometry::build(c, doc, scale))
        .collect::<Result<Vec<_>>>()?;

    phase(progress, "Import Pmx(CreateMaterials)...", 1.0 / 6.0)?;
    let transparent = classify_materials(doc, textures, progress)?;
    let materials = transparent
        .iter()
        .enumerate()
        .map(|(i, &t)| convert_material(doc, i, t, options))
        .collect::<Result<Vec<_>>>()?;

    phase(progress, "Import Pmx(CreateBones)...", 2.0 / 6.0)?;
    let bones = create_bones(doc, scale);

    phase(progress, "Import Pmx(CreateMorph)...", 3.0 / 6.0)?;
    let morph = create_morph(doc, &creation_list, scale)?;

    phase(progress, "Import Pmx(EntryBoneController)...", 4.0 / 6.0)?;
    let bone_controllers = entry_bone_controllers(doc, options.use_ik)?;
    let ik_list = bone_controllers
        .iter()
        .filter(|c| c.ik_solver.is_some())
        .map(|c| c.bone)
        .collect();

    phase(progress, "Import Pmx(RigidBody)...", 5.0 / 6.0)?;
    let physics = if options.use_rigidbody {
        Some(create_physics(doc, &bones, &doc.model_info.name, scale)?)
    } else {
        None
    };
    progress.report("Import Pmx", 1.0);
    log::info!("converted \"{}\"", doc.model_info.name);

    Ok(ConvertedModel {
        name: doc.model_info.name.clone(),
        shader_type: options.shader_type,
        animation_type: options.animation_type,
        scale,
        creation_list,
        meshes,
        materials,
        bones,
        bone_controllers,
        ik_list,
        morph,
        physics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use crate::test_util::PmxBuilder;
    use crate::types::{RigidCalcMethod, SphereMode};

    struct Recorder {
        messages: Vec<String>,
        cancel_at: Option<usize>,
    }

    impl Progress for Recorder {
        fn report(&mut self, message: &str, _fraction: f32) {
            self.messages.push(message.to_owned());
        }

        fn is_cancelled(&self) -> bool {
            self.cancel_at.map_or(false, |n| self.messages.len() > n)
        }
    }

    #[test]
    fn options_are_validated() {
        assert!(ConvertOptions::default().validate().is_ok());
        let bad_scale = ConvertOptions {
            scale: 0.0,
            ..ConvertOptions::default()
        };
        assert!(matches!(bad_scale.validate(), Err(Error::InvalidOption(_))));
        let bad_ceiling = ConvertOptions {
            max_vertex_count: 3,
            ..ConvertOptions::default()
        };
        assert!(matches!(bad_ceiling.validate(), Err(Error::InvalidOption(_))));
    }

    #[test]
    fn shader_path_follows_flags() {
        let mut m = PmxBuilder::material("body", 3);
        assert_eq!(mmd_shader_path(&m, false), "MMD/PMDMaterial-CullBack");
        m.draw_mode = MaterialFlags::HAS_EDGE | MaterialFlags::DISABLE_CULLING;
        assert_eq!(
            mmd_shader_path(&m, true),
            "MMD/Transparent/PMDMaterial-with-Outline-NoCastShadow"
        );
    }

    #[test]
    fn material_descriptor() {
        let mut b = PmxBuilder::new().triangle_model();
        b.textures = vec!["face.png".to_owned(), "spa.spa".to_owned()];
        b.materials[0].texture_index = Some(0);
        b.materials[0].sphere_mode = Some(SphereMode {
            index: Some(1),
            kind: SphereModeKind::Add,
        });
        b.materials[0].toon_mode = ToonMode::Common(2);
        b.materials[0].edge_size = 2.0;
        let doc = b.document();
        let options = ConvertOptions {
            scale: DEFAULT_SCALE * 2.0,
            enable_render_queue: true,
            ..ConvertOptions::default()
        };
        let m = convert_material(&doc, 0, true, &options).unwrap();
        assert_eq!(m.outline_width, 4.0);
        assert_eq!(m.render_queue, 3000);
        assert_eq!(m.main_texture, Some(0));
        assert_eq!(m.sphere_texture, Some((1, SphereModeKind::Add)));
        assert_eq!(m.toon_texture.as_deref(), Some("toon03.bmp"));
        let opaque = convert_material(&doc, 0, false, &options).unwrap();
        assert_eq!(opaque.render_queue, -1);
        assert!(matches!(
            convert_material(&doc, doc.materials.len(), false, &options),
            Err(Error::Range {
                kind: "material",
                ..
            })
        ));
    }

    #[test]
    fn converts_whole_model() {
        let mut b = PmxBuilder::new().triangle_model();
        b.rigid_bodies
            .push(PmxBuilder::rigid("center", Some(0), RigidCalcMethod::Static));
        let doc = b.document();
        let mut recorder = Recorder {
            messages: vec![],
            cancel_at: None,
        };
        let model = convert(&doc, &ConvertOptions::default(), None, &mut recorder).unwrap();
        assert_eq!(model.meshes.len(), 1);
        assert_eq!(model.meshes[0].triangles, vec![vec![0, 1, 2]]);
        assert_eq!(model.materials.len(), 1);
        assert!(!model.materials[0].is_transparent);
        assert_eq!(model.bones.len(), 1);
        assert_eq!(model.physics.as_ref().map(|p| p.bodies.len()), Some(1));
        assert_eq!(recorder.messages.last().map(String::as_str), Some("Import Pmx"));

        let no_physics = ConvertOptions {
            use_rigidbody: false,
            ..ConvertOptions::default()
        };
        assert!(convert(&doc, &no_physics, None, &mut NoProgress)
            .unwrap()
            .physics
            .is_none());
    }

    #[test]
    fn cancel_between_phases() {
        let doc = PmxBuilder::new().triangle_model().document();
        let mut recorder = Recorder {
            messages: vec![],
            cancel_at: Some(1),
        };
        assert!(matches!(
            convert(&doc, &ConvertOptions::default(), None, &mut recorder),
            Err(Error::Cancelled)
        ));
        assert_eq!(recorder.messages.len(), 2);
    }

    #[test]
    fn corrupt_document_is_rejected() {
        let mut b = PmxBuilder::new().triangle_model();
        b.materials[0].num_face_vertices = 6;
        let doc = b.document();
        assert!(matches!(
            convert(&doc, &ConvertOptions::default(), None, &mut NoProgress),
            Err(Error::Range { .. })
        ));
    }
}
