//! Morph deformer packs.
//!
//! Every pack follows the same layout: the sorted distinct set of document
//! indices touched by any morph of that kind (`indices`), the rest value of
//! each (`source`), and one script per morph whose `indices` point into that
//! set. Vertex, UV and material packs also carry one table per mesh group
//! that maps each set entry to a mesh local index.

use crate::error::{get, Result};
use crate::mesh::MeshCreationInfo;
use crate::types::{
    BoneMorph, ControlPanel, Document, GroupMorph, MaterialMorph, MaterialMorphMethod, MorphKinds,
    UVMorph, Vec2, Vec3, Vec4, VertexMorph,
};
use std::collections::{BTreeSet, HashMap};

/// name of the node morph descriptors are grouped under
pub const EXPRESSION_ROOT_NAME: &str = "Expression";

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MorphKind {
    Group,
    Vertex,
    Bone,
    /// 0 is the primary uv, 1..=4 additional uv
    Uv(usize),
    Material,
    Flip,
    Impulse,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MorphDescriptor {
    pub name: String,
    pub panel: ControlPanel,
    pub kind: MorphKind,
}

/// One morph's contribution, indices are positions in the owning pack's set.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphScript<V> {
    /// index into [`Document::morphs`]
    pub morph_index: usize,
    pub panel: ControlPanel,
    pub indices: Vec<usize>,
    pub values: Vec<V>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupMorphPack {
    /// morph indices
    pub indices: Vec<usize>,
    pub source: Vec<f32>,
    pub scripts: Vec<MorphScript<f32>>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoneMorphParameter {
    pub position: Vec3,
    /// quaternion xyzw
    pub rotation: Vec4,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoneMorphPack {
    pub indices: Vec<usize>,
    pub source: Vec<BoneMorphParameter>,
    pub scripts: Vec<MorphScript<BoneMorphParameter>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VertexMorphPack {
    /// per mesh group, local vertex index of every set entry or `invalid_index`
    pub meshes: Vec<Vec<usize>>,
    /// document vertex count
    pub invalid_index: usize,
    pub indices: Vec<usize>,
    pub source: Vec<Vec3>,
    pub scripts: Vec<MorphScript<Vec3>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UvMorphPack {
    pub channel: usize,
    pub meshes: Vec<Vec<usize>>,
    pub invalid_index: usize,
    pub indices: Vec<usize>,
    pub source: Vec<Vec2>,
    pub scripts: Vec<MorphScript<Vec2>>,
}

/// target of a material morph offset. `All` sorts after every material.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum MaterialTarget {
    Material(usize),
    All,
}

/// where a material set entry lives in one mesh group
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MaterialSlot {
    Submesh(usize),
    All,
    Invalid,
}

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct MaterialMorphParameter {
    pub color: Vec4,
    /// rgb and specularity in alpha
    pub specular: Vec4,
    pub ambient: Vec3,
    pub outline_color: Vec4,
    pub outline_width: f32,
    pub texture_color: Vec4,
    pub sphere_color: Vec4,
    pub toon_color: Vec4,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MaterialMorphValue {
    pub operation: MaterialMorphMethod,
    pub parameter: MaterialMorphParameter,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaterialMorphPack {
    pub meshes: Vec<Vec<MaterialSlot>>,
    pub indices: Vec<MaterialTarget>,
    pub source: Vec<MaterialMorphParameter>,
    pub scripts: Vec<MorphScript<MaterialMorphValue>>,
}

/// Everything the runtime morph controller needs.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphManager {
    /// one per document morph, same order
    pub morphs: Vec<MorphDescriptor>,
    pub group_morph: GroupMorphPack,
    pub bone_morph: BoneMorphPack,
    pub vertex_morph: VertexMorphPack,
    /// `1 + header.additional_uv` packs
    pub uv_morph: Vec<UvMorphPack>,
    pub material_morph: MaterialMorphPack,
}

const WHITE: Vec4 = [1.0; 4];

/// sorted distinct set and its reverse lookup
fn index_set<T: Ord + Copy + std::hash::Hash>(
    items: impl Iterator<Item = T>,
) -> (Vec<T>, HashMap<T, usize>) {
    let indices: Vec<T> = items.collect::<BTreeSet<_>>().into_iter().collect();
    let reverse = indices.iter().enumerate().map(|(i, &x)| (x, i)).collect();
    (indices, reverse)
}

fn vertex_tables(
    indices: &[usize],
    creation_list: &[MeshCreationInfo],
    invalid_index: usize,
) -> Vec<Vec<usize>> {
    creation_list
        .iter()
        .map(|info| {
            indices
                .iter()
                .map(|&v| info.local_index(v).unwrap_or(invalid_index))
                .collect()
        })
        .collect()
}

type Selected<'a, T> = Vec<(usize, ControlPanel, &'a [T])>;

/// `(morph index, panel, offsets)` of every morph `select` accepts
fn morphs_of<'a, T>(
    doc: &'a Document,
    select: fn(&'a MorphKinds) -> Option<&'a [T]>,
) -> Selected<'a, T> {
    doc.morphs
        .iter()
        .enumerate()
        .filter_map(|(i, m)| select(&m.morph_data).map(|o| (i, m.control_panel, o)))
        .collect()
}

fn group_offsets(k: &MorphKinds) -> Option<&[GroupMorph]> {
    match k {
        MorphKinds::Group(v) => Some(v.as_slice()),
        _ => None,
    }
}

fn bone_offsets(k: &MorphKinds) -> Option<&[BoneMorph]> {
    match k {
        MorphKinds::Bone(v) => Some(v.as_slice()),
        _ => None,
    }
}

fn vertex_offsets(k: &MorphKinds) -> Option<&[VertexMorph]> {
    match k {
        MorphKinds::Vertex(v) => Some(v.as_slice()),
        _ => None,
    }
}

fn material_offsets(k: &MorphKinds) -> Option<&[MaterialMorph]> {
    match k {
        MorphKinds::Material(v) => Some(v.as_slice()),
        _ => None,
    }
}

fn scale3(v: Vec3, scale: f32) -> Vec3 {
    [v[0] * scale, v[1] * scale, v[2] * scale]
}

fn create_group_morph(doc: &Document) -> GroupMorphPack {
    let morphs = morphs_of(doc, group_offsets);
    let (indices, reverse) = index_set(morphs.iter().flat_map(|(_, _, o)| o.iter().map(|x| x.index)));
    let scripts = morphs
        .into_iter()
        .map(|(morph_index, panel, offsets)| MorphScript {
            morph_index,
            panel,
            indices: offsets.iter().map(|x| reverse[&x.index]).collect(),
            values: offsets.iter().map(|x| x.morph_factor).collect(),
        })
        .collect();
    GroupMorphPack {
        source: vec![0.0; indices.len()],
        indices,
        scripts,
    }
}

fn create_bone_morph(doc: &Document, scale: f32) -> Result<BoneMorphPack> {
    let morphs = morphs_of(doc, bone_offsets);
    let (indices, reverse) = index_set(morphs.iter().flat_map(|(_, _, o)| o.iter().map(|x| x.index)));
    let source = indices
        .iter()
        .map(|&i| {
            let bone = get(&doc.bones, "bone", i)?;
            let mut position = bone.position;
            if let Some(parent) = bone.parent.and_then(|p| doc.bones.get(p)) {
                for (p, q) in position.iter_mut().zip(parent.position.iter()) {
                    *p -= q;
                }
            }
            Ok(BoneMorphParameter {
                position: scale3(position, scale),
                rotation: [0.0, 0.0, 0.0, 1.0],
            })
        })
        .collect::<Result<_>>()?;
    let scripts = morphs
        .into_iter()
        .map(|(morph_index, panel, offsets)| MorphScript {
            morph_index,
            panel,
            indices: offsets.iter().map(|x| reverse[&x.index]).collect(),
            values: offsets
                .iter()
                .map(|x| BoneMorphParameter {
                    position: scale3(x.translates, scale),
                    rotation: x.rotates,
                })
                .collect(),
        })
        .collect();
    Ok(BoneMorphPack {
        indices,
        source,
        scripts,
    })
}

fn create_vertex_morph(
    doc: &Document,
    creation_list: &[MeshCreationInfo],
    scale: f32,
) -> Result<VertexMorphPack> {
    let morphs = morphs_of(doc, vertex_offsets);
    let (indices, reverse) = index_set(morphs.iter().flat_map(|(_, _, o)| o.iter().map(|x| x.index)));
    let source = indices
        .iter()
        .map(|&i| Ok(scale3(get(&doc.vertices, "vertex", i)?.position, scale)))
        .collect::<Result<_>>()?;
    let scripts = morphs
        .into_iter()
        .map(|(morph_index, panel, offsets)| MorphScript {
            morph_index,
            panel,
            indices: offsets.iter().map(|x| reverse[&x.index]).collect(),
            values: offsets.iter().map(|x| scale3(x.offset, scale)).collect(),
        })
        .collect();
    let invalid_index = doc.vertices.len();
    Ok(VertexMorphPack {
        meshes: vertex_tables(&indices, creation_list, invalid_index),
        invalid_index,
        indices,
        source,
        scripts,
    })
}

fn create_uv_morph(
    doc: &Document,
    creation_list: &[MeshCreationInfo],
    channel: usize,
) -> Result<UvMorphPack> {
    let morphs: Selected<UVMorph> = doc
        .morphs
        .iter()
        .enumerate()
        .filter_map(|(i, m)| match m.morph_data.uv_channel() {
            Some((c, o)) if c == channel => Some((i, m.control_panel, o)),
            _ => None,
        })
        .collect();
    let (indices, reverse) = index_set(morphs.iter().flat_map(|(_, _, o)| o.iter().map(|x| x.index)));
    let source = indices
        .iter()
        .map(|&i| {
            let v = get(&doc.vertices, "vertex", i)?;
            Ok(if channel == 0 {
                v.uv
            } else {
                [v.add_uv[channel - 1][0], v.add_uv[channel - 1][1]]
            })
        })
        .collect::<Result<_>>()?;
    let scripts = morphs
        .into_iter()
        .map(|(morph_index, panel, offsets)| MorphScript {
            morph_index,
            panel,
            indices: offsets.iter().map(|x| reverse[&x.index]).collect(),
            values: offsets.iter().map(|x| [x.offset[0], x.offset[1]]).collect(),
        })
        .collect();
    let invalid_index = doc.vertices.len();
    Ok(UvMorphPack {
        channel,
        meshes: vertex_tables(&indices, creation_list, invalid_index),
        invalid_index,
        indices,
        source,
        scripts,
    })
}

fn material_target(index: Option<usize>) -> MaterialTarget {
    index.map_or(MaterialTarget::All, MaterialTarget::Material)
}

fn create_material_morph(
    doc: &Document,
    creation_list: &[MeshCreationInfo],
) -> Result<MaterialMorphPack> {
    let morphs = morphs_of(doc, material_offsets);
    let (mut indices, mut reverse) = index_set(
        morphs
            .iter()
            .flat_map(|(_, _, o)| o.iter().map(|x| material_target(x.index))),
    );
    let has_all = indices.last() == Some(&MaterialTarget::All);
    if has_all {
        let expanded = (0..doc.materials.len())
            .map(MaterialTarget::Material)
            .chain(std::iter::once(MaterialTarget::All));
        let (i, r) = index_set(expanded);
        indices = i;
        reverse = r;
    }
    let source = indices
        .iter()
        .map(|&t| match t {
            MaterialTarget::Material(i) => {
                let m = get(&doc.materials, "material", i)?;
                let [r, g, b] = m.specular;
                Ok(MaterialMorphParameter {
                    color: m.diffuse,
                    specular: [r, g, b, m.specular_factor],
                    ambient: m.ambient,
                    outline_color: m.edge_color,
                    outline_width: m.edge_size,
                    texture_color: WHITE,
                    sphere_color: WHITE,
                    toon_color: WHITE,
                })
            }
            MaterialTarget::All => Ok(MaterialMorphParameter::default()),
        })
        .collect::<Result<_>>()?;
    let scripts = morphs
        .into_iter()
        .map(|(morph_index, panel, offsets)| MorphScript {
            morph_index,
            panel,
            indices: offsets
                .iter()
                .map(|x| reverse[&material_target(x.index)])
                .collect(),
            values: offsets
                .iter()
                .map(|x| {
                    let [r, g, b] = x.specular;
                    MaterialMorphValue {
                        operation: x.formula,
                        parameter: MaterialMorphParameter {
                            color: x.diffuse,
                            specular: [r, g, b, x.specular_factor],
                            ambient: x.ambient,
                            outline_color: x.edge_color,
                            outline_width: x.edge_size,
                            texture_color: x.texture_factor,
                            sphere_color: x.sphere_texture_factor,
                            toon_color: x.toon_texture_factor,
                        },
                    }
                })
                .collect(),
        })
        .collect();
    let meshes = creation_list
        .iter()
        .map(|info| {
            // a material split into several pieces of one group resolves to its last slot
            let slots: HashMap<usize, usize> = info
                .submeshes
                .iter()
                .enumerate()
                .map(|(k, s)| (s.material_index, k))
                .collect();
            indices
                .iter()
                .map(|t| match t {
                    MaterialTarget::Material(i) => {
                        slots.get(i).map_or(MaterialSlot::Invalid, |&k| MaterialSlot::Submesh(k))
                    }
                    MaterialTarget::All => MaterialSlot::All,
                })
                .collect()
        })
        .collect();
    Ok(MaterialMorphPack {
        meshes,
        indices,
        source,
        scripts,
    })
}

fn morph_kind(data: &MorphKinds) -> MorphKind {
    match data {
        MorphKinds::Group(_) => MorphKind::Group,
        MorphKinds::Vertex(_) => MorphKind::Vertex,
        MorphKinds::Bone(_) => MorphKind::Bone,
        MorphKinds::Material(_) => MorphKind::Material,
        MorphKinds::Flip(_) => MorphKind::Flip,
        MorphKinds::Impulse(_) => MorphKind::Impulse,
        uv => MorphKind::Uv(uv.uv_channel().map_or(0, |(c, _)| c)),
    }
}

/// Build every morph pack against the mesh groups of `creation_list`.
///
/// Group morph cycles are kept as they are; the runtime decides how to
/// evaluate them. Flip and impulse morphs get a descriptor but no pack.
pub fn create_morph(
    doc: &Document,
    creation_list: &[MeshCreationInfo],
    scale: f32,
) -> Result<MorphManager> {
    let morphs = doc
        .morphs
        .iter()
        .map(|m| MorphDescriptor {
            name: m.name.clone(),
            panel: m.control_panel,
            kind: morph_kind(&m.morph_data),
        })
        .collect();
    let uv_morph = (0..=usize::from(doc.header.additional_uv))
        .map(|channel| create_uv_morph(doc, creation_list, channel))
        .collect::<Result<_>>()?;
    let manager = MorphManager {
        morphs,
        group_morph: create_group_morph(doc),
        bone_morph: create_bone_morph(doc, scale)?,
        vertex_morph: create_vertex_morph(doc, creation_list, scale)?,
        uv_morph,
        material_morph: create_material_morph(doc, creation_list)?,
    };
    log::info!(
        "{} morphs, {} morphed vertices",
        manager.morphs.len(),
        manager.vertex_morph.indices.len()
    );
    Ok(manager)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::create_mesh_creation_info_multi;
    use crate::test_util::PmxBuilder;

    fn vertex_morph(name: &str, targets: &[usize]) -> crate::types::Morph {
        PmxBuilder::morph(
            name,
            MorphKinds::Vertex(
                targets
                    .iter()
                    .map(|&index| VertexMorph {
                        index,
                        offset: [0.0, 1.0, 0.0],
                    })
                    .collect(),
            ),
        )
    }

    fn material_morph(index: Option<usize>) -> MaterialMorph {
        MaterialMorph {
            index,
            formula: MaterialMorphMethod::Mul,
            diffuse: [1.0, 1.0, 1.0, 0.0],
            specular: [1.0; 3],
            specular_factor: 1.0,
            ambient: [1.0; 3],
            edge_color: [1.0; 4],
            edge_size: 1.0,
            texture_factor: [1.0; 4],
            sphere_texture_factor: [1.0; 4],
            toon_texture_factor: [1.0; 4],
        }
    }

    #[test]
    fn vertex_morph_indices_are_sorted_and_reverse_mapped() {
        let mut b = PmxBuilder::new().triangle_model();
        b.morphs.push(vertex_morph("a", &[2, 0]));
        b.morphs.push(vertex_morph("b", &[1, 2]));
        let doc = b.document();
        let groups = create_mesh_creation_info_multi(&doc, 65535).unwrap();
        let manager = create_morph(&doc, &groups, 2.0).unwrap();
        let pack = &manager.vertex_morph;
        assert_eq!(pack.indices, vec![0, 1, 2]);
        assert_eq!(pack.source[1], [2.0, 0.0, 0.0]);
        assert_eq!(pack.scripts[0].indices, vec![2, 0]);
        assert_eq!(pack.scripts[1].indices, vec![1, 2]);
        assert_eq!(pack.scripts[0].values[0], [0.0, 2.0, 0.0]);
        assert_eq!(pack.meshes, vec![vec![0, 1, 2]]);
        assert_eq!(manager.morphs[0].kind, MorphKind::Vertex);
    }

    #[test]
    fn vertices_missing_from_a_group_get_the_invalid_marker() {
        let mut b = PmxBuilder::new();
        b.bones.push(PmxBuilder::bone("center", None));
        b.disjoint_triangles("a", 3);
        b.disjoint_triangles("b", 3);
        b.morphs.push(vertex_morph("wave", &[0, 10]));
        let doc = b.document();
        // each material has 9 vertices, so a ceiling of 12 forces two groups
        let groups = create_mesh_creation_info_multi(&doc, 12).unwrap();
        assert_eq!(groups.len(), 2);
        let manager = create_morph(&doc, &groups, 1.0).unwrap();
        let pack = &manager.vertex_morph;
        assert_eq!(pack.invalid_index, doc.vertices.len());
        for (info, table) in groups.iter().zip(pack.meshes.iter()) {
            for (k, &v) in pack.indices.iter().enumerate() {
                match info.local_index(v) {
                    Some(local) => assert_eq!(table[k], local),
                    None => assert_eq!(table[k], doc.vertices.len()),
                }
            }
        }
        assert!(pack.meshes.iter().any(|t| t.contains(&doc.vertices.len())));
    }

    #[test]
    fn material_morph_for_all_expands_to_every_material() {
        let mut b = PmxBuilder::new().triangle_model();
        b.disjoint_triangles("skirt", 1);
        b.morphs.push(PmxBuilder::morph(
            "fade",
            MorphKinds::Material(vec![material_morph(None), material_morph(Some(1))]),
        ));
        let doc = b.document();
        let groups = create_mesh_creation_info_multi(&doc, 65535).unwrap();
        let pack = create_morph(&doc, &groups, 1.0).unwrap().material_morph;
        assert_eq!(
            pack.indices,
            vec![
                MaterialTarget::Material(0),
                MaterialTarget::Material(1),
                MaterialTarget::All
            ]
        );
        assert_eq!(pack.source[2], MaterialMorphParameter::default());
        assert_eq!(pack.source[0].texture_color, [1.0; 4]);
        assert_eq!(pack.scripts[0].indices, vec![2, 1]);
        assert_eq!(
            pack.meshes,
            vec![vec![
                MaterialSlot::Submesh(0),
                MaterialSlot::Submesh(1),
                MaterialSlot::All
            ]]
        );
    }

    #[test]
    fn material_morph_without_all_keeps_sparse_set() {
        let mut b = PmxBuilder::new().triangle_model();
        b.disjoint_triangles("skirt", 1);
        b.morphs.push(PmxBuilder::morph(
            "fade",
            MorphKinds::Material(vec![material_morph(Some(1))]),
        ));
        let doc = b.document();
        let groups = create_mesh_creation_info_multi(&doc, 65535).unwrap();
        let pack = create_morph(&doc, &groups, 1.0).unwrap().material_morph;
        assert_eq!(pack.indices, vec![MaterialTarget::Material(1)]);
        assert_eq!(pack.scripts[0].values[0].operation, MaterialMorphMethod::Mul);
    }

    #[test]
    fn bone_morph_source_is_parent_relative() {
        let mut b = PmxBuilder::new();
        let mut root = PmxBuilder::bone("root", None);
        root.position = [0.0, 1.0, 0.0];
        let mut head = PmxBuilder::bone("head", Some(0));
        head.position = [0.0, 3.0, 0.0];
        b.bones.push(root);
        b.bones.push(head);
        b.morphs.push(PmxBuilder::morph(
            "nod",
            MorphKinds::Bone(vec![BoneMorph {
                index: 1,
                translates: [0.0, 0.0, 1.0],
                rotates: [0.0, 0.0, 0.0, 1.0],
            }]),
        ));
        let pack = create_morph(&b.document(), &[], 0.5).unwrap().bone_morph;
        assert_eq!(pack.indices, vec![1]);
        assert_eq!(pack.source[0].position, [0.0, 1.0, 0.0]);
        assert_eq!(pack.source[0].rotation, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(pack.scripts[0].values[0].position, [0.0, 0.0, 0.5]);
    }

    #[test]
    fn group_and_uv_packs() {
        let mut b = PmxBuilder::new().triangle_model();
        b.additional_uv = 2;
        b.vertices[1].add_uv[1] = [0.5, 0.25, 0.0, 0.0];
        b.morphs.push(vertex_morph("a", &[0]));
        b.morphs.push(PmxBuilder::morph(
            "scroll",
            MorphKinds::UV2(vec![UVMorph {
                index: 1,
                offset: [0.1, 0.2, 0.3, 0.4],
            }]),
        ));
        b.morphs.push(PmxBuilder::morph(
            "combo",
            MorphKinds::Group(vec![
                GroupMorph {
                    index: 1,
                    morph_factor: 0.5,
                },
                GroupMorph {
                    index: 0,
                    morph_factor: 1.0,
                },
            ]),
        ));
        let doc = b.document();
        let groups = create_mesh_creation_info_multi(&doc, 65535).unwrap();
        let manager = create_morph(&doc, &groups, 1.0).unwrap();
        assert_eq!(manager.uv_morph.len(), 3);
        assert!(manager.uv_morph[0].indices.is_empty());
        let uv2 = &manager.uv_morph[2];
        assert_eq!(uv2.indices, vec![1]);
        assert_eq!(uv2.source, vec![[0.5, 0.25]]);
        assert_eq!(uv2.scripts[0].values, vec![[0.1, 0.2]]);
        assert_eq!(manager.morphs[1].kind, MorphKind::Uv(2));

        let group = &manager.group_morph;
        assert_eq!(group.indices, vec![0, 1]);
        assert_eq!(group.source, vec![0.0, 0.0]);
        assert_eq!(group.scripts[0].indices, vec![1, 0]);
        assert_eq!(group.scripts[0].values, vec![0.5, 1.0]);
        assert_eq!(group.scripts[0].morph_index, 2);
    }
}
