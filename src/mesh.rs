//! Mesh group partitioning and per group geometry.
//!
//! A material's triangle run is one [`Submesh`]. Runs whose distinct vertex
//! count reaches the per mesh ceiling are split, and the resulting pieces are
//! packed into [`MeshCreationInfo`] groups that share one vertex buffer.

use crate::error::{get, Error, Result};
use crate::types::{Document, Vec2, Vec3, Vec4};
use crate::weight::{convert_bone_weight, SkinWeight};
use std::collections::{HashMap, HashSet};

/// 16 bit index buffers reserve `u16::MAX`.
pub const MAX_VERTEX_COUNT_IN_MESH: usize = 65535;

fn unique_count(indices: &[usize]) -> usize {
    indices.iter().collect::<HashSet<_>>().len()
}

/// triangle run of one material
#[derive(Debug, Clone, PartialEq)]
pub struct Submesh {
    pub material_index: usize,
    /// document vertex indices, three per triangle
    pub indices: Vec<usize>,
    pub unique_vertex_count: usize,
}

impl Submesh {
    pub fn new(material_index: usize, indices: Vec<usize>) -> Self {
        let unique_vertex_count = unique_count(&indices);
        Self {
            material_index,
            indices,
            unique_vertex_count,
        }
    }

    /// Split into pieces whose distinct vertex count is below `max_vertex_count`.
    ///
    /// Each piece grows by the number of triangles that certainly fit in the
    /// remaining budget plus one, then gives back whole triangles until it
    /// fits again. A run that already fits is returned as is. Pieces are
    /// never empty; below a ceiling of 4 every piece is a single triangle.
    pub fn split(self, max_vertex_count: usize) -> Vec<Submesh> {
        if self.unique_vertex_count < max_vertex_count {
            return vec![self];
        }
        let plane_end = self.indices.len();
        let mut plane_start = 0;
        let mut result = vec![];
        while plane_start < plane_end {
            let remain = plane_end - plane_start;
            let mut plane_count = 0;
            let mut vertex_count = 0;
            loop {
                plane_count = (plane_count + (max_vertex_count - vertex_count) / 3 * 3 + 3).min(remain);
                vertex_count = unique_count(&self.indices[plane_start..plane_start + plane_count]);
                if max_vertex_count <= vertex_count {
                    // a lone triangle is kept even when it does not fit
                    while max_vertex_count <= vertex_count && plane_count > 3 {
                        plane_count -= 3;
                        vertex_count =
                            unique_count(&self.indices[plane_start..plane_start + plane_count]);
                    }
                    break;
                }
                if plane_count == remain {
                    break;
                }
            }
            result.push(Submesh::new(
                self.material_index,
                self.indices[plane_start..plane_start + plane_count].to_vec(),
            ));
            plane_start += plane_count;
        }
        log::debug!(
            "material {} split into {} pieces",
            self.material_index,
            result.len()
        );
        result
    }
}

/// One mesh group: submeshes sharing a vertex buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshCreationInfo {
    /// ascending material order
    pub submeshes: Vec<Submesh>,
    /// sorted distinct document vertex indices used by this group
    pub all_vertices: Vec<usize>,
    /// document vertex index to position in `all_vertices`
    pub reassign_dictionary: HashMap<usize, usize>,
}

impl MeshCreationInfo {
    fn from_submeshes(mut submeshes: Vec<Submesh>) -> Self {
        submeshes.sort_by_key(|s| s.material_index);
        let mut all_vertices: Vec<usize> = submeshes
            .iter()
            .flat_map(|s| s.indices.iter().copied())
            .collect();
        all_vertices.sort_unstable();
        all_vertices.dedup();
        let reassign_dictionary = all_vertices
            .iter()
            .enumerate()
            .map(|(local, &original)| (original, local))
            .collect();
        Self {
            submeshes,
            all_vertices,
            reassign_dictionary,
        }
    }

    /// material index of every submesh slot
    pub fn material_slots(&self) -> Vec<usize> {
        self.submeshes.iter().map(|s| s.material_index).collect()
    }

    /// local index of a document vertex, if this group uses it
    pub fn local_index(&self, vertex: usize) -> Option<usize> {
        self.reassign_dictionary.get(&vertex).copied()
    }
}

/// One [`Submesh`] per material, cut from the shared index buffer.
pub fn create_mesh_creation_info_packs(doc: &Document) -> Result<Vec<Submesh>> {
    Ok(doc
        .material_runs()?
        .into_iter()
        .enumerate()
        .map(|(i, run)| Submesh::new(i, doc.indices[run].to_vec()))
        .collect())
}

/// Partition the document into mesh groups below `max_vertex_count`.
///
/// Pieces are packed largest first; a group takes pieces while the running
/// distinct vertex sum stays below the ceiling. A document without materials
/// yields no groups.
pub fn create_mesh_creation_info_multi(
    doc: &Document,
    max_vertex_count: usize,
) -> Result<Vec<MeshCreationInfo>> {
    if max_vertex_count < 4 {
        return Err(Error::InvalidOption(format!(
            "max vertex count must be at least 4, got {}",
            max_vertex_count
        )));
    }
    let mut packs: Vec<Submesh> = create_mesh_creation_info_packs(doc)?
        .into_iter()
        .flat_map(|pack| pack.split(max_vertex_count))
        .collect();
    packs.sort_by(|a, b| b.unique_vertex_count.cmp(&a.unique_vertex_count));

    let mut result = vec![];
    let mut rest = packs.into_iter().peekable();
    while rest.peek().is_some() {
        let mut vertex_sum = 0;
        let mut group = vec![];
        while let Some(next) = rest.peek() {
            if !group.is_empty() && vertex_sum + next.unique_vertex_count >= max_vertex_count {
                break;
            }
            vertex_sum += next.unique_vertex_count;
            if let Some(next) = rest.next() {
                group.push(next);
            }
        }
        result.push(MeshCreationInfo::from_submeshes(group));
    }
    log::info!("{} mesh groups", result.len());
    Ok(result)
}

/// Vertex attributes and remapped triangles of one mesh group.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshGeometry {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uv: Vec<Vec2>,
    /// xy of the first additional uv, when the document has one
    pub uv2: Option<Vec<Vec2>>,
    /// edge magnification `* 0.25` in alpha, so 0..8 fits a unorm channel
    pub colors: Vec<Vec4>,
    pub skin_weights: Vec<SkinWeight>,
    /// per submesh slot, local vertex indices
    pub triangles: Vec<Vec<usize>>,
    pub material_slots: Vec<usize>,
}

impl MeshGeometry {
    pub fn build(info: &MeshCreationInfo, doc: &Document, scale: f32) -> Result<Self> {
        let vertices = info
            .all_vertices
            .iter()
            .map(|&i| get(&doc.vertices, "vertex", i))
            .collect::<Result<Vec<_>>>()?;
        let bone_count = doc.bones.len();
        let triangles = info
            .submeshes
            .iter()
            .map(|s| {
                s.indices
                    .iter()
                    .map(|&x| {
                        info.local_index(x)
                            .ok_or_else(|| Error::range("vertex", x, info.all_vertices.len()))
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            positions: vertices
                .iter()
                .map(|v| {
                    let [x, y, z] = v.position;
                    [x * scale, y * scale, z * scale]
                })
                .collect(),
            normals: vertices.iter().map(|v| v.norm).collect(),
            uv: vertices.iter().map(|v| v.uv).collect(),
            uv2: if doc.header.additional_uv > 0 {
                Some(
                    vertices
                        .iter()
                        .map(|v| [v.add_uv[0][0], v.add_uv[0][1]])
                        .collect(),
                )
            } else {
                None
            },
            colors: vertices
                .iter()
                .map(|v| [0.0, 0.0, 0.0, v.edge_mag * 0.25])
                .collect(),
            skin_weights: vertices
                .iter()
                .map(|v| convert_bone_weight(&v.weight_type, bone_count))
                .collect::<Result<_>>()?,
            triangles,
            material_slots: info.material_slots(),
        })
    }
}
