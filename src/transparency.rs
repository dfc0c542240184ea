//! Per material transparency classification.
//!
//! A material is transparent when its own colors say so, when a multiplying
//! material morph can fade it, or when its main texture has alpha below
//! [`ALPHA_THRESHOLD`] somewhere its triangles can reach.

use crate::error::{Error, Result};
use crate::mesh::create_mesh_creation_info_packs;
use crate::path::texture_path;
use crate::progress::Progress;
use crate::types::{Document, MaterialMorphMethod, MorphKinds, Vec2};
use image::RgbaImage;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// alpha of 253 and above counts as opaque
pub const ALPHA_THRESHOLD: f32 = 253.0 / 255.0;

/// name of the scratch directory created under the work directory
pub const ALPHA_READABLE_TEXTURE_DIRECTORY: &str = "AlphaReadableTextureDirectory.pmx_scene";

/// Texture whose alpha can be sampled.
///
/// Coordinates follow the engine convention: `u` grows to the right, `v = 0`
/// is the bottom row. Sampling wraps around.
pub trait AlphaTexture {
    fn height(&self) -> u32;
    fn alpha_bilinear(&self, u: f32, v: f32) -> f32;
}

impl AlphaTexture for RgbaImage {
    fn height(&self) -> u32 {
        self.dimensions().1
    }

    fn alpha_bilinear(&self, u: f32, v: f32) -> f32 {
        let (w, h) = self.dimensions();
        if w == 0 || h == 0 {
            return 1.0;
        }
        let x = u * w as f32 - 0.5;
        let y = (1.0 - v) * h as f32 - 0.5;
        let (x0, y0) = (x.floor(), y.floor());
        let (fx, fy) = (x - x0, y - y0);
        let alpha = |dx: i64, dy: i64| {
            let px = (x0 as i64 + dx).rem_euclid(i64::from(w)) as u32;
            let py = (y0 as i64 + dy).rem_euclid(i64::from(h)) as u32;
            f32::from(self.get_pixel(px, py)[3]) / 255.0
        };
        let top = alpha(0, 0) * (1.0 - fx) + alpha(1, 0) * fx;
        let bottom = alpha(0, 1) * (1.0 - fx) + alpha(1, 1) * fx;
        top * (1.0 - fy) + bottom * fy
    }
}

/// Materials a multiplying material morph can make see-through.
///
/// A morph targeting every material marks all of them.
pub fn is_transparent_by_material_morph(doc: &Document) -> Vec<bool> {
    let mut result = vec![false; doc.materials.len()];
    let offsets = doc.morphs.iter().filter_map(|m| match &m.morph_data {
        MorphKinds::Material(v) => Some(v),
        _ => None,
    });
    for offset in offsets.flatten() {
        if offset.formula != MaterialMorphMethod::Mul
            || (offset.diffuse[3] >= 1.0 && offset.edge_color[3] >= 1.0)
        {
            continue;
        }
        match offset.index {
            Some(i) if i < result.len() => result[i] = true,
            _ => {
                result.iter_mut().for_each(|t| *t = true);
                break;
            }
        }
    }
    result
}

/// UVs each material's triangles can show, three per triangle.
///
/// Every triangle appears with its rest UVs. For each primary UV morph that
/// touches a triangle, the triangle appears again with the morph fully
/// applied. Partial application and stacked morphs are not considered.
pub fn uv_list(doc: &Document, progress: &mut dyn Progress) -> Result<Vec<Vec<Vec2>>> {
    let packs = create_mesh_creation_info_packs(doc)?;
    let uv_morphs: Vec<(&str, HashMap<usize, Vec2>)> = doc
        .morphs
        .iter()
        .filter_map(|m| match &m.morph_data {
            MorphKinds::UV(v) => Some((
                m.name.as_str(),
                v.iter().map(|o| (o.index, [o.offset[0], o.offset[1]])).collect(),
            )),
            _ => None,
        })
        .collect();
    let uv_of = |i: usize| {
        doc.vertices
            .get(i)
            .map(|v| v.uv)
            .ok_or_else(|| Error::range("vertex", i, doc.vertices.len()))
    };

    let material_count = packs.len();
    let mut result = Vec::with_capacity(material_count);
    for (material_index, pack) in packs.iter().enumerate() {
        let mut uvs = pack
            .indices
            .iter()
            .map(|&i| uv_of(i))
            .collect::<Result<Vec<_>>>()?;
        let used: HashSet<usize> = pack.indices.iter().copied().collect();
        for (morph_index, (name, morph)) in uv_morphs.iter().enumerate() {
            progress.report(
                &format!(
                    "Material:[{}|{}]{}\tUV Morph:[{}|{}]{}",
                    material_index,
                    material_count,
                    doc.materials[material_index].name,
                    morph_index,
                    uv_morphs.len(),
                    name
                ),
                (morph_index as f32 / uv_morphs.len() as f32 + material_index as f32)
                    / material_count as f32,
            );
            if progress.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if !morph.keys().any(|k| used.contains(k)) {
                continue;
            }
            for tri in pack.indices.chunks_exact(3) {
                if !tri.iter().any(|i| morph.contains_key(i)) {
                    continue;
                }
                for &i in tri {
                    let [u, v] = uv_of(i)?;
                    let [du, dv] = morph.get(&i).copied().unwrap_or([0.0, 0.0]);
                    uvs.push([u + du, v + dv]);
                }
            }
        }
        result.push(uvs);
    }
    Ok(result)
}

fn triangle_is_transparent<T: AlphaTexture + ?Sized>(texture: &T, tri: &[Vec2]) -> bool {
    let bias = 1.0 / texture.height().max(1) as f32;
    let p: Vec<Vec2> = tri.iter().map(|&[u, v]| [u, 1.0 - v - bias]).collect();
    let mid = |a: Vec2, b: Vec2| [(a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0];
    let center = [
        (p[0][0] + p[1][0] + p[2][0]) / 3.0,
        (p[0][1] + p[1][1] + p[2][1]) / 3.0,
    ];
    let samples = [
        p[0],
        p[1],
        p[2],
        center,
        mid(p[0], p[1]),
        mid(p[1], p[2]),
        mid(p[2], p[0]),
    ];
    samples
        .iter()
        .any(|&[u, v]| texture.alpha_bilinear(u, v) < ALPHA_THRESHOLD)
}

/// Sample the texture at the corners, the centroid and the edge midpoints of
/// every triangle in `uvs`. Seven points per triangle is an approximation of
/// checking every covered texel.
pub fn is_transparent_by_texture_alpha_with_uv<T: AlphaTexture + ?Sized>(
    texture: &T,
    uvs: &[Vec2],
) -> bool {
    uvs.chunks_exact(3)
        .any(|tri| triangle_is_transparent(texture, tri))
}

/// Decoded copies of the main textures, kept in a scratch directory that is
/// removed when this value is dropped.
pub struct AlphaReadableTextures {
    directory: PathBuf,
    /// per material. `None` when there is no texture or it carries no alpha.
    textures: Vec<Option<RgbaImage>>,
}

impl AlphaReadableTextures {
    /// Copy and decode the main texture of every material.
    ///
    /// `model_dir` is where texture paths are relative to, the scratch
    /// directory is created under `work_dir`.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        doc: &Document,
        model_dir: P,
        work_dir: Q,
    ) -> Result<Self> {
        let directory = work_dir.as_ref().join(ALPHA_READABLE_TEXTURE_DIRECTORY);
        std::fs::create_dir_all(&directory).map_err(|e| Error::resource(&directory, e))?;
        log::debug!("created {}", directory.display());
        // from here on Drop cleans up, also when a copy fails
        let mut result = Self {
            directory,
            textures: vec![],
        };

        let names: Vec<Option<&str>> = doc
            .materials
            .iter()
            .map(|m| {
                m.texture_index
                    .and_then(|i| doc.textures.get(i))
                    .map(String::as_str)
                    .filter(|s| !s.is_empty())
            })
            .collect();
        let mut decoded: HashMap<&str, Option<RgbaImage>> = HashMap::new();
        for name in names.iter().flatten() {
            if decoded.contains_key(name) {
                continue;
            }
            let image = result.copy_and_decode(model_dir.as_ref(), name, decoded.len())?;
            decoded.insert(*name, image);
        }
        result.textures = names
            .iter()
            .map(|n| n.and_then(|n| decoded.get(n).cloned().flatten()))
            .collect();
        Ok(result)
    }

    /// Copies are flat in the scratch directory and named by `index`, the
    /// texture string only picks the source and the extension.
    fn copy_and_decode(
        &self,
        model_dir: &Path,
        name: &str,
        index: usize,
    ) -> Result<Option<RgbaImage>> {
        let src = texture_path(model_dir, name);
        let dst = match src.extension() {
            Some(ext) => self
                .directory
                .join(format!("{}.{}", index, ext.to_string_lossy())),
            None => self.directory.join(index.to_string()),
        };
        std::fs::copy(&src, &dst).map_err(|e| Error::resource(&src, e))?;
        let image = image::open(&dst).map_err(|source| Error::Texture {
            path: dst.clone(),
            source,
        })?;
        if !image.color().has_alpha() {
            log::debug!("{} has no alpha channel", name);
            return Ok(None);
        }
        Ok(Some(image.to_rgba8()))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// main texture of a material, if it can be transparent at all
    pub fn texture(&self, material_index: usize) -> Option<&RgbaImage> {
        self.textures.get(material_index).and_then(Option::as_ref)
    }
}

impl Drop for AlphaReadableTextures {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.directory) {
            Ok(()) => log::debug!("removed {}", self.directory.display()),
            Err(e) => log::warn!("failed to remove {}: {}", self.directory.display(), e),
        }
    }
}

/// Transparency flag of every material, first matching rule wins:
/// diffuse or edge alpha below 1, a fading material morph, then texture alpha
/// sampled along the material's UVs.
pub fn classify_materials(
    doc: &Document,
    textures: Option<&AlphaReadableTextures>,
    progress: &mut dyn Progress,
) -> Result<Vec<bool>> {
    let by_morph = is_transparent_by_material_morph(doc);
    let uvs = match textures {
        Some(_) => uv_list(doc, progress)?,
        None => vec![],
    };
    let result: Vec<bool> = doc
        .materials
        .iter()
        .enumerate()
        .map(|(i, m)| {
            m.diffuse[3] < 1.0
                || m.edge_color[3] < 1.0
                || by_morph[i]
                || textures
                    .and_then(|t| t.texture(i))
                    .map_or(false, |t| is_transparent_by_texture_alpha_with_uv(t, &uvs[i]))
        })
        .collect();
    for (m, t) in doc.materials.iter().zip(&result) {
        if *t {
            log::debug!("material \"{}\" is transparent", m.name);
        }
    }
    Ok(result)
}
