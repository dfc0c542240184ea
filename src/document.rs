//! Cross reference checks and helpers over a decoded [`Document`].

use crate::error::{Error, Result};
use crate::types::{Document, MorphKinds, Target, ToonMode};
use std::ops::Range;

fn check(kind: &'static str, index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(Error::range(kind, index, len))
    }
}

fn check_opt(kind: &'static str, index: Option<usize>, len: usize) -> Result<()> {
    index.map_or(Ok(()), |i| check(kind, i, len))
}

impl Document {
    /// Index ranges of the shared index buffer owned by each material, in
    /// declaration order.
    ///
    /// # Errors
    /// [`Error::Range`] when the materials claim more indices than exist.
    pub fn material_runs(&self) -> Result<Vec<Range<usize>>> {
        let mut start = 0;
        self.materials
            .iter()
            .map(|m| {
                let end = start + m.num_face_vertices;
                if end > self.indices.len() {
                    return Err(Error::range("face", end, self.indices.len()));
                }
                let run = start..end;
                start = end;
                Ok(run)
            })
            .collect()
    }

    /// Check the face count invariant and every cross reference.
    ///
    /// The decoder only checks that indices fit their declared width; this
    /// checks that they also point inside the arrays they refer to.
    pub fn validate(&self) -> Result<()> {
        let face_total: usize = self.materials.iter().map(|m| m.num_face_vertices).sum();
        if face_total != self.indices.len() {
            return Err(Error::range("face", face_total, self.indices.len()));
        }

        let vertices = self.vertices.len();
        let bones = self.bones.len();
        let textures = self.textures.len();
        let materials = self.materials.len();
        let morphs = self.morphs.len();
        let rigids = self.rigid_bodies.len();

        for &i in &self.indices {
            check("vertex", i, vertices)?;
        }
        for v in &self.vertices {
            for (bone, _) in v.weight_type.slots().iter() {
                check_opt("bone", *bone, bones)?;
            }
        }
        for m in &self.materials {
            check_opt("texture", m.texture_index, textures)?;
            check_opt("texture", m.sphere_mode.and_then(|s| s.index), textures)?;
            if let ToonMode::Separate(t) = m.toon_mode {
                check_opt("texture", t, textures)?;
            }
        }
        for b in &self.bones {
            check_opt("bone", b.parent, bones)?;
            if let Some(append) = b.append {
                check_opt("bone", append.parent, bones)?;
            }
            if let Some(ik) = &b.ik_info {
                check("bone", ik.ik_target_bone_index, bones)?;
                for link in &ik.ik_links {
                    check("bone", link.ik_bone_index, bones)?;
                }
            }
        }
        for m in &self.morphs {
            match &m.morph_data {
                MorphKinds::Group(v) => {
                    for o in v {
                        check("morph", o.index, morphs)?;
                    }
                }
                MorphKinds::Flip(v) => {
                    for o in v {
                        check("morph", o.index, morphs)?;
                    }
                }
                MorphKinds::Vertex(v) => {
                    for o in v {
                        check("vertex", o.index, vertices)?;
                    }
                }
                MorphKinds::Bone(v) => {
                    for o in v {
                        check("bone", o.index, bones)?;
                    }
                }
                MorphKinds::Material(v) => {
                    for o in v {
                        check_opt("material", o.index, materials)?;
                    }
                }
                MorphKinds::Impulse(v) => {
                    for o in v {
                        check("rigid body", o.rigid_index, rigids)?;
                    }
                }
                uv => {
                    if let Some((_, v)) = uv.uv_channel() {
                        for o in v {
                            check("vertex", o.index, vertices)?;
                        }
                    }
                }
            }
        }
        for f in &self.frames {
            for inner in &f.inners {
                match inner.target {
                    Target::Bone => check("bone", inner.index, bones)?,
                    Target::Morph => check("morph", inner.index, morphs)?,
                }
            }
        }
        for r in &self.rigid_bodies {
            check_opt("bone", r.bone_index, bones)?;
        }
        for j in &self.joints {
            check("rigid body", j.a_rigid_index, rigids)?;
            check("rigid body", j.b_rigid_index, rigids)?;
        }
        log::debug!("document \"{}\" is consistent", self.model_info.name);
        Ok(())
    }
}
