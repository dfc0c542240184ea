//! Skinning weights in the fixed four slot layout of the target skinning API.

use crate::error::{Error, Result};
use crate::types::VertexWeight;

/// four (bone, weight) pairs. unused slots point at bone 0 with weight 0.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
#[cfg_attr(feature = "derive_serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SkinWeight {
    pub bone_indices: [usize; 4],
    pub weights: [f32; 4],
}

/// Fold any of the five weight methods into [`SkinWeight`].
///
/// BDEF1 puts the full weight on slot 0, BDEF2 and SDEF fill slots 0 and 1
/// with the second weight being `1 - weight0`, BDEF4 and QDEF are copied.
/// SDEF correction vectors and the QDEF blending mode are dropped.
///
/// # Errors
/// [`Error::Range`] when a slot carrying weight refers to a bone outside of
/// `0..bone_count`, or to no bone at all.
pub fn convert_bone_weight(weight: &VertexWeight, bone_count: usize) -> Result<SkinWeight> {
    let mut result = SkinWeight::default();
    for (slot, (bone, w)) in weight.slots().iter().enumerate() {
        match *bone {
            Some(bone) if bone < bone_count => {
                result.bone_indices[slot] = bone;
                result.weights[slot] = *w;
            }
            Some(bone) => return Err(Error::range("bone", bone, bone_count)),
            None if *w == 0.0 => {}
            None => return Err(Error::range("bone", bone_count, bone_count)),
        }
    }
    Ok(result)
}
