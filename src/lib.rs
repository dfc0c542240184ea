//! PMX model decoder and engine agnostic scene conversion.
//!
//! ```no_run
//! use pmx_scene::{convert, ConvertOptions, Document, NoProgress};
//!
//! let doc = Document::open("/path/to/model.pmx")?;
//! let model = convert(&doc, &ConvertOptions::default(), None, &mut NoProgress)?;
//! println!("{} mesh groups", model.meshes.len());
//! # Ok::<(), pmx_scene::Error>(())
//! ```
//!
//! The staged reader in [`reader`] can also be driven section by section:
//!
//! ```no_run
//! use pmx_scene::reader::ModelInfoStage;
//!
//! let stage = ModelInfoStage::open("/path/to/model.pmx")?;
//! let (model_info, vertices_stage) = stage.read()?;
//! let (vertices, _faces_stage) = vertices_stage.read()?;
//! # Ok::<(), pmx_scene::Error>(())
//! ```

mod binary_reader;
pub mod bone;
pub mod convert;
pub mod document;
pub mod error;
pub mod mesh;
pub mod morph;
pub mod path;
pub mod physics;
pub mod progress;
pub mod reader;
pub mod transparency;
pub mod types;
pub mod weight;

#[cfg(test)]
mod test_util;

pub use convert::{convert, AnimationType, ConvertOptions, ConvertedModel, ShaderType};
pub use error::{Error, FormatError, Result};
pub use progress::{LogProgress, NoProgress, Progress};
pub use reader::read_header;
pub use transparency::AlphaReadableTextures;
pub use types::Document;
