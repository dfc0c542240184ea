//! Error types.

use std::path::PathBuf;
use thiserror::Error;

/// Malformed, truncated or unrecognised binary content.
///
/// A dual PMX/PMD loader can treat this as "not a PMX file" and try the
/// legacy parser instead, see [`Error::is_format`].
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("invalid magic number")]
    InvalidMagic,
    #[error("unsupported version {0}")]
    UnsupportedVersion(f32),
    #[error("invalid text encoding {0}")]
    InvalidEncoding(u8),
    #[error("invalid index size {0}")]
    InvalidIndexSize(u8),
    #[error("unexpected end of stream")]
    Truncated,
    #[error("text is not valid for the declared encoding")]
    InvalidText,
    #[error("negative length {0}")]
    NegativeLength(i32),
    #[error("index {0} is outside of its declared width")]
    InvalidIndex(i32),
    #[error("unknown {field} tag {value}")]
    UnknownTag { field: &'static str, value: u32 },
    #[error("io error: {0}")]
    Io(std::io::Error),
}

impl From<std::io::Error> for FormatError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::Truncated
        } else {
            Self::Io(err)
        }
    }
}

impl FormatError {
    pub(crate) fn unknown_tag(field: &'static str, value: impl Into<u32>) -> Self {
        Self::UnknownTag {
            field,
            value: value.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("format error: {0}")]
    Format(#[from] FormatError),
    /// an index resolved outside of its owning array. always document corruption.
    #[error("{kind} index {index} out of range (len {len})")]
    Range {
        kind: &'static str,
        index: usize,
        len: usize,
    },
    #[error("resource error at {}: {source}", path.display())]
    Resource {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("texture error at {}: {source}", path.display())]
    Texture {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("invalid option: {0}")]
    InvalidOption(String),
    #[error("conversion cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn range(kind: &'static str, index: usize, len: usize) -> Self {
        Self::Range { kind, index, len }
    }

    pub(crate) fn resource(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Resource {
            path: path.into(),
            source,
        }
    }

    /// true if the input was not recognised as PMX at all.
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Look up `index` in `slice`, failing with [`Error::Range`].
pub(crate) fn get<'a, T>(slice: &'a [T], kind: &'static str, index: usize) -> Result<&'a T> {
    slice
        .get(index)
        .ok_or_else(|| Error::range(kind, index, slice.len()))
}
