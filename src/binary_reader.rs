use crate::error::FormatError;
use crate::types::{Encode, IndexKinds, VertexIndexKinds};
use std::convert::TryFrom;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

type ReadResult<T> = Result<T, FormatError>;

macro_rules! read_bin {
    ($F:ident,$T:ty) => {
        pub(crate) fn $F(&mut self) -> ReadResult<$T> {
            let mut buf = [0_u8; std::mem::size_of::<$T>()];
            self.inner.read_exact(&mut buf)?;
            Ok(<$T>::from_le_bytes(buf))
        }
    };
}

macro_rules! read_vec {
    ($F:ident,$N:expr) => {
        pub(crate) fn $F(&mut self) -> ReadResult<[f32; $N]> {
            let mut v = [0.0_f32; $N];
            for e in v.iter_mut() {
                *e = self.read_f32()?;
            }
            Ok(v)
        }
    };
}

/// Little endian cursor over a PMX byte stream.
pub(crate) struct BinaryReader<R> {
    inner: R,
}

impl BinaryReader<BufReader<File>> {
    pub(crate) fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> BinaryReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self { inner }
    }

    pub(crate) fn read_vec(&mut self, n: usize) -> ReadResult<Vec<u8>> {
        let mut v = Vec::new();
        // take() so a corrupt length can not allocate more than the stream holds
        (&mut self.inner).take(n as u64).read_to_end(&mut v)?;
        if v.len() != n {
            return Err(FormatError::Truncated);
        }
        Ok(v)
    }

    /// 4 byte length prefixed text. zero length is an empty string.
    pub(crate) fn read_text_buf(&mut self, encode: Encode) -> ReadResult<String> {
        let length = self.read_i32()?;
        let length = usize::try_from(length).map_err(|_| FormatError::NegativeLength(length))?;
        if length == 0 {
            return Ok(String::new());
        }
        let v = self.read_vec(length)?;
        match encode {
            Encode::UTF8 => String::from_utf8(v).map_err(|_| FormatError::InvalidText),
            Encode::Utf16Le => encoding_rs::UTF_16LE
                .decode_without_bom_handling_and_without_replacement(&v)
                .map(|s| s.into_owned())
                .ok_or(FormatError::InvalidText),
        }
    }

    /// element count of a section
    pub(crate) fn read_count(&mut self) -> ReadResult<usize> {
        let count = self.read_i32()?;
        usize::try_from(count).map_err(|_| FormatError::NegativeLength(count))
    }

    /// vertex indices are unsigned for 1 and 2 byte widths, so they are never absent.
    pub(crate) fn read_vertex_index(&mut self, types: VertexIndexKinds) -> ReadResult<usize> {
        match types {
            VertexIndexKinds::U8 => Ok(usize::from(self.read_u8()?)),
            VertexIndexKinds::U16 => Ok(usize::from(self.read_u16()?)),
            VertexIndexKinds::I32 => {
                let v = self.read_i32()?;
                usize::try_from(v).map_err(|_| FormatError::InvalidIndex(v))
            }
        }
    }

    /// signed index where `-1` in any width means "no reference".
    pub(crate) fn read_sized(&mut self, types: IndexKinds) -> ReadResult<Option<usize>> {
        let v = match types {
            IndexKinds::I8 => i32::from(self.read_i8()?),
            IndexKinds::I16 => i32::from(self.read_i16()?),
            IndexKinds::I32 => self.read_i32()?,
        };
        match v {
            -1 => Ok(None),
            v if v < 0 => Err(FormatError::InvalidIndex(v)),
            v => Ok(Some(v as usize)),
        }
    }

    read_vec!(read_vec4, 4);
    read_vec!(read_vec3, 3);
    read_vec!(read_vec2, 2);
    read_bin!(read_f32, f32);
    read_bin!(read_i32, i32);
    read_bin!(read_i16, i16);
    read_bin!(read_u16, u16);
    read_bin!(read_i8, i8);
    read_bin!(read_u8, u8);

    pub(crate) fn read_magic(&mut self) -> ReadResult<[u8; 4]> {
        let mut buf = [0_u8; 4];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }
}
