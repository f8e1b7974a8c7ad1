//! Fonts: TrueType/OpenType files packed into `.font` artifacts.
//! The runtime resource is instantiated per pixel size.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use void_asset::{AssetKind, LoadError, LoadResult, SizedLoadable};

use crate::artifact::{read_artifact, write_artifact};
use crate::compilable::{Compilable, CompileContext};
use crate::error::{PipelineError, Result};
use crate::payloads::texture::read_source;

const SFNT_TRUETYPE: [u8; 4] = [0x00, 0x01, 0x00, 0x00];
const SFNT_APPLE: [u8; 4] = *b"true";
const SFNT_CFF: [u8; 4] = *b"OTTO";

/// Validated font file contents
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontData {
    pub bytes: Vec<u8>,
    pub num_tables: u16,
    /// Table tags in file order
    pub tables: Vec<String>,
}

impl FontData {
    /// Parse the sfnt table directory
    pub fn parse(bytes: Vec<u8>) -> std::result::Result<Self, String> {
        if bytes.len() < 12 {
            return Err(format!("{} bytes is too short for an sfnt header", bytes.len()));
        }
        let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if magic != SFNT_TRUETYPE && magic != SFNT_APPLE && magic != SFNT_CFF {
            return Err(format!("unknown sfnt version {:02x?}", magic));
        }

        let num_tables = u16::from_be_bytes([bytes[4], bytes[5]]);
        if num_tables == 0 {
            return Err("font has no tables".to_string());
        }

        let directory_end = 12 + num_tables as usize * 16;
        if bytes.len() < directory_end {
            return Err(format!("table directory of {} entries is truncated", num_tables));
        }

        let tables = bytes[12..directory_end]
            .chunks_exact(16)
            .map(|record| String::from_utf8_lossy(&record[..4]).into_owned())
            .collect();

        Ok(Self { bytes, num_tables, tables })
    }

    pub fn has_table(&self, tag: &str) -> bool {
        self.tables.iter().any(|t| t == tag)
    }
}

/// A font face at one pixel size
#[derive(Clone, Debug)]
pub struct Font {
    pub pixel_size: u32,
    /// Shared between every size of the same face
    pub data: Arc<FontData>,
}

impl Font {
    /// Nominal line height for this size
    pub fn line_height(&self) -> u32 {
        // Matches the 1.2 leading most engines default to
        (self.pixel_size * 6 + 4) / 5
    }
}

impl SizedLoadable for Font {
    const KIND: AssetKind = AssetKind::Font;

    fn load_sized(compiled: &Path, _source: &Path, size: u32) -> LoadResult<Self> {
        if size == 0 {
            return Err(LoadError::UnsupportedFormat("font size must be non-zero".to_string()));
        }
        let data: FontData = read_artifact(compiled, AssetKind::Font)?;
        Ok(Self {
            pixel_size: size,
            data: Arc::new(data),
        })
    }
}

/// Compiles font files into `.font` artifacts
pub struct FontCompiler;

impl FontCompiler {
    pub fn build(&self, source: &Path) -> Result<FontData> {
        let bytes = read_source(source)?;
        FontData::parse(bytes).map_err(|reason| PipelineError::decode(source, reason))
    }
}

impl Compilable for FontCompiler {
    fn kind(&self) -> AssetKind {
        AssetKind::Font
    }

    fn compile_to_resource(&self, ctx: &CompileContext<'_>) -> Result<PathBuf> {
        let data = self.build(ctx.source)?;
        write_artifact(ctx.output, AssetKind::Font, &data)?;
        Ok(ctx.output.to_path_buf())
    }
}
