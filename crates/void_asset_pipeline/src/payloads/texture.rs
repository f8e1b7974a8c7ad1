//! Textures: PNG/JPG/BMP sources compiled to uncompressed RGBA DDS

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bytemuck::{Pod, Zeroable};
use image::{DynamicImage, GenericImageView};
use void_asset::{
    AssetKind, AssetMeta, ImportSettings, LoadError, LoadResult, Loadable, TextureImport,
};

use crate::artifact::write_bytes;
use crate::compilable::{Compilable, CompileContext};
use crate::error::{PipelineError, Result};

const DDS_MAGIC: [u8; 4] = *b"DDS ";

const DDSD_CAPS: u32 = 0x1;
const DDSD_HEIGHT: u32 = 0x2;
const DDSD_WIDTH: u32 = 0x4;
const DDSD_PITCH: u32 = 0x8;
const DDSD_PIXELFORMAT: u32 = 0x1000;
const DDSD_MIPMAPCOUNT: u32 = 0x20000;

const DDPF_ALPHAPIXELS: u32 = 0x1;
const DDPF_RGB: u32 = 0x40;

const DDSCAPS_COMPLEX: u32 = 0x8;
const DDSCAPS_TEXTURE: u32 = 0x1000;
const DDSCAPS_MIPMAP: u32 = 0x40_0000;

// Byte order R, G, B, A in memory
const RGBA_MASKS: [u32; 4] = [0x0000_00ff, 0x0000_ff00, 0x00ff_0000, 0xff00_0000];

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct DdsPixelFormat {
    size: u32,
    flags: u32,
    four_cc: u32,
    rgb_bit_count: u32,
    r_mask: u32,
    g_mask: u32,
    b_mask: u32,
    a_mask: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct DdsHeader {
    size: u32,
    flags: u32,
    height: u32,
    width: u32,
    pitch_or_linear_size: u32,
    depth: u32,
    mip_map_count: u32,
    reserved1: [u32; 11],
    pixel_format: DdsPixelFormat,
    caps: u32,
    caps2: u32,
    caps3: u32,
    caps4: u32,
    reserved2: u32,
}

const HEADER_LEN: usize = std::mem::size_of::<DdsHeader>();

/// Decoded texture: RGBA8 mip chain, level 0 first
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub levels: Vec<Vec<u8>>,
}

impl Texture {
    /// Base level pixels
    pub fn pixels(&self) -> &[u8] {
        self.levels.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn mip_count(&self) -> usize {
        self.levels.len()
    }

    /// RGBA of one base-level pixel
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.pixels().get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Serialize as an uncompressed 32-bit RGBA DDS
    pub fn encode_dds(&self) -> Vec<u8> {
        let mip_count = self.levels.len().max(1) as u32;
        let mut flags = DDSD_CAPS | DDSD_HEIGHT | DDSD_WIDTH | DDSD_PITCH | DDSD_PIXELFORMAT;
        let mut caps = DDSCAPS_TEXTURE;
        if mip_count > 1 {
            flags |= DDSD_MIPMAPCOUNT;
            caps |= DDSCAPS_COMPLEX | DDSCAPS_MIPMAP;
        }

        let header = DdsHeader {
            size: HEADER_LEN as u32,
            flags,
            height: self.height,
            width: self.width,
            pitch_or_linear_size: self.width * 4,
            mip_map_count: mip_count,
            pixel_format: DdsPixelFormat {
                size: std::mem::size_of::<DdsPixelFormat>() as u32,
                flags: DDPF_RGB | DDPF_ALPHAPIXELS,
                rgb_bit_count: 32,
                r_mask: RGBA_MASKS[0],
                g_mask: RGBA_MASKS[1],
                b_mask: RGBA_MASKS[2],
                a_mask: RGBA_MASKS[3],
                ..DdsPixelFormat::zeroed()
            },
            caps,
            ..DdsHeader::zeroed()
        };

        let data_len: usize = self.levels.iter().map(Vec::len).sum();
        let mut bytes = Vec::with_capacity(4 + HEADER_LEN + data_len);
        bytes.extend_from_slice(&DDS_MAGIC);
        bytes.extend_from_slice(bytemuck::bytes_of(&header));
        for level in &self.levels {
            bytes.extend_from_slice(level);
        }
        bytes
    }

    /// Parse a DDS written by [`Texture::encode_dds`]
    pub fn decode_dds(bytes: &[u8], path: &Path) -> LoadResult<Self> {
        if bytes.len() < 4 + HEADER_LEN || bytes[..4] != DDS_MAGIC {
            return Err(LoadError::corrupt(path, "not a DDS file"));
        }

        let header: DdsHeader = bytemuck::pod_read_unaligned(&bytes[4..4 + HEADER_LEN]);
        let pf = header.pixel_format;
        if header.size as usize != HEADER_LEN
            || pf.flags & DDPF_RGB == 0
            || pf.rgb_bit_count != 32
            || [pf.r_mask, pf.g_mask, pf.b_mask, pf.a_mask] != RGBA_MASKS
        {
            return Err(LoadError::UnsupportedFormat(format!(
                "{:?}: only uncompressed RGBA8 DDS is supported",
                path
            )));
        }

        let mut levels = Vec::new();
        let mut offset = 4 + HEADER_LEN;
        let (mut w, mut h) = (header.width.max(1), header.height.max(1));
        for _ in 0..header.mip_map_count.max(1) {
            let len = (w as usize) * (h as usize) * 4;
            let level = bytes
                .get(offset..offset + len)
                .ok_or_else(|| LoadError::corrupt(path, "truncated mip level"))?;
            levels.push(level.to_vec());
            offset += len;
            w = (w / 2).max(1);
            h = (h / 2).max(1);
        }

        Ok(Self {
            width: header.width,
            height: header.height,
            levels,
        })
    }
}

impl Loadable for Texture {
    const KIND: AssetKind = AssetKind::Texture;

    fn load_resource(compiled: &Path, _source: &Path) -> LoadResult<Self> {
        let bytes = fs::read(compiled).map_err(|e| LoadError::from_io(compiled, e))?;
        Self::decode_dds(&bytes, compiled)
    }
}

/// Compiles images into DDS textures
pub struct TextureCompiler {
    import: TextureImport,
}

impl TextureCompiler {
    pub fn new(import: TextureImport) -> Self {
        Self { import }
    }

    /// Decode, validate and convert a source image
    pub fn build(&self, source: &Path) -> Result<Texture> {
        let data = read_source(source)?;
        let img = image::load_from_memory(&data).map_err(|e| PipelineError::decode(source, e))?;

        match img.color().channel_count() {
            1 | 3 | 4 => {}
            n => {
                return Err(PipelineError::unsupported(
                    source,
                    format!("unsupported texture channel count {}", n),
                ))
            }
        }

        let img = if self.import.flip_uvs { img.flipv() } else { img };
        let (width, height) = img.dimensions();

        let mut levels = vec![img.to_rgba8().into_raw()];
        if self.import.generate_mipmaps {
            levels.extend(Self::generate_mip_chain(&img));
        }

        Ok(Texture { width, height, levels })
    }

    /// Generate mipmap chain from image
    fn generate_mip_chain(img: &DynamicImage) -> Vec<Vec<u8>> {
        let mut mips = Vec::new();
        let (mut w, mut h) = img.dimensions();
        let mut current = img.clone();

        while w > 1 || h > 1 {
            w = (w / 2).max(1);
            h = (h / 2).max(1);

            current = current.resize_exact(w, h, image::imageops::FilterType::Lanczos3);
            mips.push(current.to_rgba8().into_raw());
        }

        mips
    }
}

impl Compilable for TextureCompiler {
    fn kind(&self) -> AssetKind {
        AssetKind::Texture
    }

    fn compile_to_resource(&self, ctx: &CompileContext<'_>) -> Result<PathBuf> {
        let texture = self.build(ctx.source)?;
        write_bytes(ctx.output, &texture.encode_dds())?;
        log::debug!(
            "Texture {:?}: {}x{}, {} mips, slot {}",
            ctx.source,
            texture.width,
            texture.height,
            texture.mip_count(),
            self.import.slot
        );
        Ok(ctx.output.to_path_buf())
    }

    fn extend_meta(&self, meta: &mut AssetMeta) {
        meta.import = ImportSettings::Texture(self.import.clone());
    }
}

pub(crate) fn read_source(source: &Path) -> Result<Vec<u8>> {
    fs::read(source).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => PipelineError::SourceMissing(source.to_path_buf()),
        _ => PipelineError::io(source, e),
    })
}
