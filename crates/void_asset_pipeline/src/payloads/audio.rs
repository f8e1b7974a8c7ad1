//! Audio clips: opened with rodio to check the stream and packed into
//! `.audio` artifacts.
//! Full decoding to PCM happens in the audio backend.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use rodio::{Decoder, Source};
use serde::{Deserialize, Serialize};
use void_asset::kind::lowercase_extension;
use void_asset::{AssetKind, LoadResult, Loadable};

use crate::artifact::{read_artifact, write_artifact};
use crate::compilable::{Compilable, CompileContext};
use crate::error::{PipelineError, Result};
use crate::payloads::texture::read_source;

/// Source container format
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    Wav,
    Ogg,
    Mp3,
    Flac,
}

impl AudioFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "wav" => Some(Self::Wav),
            "ogg" => Some(Self::Ogg),
            "mp3" => Some(Self::Mp3),
            "flac" => Some(Self::Flac),
            _ => None,
        }
    }
}

/// Compiled audio clip
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioClip {
    pub format: AudioFormat,
    pub sample_rate: u32,
    pub channels: u16,
    pub bytes: Vec<u8>,
}

impl Loadable for AudioClip {
    const KIND: AssetKind = AssetKind::Audio;

    fn load_resource(compiled: &Path, _source: &Path) -> LoadResult<Self> {
        read_artifact(compiled, AssetKind::Audio)
    }
}

/// Compiles audio files into `.audio` artifacts
pub struct AudioCompiler;

impl AudioCompiler {
    pub fn build(&self, source: &Path) -> Result<AudioClip> {
        let format = lowercase_extension(source)
            .as_deref()
            .and_then(AudioFormat::from_extension)
            .ok_or_else(|| PipelineError::UnsupportedExtension(source.to_path_buf()))?;
        let bytes = read_source(source)?;

        // The decoder takes ownership, so open a copy and keep the original bytes
        let decoder = Decoder::new(Cursor::new(bytes.clone()))
            .map_err(|e| PipelineError::decode(source, format!("{:?} stream: {}", format, e)))?;
        let sample_rate = decoder.sample_rate();
        let channels = decoder.channels();
        if sample_rate == 0 || channels == 0 {
            return Err(PipelineError::decode(source, "stream declares no channels or a zero sample rate"));
        }

        log::trace!("{:?}: {:?} {} Hz, {} channels", source, format, sample_rate, channels);
        Ok(AudioClip { format, sample_rate, channels, bytes })
    }
}

impl Compilable for AudioCompiler {
    fn kind(&self) -> AssetKind {
        AssetKind::Audio
    }

    fn compile_to_resource(&self, ctx: &CompileContext<'_>) -> Result<PathBuf> {
        let clip = self.build(ctx.source)?;
        write_artifact(ctx.output, AssetKind::Audio, &clip)?;
        Ok(ctx.output.to_path_buf())
    }
}
