//! Transcoding capability.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Target encoding parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeProfile {
    /// Output height; width follows the source aspect ratio
    #[serde(default = "default_target_height")]
    pub target_height: u32,

    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    /// Encoding preset (e.g., "fast", "medium", "slow")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Audio codec; "copy" passes the source track through
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
}

fn default_target_height() -> u32 {
    1080
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_preset() -> String {
    "medium".to_string()
}

fn default_crf() -> u8 {
    23
}

fn default_audio_codec() -> String {
    "copy".to_string()
}

impl Default for TranscodeProfile {
    fn default() -> Self {
        Self::hd_1080()
    }
}

impl TranscodeProfile {
    /// Constrain height to 1080, proportional width.
    pub fn hd_1080() -> Self {
        Self {
            target_height: default_target_height(),
            video_codec: default_video_codec(),
            preset: default_preset(),
            crf: default_crf(),
            audio_codec: default_audio_codec(),
        }
    }

    /// Scale filter for this profile.
    ///
    /// `-2` keeps the aspect ratio and rounds the width to an even number,
    /// which yuv420p encoders require.
    pub fn scale_filter(&self) -> String {
        format!("scale=-2:{}", self.target_height)
    }

    /// Build the FFmpeg command for this profile.
    pub fn command(&self, input: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(input, output)
            .video_filter(self.scale_filter())
            .video_codec(&self.video_codec)
            .preset(&self.preset)
            .crf(self.crf)
            .audio_codec(&self.audio_codec)
    }
}

/// Turns a local input file into a local output file.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Transcode `input` into `output`.
    ///
    /// An error means whatever sits at `output` must not be trusted.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        profile: &TranscodeProfile,
    ) -> MediaResult<()>;
}

/// `Transcoder` backed by the FFmpeg CLI.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTranscoder {
    runner: FfmpegRunner,
}

impl FfmpegTranscoder {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        profile: &TranscodeProfile,
    ) -> MediaResult<()> {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let cmd = profile.command(input, output);

        if let Err(e) = self.runner.run(&cmd).await {
            warn!(
                input = %input.display(),
                diagnostic = e.diagnostic().unwrap_or(""),
                "Transcode failed: {}",
                e
            );
            return Err(e);
        }

        if !tokio::fs::try_exists(output).await? {
            return Err(MediaError::FileNotFound(output.to_path_buf()));
        }

        info!(
            input = %input.display(),
            output = %output.display(),
            height = profile.target_height,
            "Video processed successfully"
        );
        Ok(())
    }
}
