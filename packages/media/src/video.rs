//! `ffmpeg`-backed video frame decoder.
//!
//! Stages the uploaded container in a temp directory, samples frames
//! with `ffmpeg`, and loads them back as RGB images in order. Video
//! decoding stays outside the process: the pipeline only ever sees an
//! ordered frame sequence.

use std::path::Path;

use image::RgbImage;
use pothole_map_detect::{DetectError, FrameDecoder};
use tokio::process::Command;

/// Frame decoder shelling out to the system `ffmpeg` binary.
pub struct FfmpegFrameDecoder {
    /// Frames sampled per second of video.
    fps: f64,
}

impl FfmpegFrameDecoder {
    /// Creates a decoder sampling `fps` frames per second.
    #[must_use]
    pub const fn new(fps: f64) -> Self {
        Self { fps }
    }
}

impl Default for FfmpegFrameDecoder {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[async_trait::async_trait]
impl FrameDecoder for FfmpegFrameDecoder {
    async fn frames(&self, data: &[u8], extension: &str) -> Result<Vec<RgbImage>, DetectError> {
        let work_dir = std::env::temp_dir().join(format!(
            "pothole-map-frames-{}",
            uuid::Uuid::new_v4().simple()
        ));
        tokio::fs::create_dir_all(&work_dir).await?;

        let result = extract_frames(&work_dir, data, extension, self.fps).await;

        if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
            log::warn!("Could not clean up frame directory {}: {e}", work_dir.display());
        }

        result
    }
}

async fn extract_frames(
    work_dir: &Path,
    data: &[u8],
    extension: &str,
    fps: f64,
) -> Result<Vec<RgbImage>, DetectError> {
    let input_path = work_dir.join(format!("input.{extension}"));
    tokio::fs::write(&input_path, data).await?;

    let output_pattern = work_dir.join("frame_%05d.jpg");
    let output = Command::new("ffmpeg")
        .arg("-hide_banner")
        .arg("-loglevel")
        .arg("error")
        .arg("-i")
        .arg(&input_path)
        .arg("-vf")
        .arg(format!("fps={fps}"))
        .arg("-q:v")
        .arg("2")
        .arg(&output_pattern)
        .output()
        .await?;

    if !output.status.success() {
        return Err(DetectError::Inference {
            message: format!(
                "ffmpeg exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    let mut frame_paths = Vec::new();
    let mut entries = tokio::fs::read_dir(work_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("frame_") && name.ends_with(".jpg"))
        {
            frame_paths.push(path);
        }
    }
    // ffmpeg numbers frames sequentially; sort by filename to restore order.
    frame_paths.sort();

    let mut frames = Vec::with_capacity(frame_paths.len());
    for path in frame_paths {
        let bytes = tokio::fs::read(&path).await?;
        frames.push(image::load_from_memory(&bytes)?.to_rgb8());
    }

    log::debug!("Extracted {} frames at {fps} fps", frames.len());

    Ok(frames)
}
