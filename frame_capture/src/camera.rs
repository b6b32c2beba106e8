use crate::config::CaptureConfig;
use image_classifier::{Frame, PixelFormat};
use std::path::{Path, PathBuf};
use thiserror::Error;

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open frames directory {0:?}: {1}")]
    OpenFramesDirFailed(PathBuf, std::io::Error),
    #[error("No frames found in {0:?}")]
    NoFrames(PathBuf),
    #[error("Failed to decode frame {0:?}: {1}")]
    DecodeFrameFailed(PathBuf, image::ImageError),
}

/// Replays the images of a directory as an endless stream of RGBA camera
/// frames.
#[derive(Debug)]
pub struct Camera {
    frames: Vec<PathBuf>,
    rotation_degrees: i32,
    next: usize,
}

impl Camera {
    pub fn new(capture_config: &CaptureConfig) -> Result<Self, CameraError> {
        let frames = list_frames(&capture_config.frames_dir)?;
        tracing::info!(
            "Replaying {} frames from {:?}",
            frames.len(),
            capture_config.frames_dir
        );

        Ok(Self {
            frames,
            rotation_degrees: capture_config.rotation_degrees,
            next: 0,
        })
    }

    pub fn capture_frame(&mut self) -> Result<Frame, CameraError> {
        let path = &self.frames[self.next];
        self.next = (self.next + 1) % self.frames.len();

        let image = image::open(path)
            .map_err(|e| CameraError::DecodeFrameFailed(path.clone(), e))?
            .to_rgba8();
        let (width, height) = image.dimensions();

        Ok(Frame::new(
            width,
            height,
            PixelFormat::Rgba8888,
            self.rotation_degrees,
            image.into_raw(),
        ))
    }
}

fn list_frames(frames_dir: &Path) -> Result<Vec<PathBuf>, CameraError> {
    let entries = std::fs::read_dir(frames_dir)
        .map_err(|e| CameraError::OpenFramesDirFailed(frames_dir.to_path_buf(), e))?;

    let mut frames: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    frames.sort();

    if frames.is_empty() {
        return Err(CameraError::NoFrames(frames_dir.to_path_buf()));
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn frames_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "frame-capture-{}-{}",
            std::process::id(),
            name
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn capture_config(frames_dir: PathBuf) -> CaptureConfig {
        CaptureConfig {
            frames_dir,
            rotation_degrees: 90,
            prediction_fps: 5,
            max_consecutive_failures: 5,
        }
    }

    #[test]
    fn test_capture_frame_cycles_through_images() {
        let dir = frames_dir("cycle");
        ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(4, 3, Rgb([255, 0, 0]))
            .save(dir.join("a.png"))
            .unwrap();
        ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(2, 2, Rgb([0, 255, 0]))
            .save(dir.join("b.png"))
            .unwrap();
        std::fs::write(dir.join("notes.txt"), "not a frame").unwrap();

        let mut camera = Camera::new(&capture_config(dir.clone())).unwrap();

        let first = camera.capture_frame().unwrap();
        assert_eq!((first.width, first.height), (4, 3));
        assert_eq!(first.format, PixelFormat::Rgba8888);
        assert_eq!(first.rotation_degrees, 90);
        assert_eq!(first.buffer.len(), 4 * 3 * 4);
        assert_eq!(&first.buffer[..4], &[255, 0, 0, 255]);

        let second = camera.capture_frame().unwrap();
        assert_eq!((second.width, second.height), (2, 2));

        let third = camera.capture_frame().unwrap();
        assert_eq!((third.width, third.height), (4, 3));

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_empty_directory_is_rejected() {
        let dir = frames_dir("empty");

        let result = Camera::new(&capture_config(dir.clone()));

        assert!(matches!(result, Err(CameraError::NoFrames(_))));
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_missing_directory_is_rejected() {
        let dir = std::env::temp_dir().join("frame-capture-does-not-exist");

        let result = Camera::new(&capture_config(dir));

        assert!(matches!(result, Err(CameraError::OpenFramesDirFailed(_, _))));
    }
}
