use std::{
    fs, io,
    path::{Path, PathBuf},
};

use image::{Rgba, RgbaImage};
use log::{info, warn};
use thiserror::Error;

use crate::tracking::Direction;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    #[error("camera read failed: {0}")]
    Read(String),
}

/// A live feed of RGBA frames. `Ok(None)` means no frame is ready at this callback.
pub trait FrameSource: Send {
    fn name(&self) -> &str;
    fn next_frame(&mut self) -> Result<Option<RgbaImage>, CameraError>;
    /// Stop the underlying tracks. Called exactly once by [`CameraHandle`].
    fn release(&mut self) {}
}

/// What to open when the camera is enabled.
#[derive(Debug, Clone, PartialEq)]
pub enum CameraSpec {
    Frames(PathBuf),
    Synthetic(SyntheticScene),
}

/// Exclusive handle on a frame source, released on every exit path.
pub struct CameraHandle {
    source: Box<dyn FrameSource>,
    released: bool,
}

impl CameraHandle {
    pub fn acquire(spec: &CameraSpec) -> Result<Self, CameraError> {
        let source: Box<dyn FrameSource> = match spec {
            CameraSpec::Frames(dir) => Box::new(ImageSequenceSource::open(dir)?),
            CameraSpec::Synthetic(scene) => Box::new(SyntheticSource::new(scene.clone())),
        };
        Ok(Self::from_source(source))
    }

    pub fn from_source(source: Box<dyn FrameSource>) -> Self {
        info!("camera acquired: {}", source.name());
        Self {
            source,
            released: false,
        }
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn next_frame(&mut self) -> Result<Option<RgbaImage>, CameraError> {
        if self.released {
            return Err(CameraError::Unavailable("camera already released".into()));
        }
        self.source.next_frame()
    }

    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.source.release();
            info!("camera released: {}", self.source.name());
        }
    }
}

impl Drop for CameraHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Plays back the still images of a directory in file-name order, looping.
pub struct ImageSequenceSource {
    name: String,
    frames: Vec<PathBuf>,
    cursor: usize,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path) -> Result<Self, CameraError> {
        let entries = fs::read_dir(dir).map_err(|err| match err.kind() {
            io::ErrorKind::PermissionDenied => {
                CameraError::PermissionDenied(format!("{}: {err}", dir.display()))
            }
            _ => CameraError::Unavailable(format!("{}: {err}", dir.display())),
        })?;

        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| is_frame_file(path))
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(CameraError::Unavailable(format!(
                "no frames found in {}",
                dir.display()
            )));
        }

        Ok(Self {
            name: format!("frames:{}", dir.display()),
            frames,
            cursor: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            ext == "png" || ext == "jpg" || ext == "jpeg"
        })
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_frame(&mut self) -> Result<Option<RgbaImage>, CameraError> {
        let path = &self.frames[self.cursor];
        self.cursor = (self.cursor + 1) % self.frames.len();

        match image::open(path) {
            Ok(img) => Ok(Some(img.to_rgba8())),
            Err(image::ImageError::IoError(err))
                if err.kind() == io::ErrorKind::PermissionDenied =>
            {
                Err(CameraError::PermissionDenied(format!("{}: {err}", path.display())))
            }
            Err(err) => {
                // An undecodable frame is just a dropped frame.
                warn!("skipping unreadable frame {}: {err}", path.display());
                Ok(None)
            }
        }
    }
}

/// A generated face-like scene: three vertical bands whose brightness depends on gaze.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticScene {
    pub gaze: Direction,
    pub width: u32,
    pub height: u32,
    /// Darken one frame in every N to provoke a blink.
    pub blink_every: Option<u32>,
}

impl SyntheticScene {
    pub fn looking(gaze: Direction) -> Self {
        Self {
            gaze,
            width: 160,
            height: 120,
            blink_every: None,
        }
    }

    fn levels(&self) -> [u8; 3] {
        match self.gaze {
            Direction::Left => [120, 90, 80],
            Direction::Center => [80, 110, 80],
            Direction::Right => [80, 90, 120],
        }
    }
}

pub struct SyntheticSource {
    scene: SyntheticScene,
    produced: u64,
}

impl SyntheticSource {
    pub fn new(scene: SyntheticScene) -> Self {
        Self { scene, produced: 0 }
    }

    pub fn set_gaze(&mut self, gaze: Direction) {
        self.scene.gaze = gaze;
    }

    pub fn render(&self, dim: bool) -> RgbaImage {
        let [left, center, right] = self.scene.levels();
        let width = self.scene.width.max(1);
        RgbaImage::from_fn(width, self.scene.height.max(1), |x, _| {
            let fx = f64::from(x) / f64::from(width);
            let level = if fx < 1.0 / 3.0 {
                left
            } else if fx < 2.0 / 3.0 {
                center
            } else {
                right
            };
            let level = if dim { level / 2 } else { level };
            Rgba([level, level, level, 255])
        })
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn next_frame(&mut self) -> Result<Option<RgbaImage>, CameraError> {
        self.produced += 1;
        let dim = self
            .scene
            .blink_every
            .map(|every| every > 0 && self.produced % u64::from(every) == 0)
            .unwrap_or(false);
        Ok(Some(self.render(dim)))
    }
}
