use std::fs;
use std::path::{Path, PathBuf};

use crate::capture::domain::frame_source::FrameSource;
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;

/// Replays a directory of still images as frames, in file-name order.
pub struct ImageSequenceFrameSource {
    paths: Vec<PathBuf>,
    next: usize,
}

impl ImageSequenceFrameSource {
    pub fn open(dir: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let mut paths = fs::read_dir(dir)
            .map_err(|e| format!("Failed to read {}: {e}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image(p))
            .collect::<Vec<_>>();
        paths.sort();

        if paths.is_empty() {
            return Err(format!("No images found in {}", dir.display()).into());
        }
        log::info!("Found {} images in {}", paths.len(), dir.display());

        Ok(Self { paths, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceFrameSource {
    fn read_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        let index = self.next;
        self.next += 1;

        let image = image::open(path)
            .map_err(|e| format!("Failed to decode {}: {e}", path.display()))?
            .to_rgb8();
        Ok(Some(Frame::from_rgb_image(image, index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_png(dir: &Path, name: &str, value: u8) {
        image::RgbImage::from_pixel(4, 3, image::Rgb([value, value, value]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn test_reads_images_in_name_order() {
        let tmp = TempDir::new().unwrap();
        write_png(tmp.path(), "b.png", 20);
        write_png(tmp.path(), "a.png", 10);
        fs::write(tmp.path().join("notes.txt"), "skip me").unwrap();

        let mut source = ImageSequenceFrameSource::open(tmp.path()).unwrap();
        assert_eq!(source.len(), 2);

        let first = source.read_frame().unwrap().unwrap();
        assert_eq!(first.index(), 0);
        assert_eq!((first.width(), first.height()), (4, 3));
        assert_eq!(first.data()[0], 10);

        let second = source.read_frame().unwrap().unwrap();
        assert_eq!(second.index(), 1);
        assert_eq!(second.data()[0], 20);

        assert!(source.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_undecodable_image_is_error_and_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.png"), b"not a png").unwrap();
        write_png(tmp.path(), "b.png", 5);

        let mut source = ImageSequenceFrameSource::open(tmp.path()).unwrap();

        assert!(source.read_frame().is_err());
        assert_eq!(source.read_frame().unwrap().unwrap().index(), 1);
    }

    #[test]
    fn test_empty_directory_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(ImageSequenceFrameSource::open(tmp.path()).is_err());
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        assert!(is_image(Path::new("frame.PNG")));
        assert!(is_image(Path::new("frame.jpeg")));
        assert!(!is_image(Path::new("frame.mp4")));
        assert!(!is_image(Path::new("frame")));
    }
}
