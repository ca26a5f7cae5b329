//! Sequential binary PPM writer.
//!
//! Each frame becomes one file named `<prefix><index:03>.ppm` holding the
//! header `P6\n<width> <height> 255\n` followed by raw RGB bytes.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while writing output images.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("image has {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Writes numbered PPM files into a directory.
#[derive(Debug)]
pub struct PpmWriter {
    directory: PathBuf,
    prefix: String,
    width: u32,
    height: u32,
    next_index: u64,
}

impl PpmWriter {
    /// Creates a writer, creating `directory` if needed.
    pub fn new(
        directory: impl Into<PathBuf>,
        prefix: impl Into<String>,
        width: u32,
        height: u32,
    ) -> Result<Self, OutputError> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory).map_err(|source| OutputError::CreateDir {
            path: directory.clone(),
            source,
        })?;
        Ok(Self {
            directory,
            prefix: prefix.into(),
            width,
            height,
            next_index: 0,
        })
    }

    /// Path the frame with `index` is written to.
    pub fn path_for(&self, index: u64) -> PathBuf {
        self.directory
            .join(format!("{}{:03}.ppm", self.prefix, index))
    }

    /// Index the next written frame will get.
    #[inline]
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Output directory.
    #[inline]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Writes one RGB24 image as the next file in sequence.
    pub fn write_frame(&mut self, rgb: &[u8]) -> Result<PathBuf, OutputError> {
        let expected = (self.width as usize) * (self.height as usize) * 3;
        if rgb.len() != expected {
            return Err(OutputError::SizeMismatch {
                expected,
                actual: rgb.len(),
            });
        }

        let path = self.path_for(self.next_index);
        self.write_file(&path, rgb)
            .map_err(|source| OutputError::Write {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(path = %path.display(), index = self.next_index, "Wrote frame");
        self.next_index += 1;
        Ok(path)
    }

    fn write_file(&self, path: &Path, rgb: &[u8]) -> std::io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        write!(out, "P6\n{} {} 255\n", self.width, self.height)?;
        out.write_all(rgb)?;
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "motion-filter-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_sequential_names() {
        let dir = scratch_dir("names");
        let writer = PpmWriter::new(&dir, "img", 2, 1).unwrap();

        assert_eq!(writer.path_for(0), dir.join("img000.ppm"));
        assert_eq!(writer.path_for(7), dir.join("img007.ppm"));
        assert_eq!(writer.path_for(1234), dir.join("img1234.ppm"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_write_frame_format() {
        let dir = scratch_dir("format");
        let mut writer = PpmWriter::new(&dir, "img", 2, 1).unwrap();

        let first = writer.write_frame(&[1, 1, 1, 2, 2, 2]).unwrap();
        let second = writer.write_frame(&[3, 3, 3, 4, 4, 4]).unwrap();

        assert_eq!(first, dir.join("img000.ppm"));
        assert_eq!(second, dir.join("img001.ppm"));

        let bytes = std::fs::read(&first).unwrap();
        let mut expected = b"P6\n2 1 255\n".to_vec();
        expected.extend_from_slice(&[1, 1, 1, 2, 2, 2]);
        assert_eq!(bytes, expected);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_rejects_wrong_size() {
        let dir = scratch_dir("size");
        let mut writer = PpmWriter::new(&dir, "img", 2, 2).unwrap();

        assert!(matches!(
            writer.write_frame(&[0; 6]),
            Err(OutputError::SizeMismatch {
                expected: 12,
                actual: 6
            })
        ));
        assert_eq!(writer.next_index(), 0);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
