//! 帧来源 (FrameSource)
//!
//! 顺序读取帧, 支持回到起点。主循环独占持有, 单线程使用。

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use serde::Deserialize;
use tracing::info;

use crate::error::{FrameError, PreflightError};

/// 支持的图片扩展名
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

/// 一帧图像
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// 自上次回到起点以来的序号 (从0开始)
    pub index: u64,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// 流信息: 分辨率、帧率、总帧数 (已知时)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub fps: Option<f64>,
    pub frame_count: Option<u64>,
}

pub trait FrameSource {
    /// 读取下一帧; `Ok(None)` 表示流结束, `Err` 表示读取失败
    fn read_frame(&mut self) -> Result<Option<Frame>>;

    /// 回到第一帧
    fn rewind(&mut self) -> Result<()>;

    fn info(&self) -> SourceInfo;
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// 列出目录中的图片 (按文件名排序); 单个图片文件返回自身
pub fn list_images(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        return Err(PreflightError::MissingSource(path.to_path_buf()).into());
    }
    if path.is_file() {
        return if is_image_file(path) {
            Ok(vec![path.to_path_buf()])
        } else {
            Err(anyhow!("不支持的输入文件: {}", path.display()))
        };
    }

    let mut images: Vec<PathBuf> = fs::read_dir(path)
        .with_context(|| format!("读取目录失败: {}", path.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_image_file(p))
        .collect();
    images.sort();
    Ok(images)
}

/// 帧序列目录旁的 manifest.json (由 [`ImageSequenceSink`](super::ImageSequenceSink) 写出)
#[derive(Deserialize)]
struct SequenceManifest {
    fps: Option<f64>,
}

/// 图片序列帧源: 目录中的图片按文件名顺序作为视频帧
pub struct ImageSequenceSource {
    dir: PathBuf,
    paths: Vec<PathBuf>,
    cursor: usize,
    info: SourceInfo,
}

impl ImageSequenceSource {
    pub fn open(path: &Path) -> Result<Self> {
        let paths = list_images(path)?;
        let first = paths
            .first()
            .ok_or_else(|| anyhow!("输入目录中没有图片: {}", path.display()))?;
        let (width, height) = image::image_dimensions(first)
            .with_context(|| format!("读取图片尺寸失败: {}", first.display()))?;

        let dir = if path.is_dir() {
            path.to_path_buf()
        } else {
            path.parent().map(Path::to_path_buf).unwrap_or_default()
        };
        let fps = fs::read_to_string(dir.join("manifest.json"))
            .ok()
            .and_then(|json| serde_json::from_str::<SequenceManifest>(&json).ok())
            .and_then(|manifest| manifest.fps);

        let info = SourceInfo {
            width,
            height,
            fps,
            frame_count: Some(paths.len() as u64),
        };
        info!(
            "🎬 打开帧序列 {}: {} 帧, {}x{}",
            dir.display(),
            paths.len(),
            width,
            height
        );
        Ok(Self {
            dir,
            paths,
            cursor: 0,
            info,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FrameSource for ImageSequenceSource {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };
        let index = self.cursor as u64;
        self.cursor += 1;

        let image = image::open(path)
            .map_err(|e| FrameError::Decode {
                index,
                reason: format!("{}: {}", path.display(), e),
            })?
            .to_rgb8();
        Ok(Some(Frame::new(index, image)))
    }

    fn rewind(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }

    fn info(&self) -> SourceInfo {
        self.info
    }
}

/// 内存帧源, 用于测试与合成输入
pub struct MemorySource {
    frames: Vec<RgbImage>,
    cursor: usize,
    fps: Option<f64>,
    fail_at: Option<usize>,
    rewinds: u32,
}

impl MemorySource {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self {
            frames,
            cursor: 0,
            fps: None,
            fail_at: None,
            rewinds: 0,
        }
    }

    /// `count` 帧纯色图像, 第 i 帧的红色通道为 i
    pub fn synthetic(count: usize, width: u32, height: u32) -> Self {
        let frames = (0..count)
            .map(|i| RgbImage::from_pixel(width, height, image::Rgb([i as u8, 64, 128])))
            .collect();
        Self::new(frames)
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = Some(fps);
        self
    }

    /// 读取第 `index` 帧时返回错误 (模拟流中途损坏)
    pub fn with_failure_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    pub fn rewinds(&self) -> u32 {
        self.rewinds
    }
}

impl FrameSource for MemorySource {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        if self.fail_at == Some(self.cursor) {
            return Err(FrameError::Decode {
                index: self.cursor as u64,
                reason: "synthetic read failure".to_string(),
            }
            .into());
        }
        let Some(image) = self.frames.get(self.cursor) else {
            return Ok(None);
        };
        let frame = Frame::new(self.cursor as u64, image.clone());
        self.cursor += 1;
        Ok(Some(frame))
    }

    fn rewind(&mut self) -> Result<()> {
        self.cursor = 0;
        self.rewinds += 1;
        Ok(())
    }

    fn info(&self) -> SourceInfo {
        let (width, height) = self
            .frames
            .first()
            .map_or((0, 0), |img| img.dimensions());
        SourceInfo {
            width,
            height,
            fps: self.fps,
            frame_count: Some(self.frames.len() as u64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_rewind() {
        let mut source = MemorySource::synthetic(3, 4, 4);
        for expected in 0..3 {
            let frame = source.read_frame().unwrap().unwrap();
            assert_eq!(frame.index, expected);
            assert_eq!(frame.image.get_pixel(0, 0)[0], expected as u8);
        }
        assert!(source.read_frame().unwrap().is_none());

        source.rewind().unwrap();
        assert_eq!(source.read_frame().unwrap().unwrap().index, 0);
        assert_eq!(source.rewinds(), 1);
    }

    #[test]
    fn test_memory_source_failure() {
        let mut source = MemorySource::synthetic(3, 4, 4).with_failure_at(1);
        assert!(source.read_frame().unwrap().is_some());
        assert!(source.read_frame().is_err());
    }

    #[test]
    fn test_image_sequence_source_sorted_with_fps() {
        let dir = tempfile::tempdir().unwrap();
        for (name, shade) in [("b.png", 20u8), ("a.png", 10), ("c.png", 30)] {
            RgbImage::from_pixel(6, 4, image::Rgb([shade, 0, 0]))
                .save(dir.path().join(name))
                .unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::write(dir.path().join("manifest.json"), r#"{"fps": 25.0}"#).unwrap();

        let mut source = ImageSequenceSource::open(dir.path()).unwrap();
        let info = source.info();
        assert_eq!((info.width, info.height), (6, 4));
        assert_eq!(info.fps, Some(25.0));
        assert_eq!(info.frame_count, Some(3));

        let shades: Vec<u8> = std::iter::from_fn(|| source.read_frame().unwrap())
            .map(|f| f.image.get_pixel(0, 0)[0])
            .collect();
        assert_eq!(shades, vec![10, 20, 30]);
    }

    #[test]
    fn test_missing_source_is_preflight_error() {
        let err = ImageSequenceSource::open(Path::new("/nonexistent/frames"))
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<PreflightError>(),
            Some(PreflightError::MissingSource(_))
        ));
    }
}
