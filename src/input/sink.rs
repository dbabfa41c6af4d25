//! 输出 (FrameSink)
//!
//! 标注后的帧逐帧写出。每帧是独立的图片文件, 先写临时文件再改名,
//! 中途中断时已写出的帧保持完整。

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::source::SourceInfo;

pub trait FrameSink {
    fn write_frame(&mut self, image: &RgbImage) -> Result<()>;

    /// 刷新并关闭输出; `complete` 为 false 表示中途中断
    fn finish(&mut self, complete: bool) -> Result<()>;

    fn frames_written(&self) -> u64;
}

/// 输出目录中的 manifest.json
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SinkManifest {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frames: u64,
    /// 帧文件命名规则
    pub pattern: String,
    /// 正常结束为 true; 中断后保留 false
    pub complete: bool,
}

const FRAME_PATTERN: &str = "frame_%06d.png";

/// 图片序列输出, 分辨率与帧率沿用输入
pub struct ImageSequenceSink {
    dir: PathBuf,
    manifest: SinkManifest,
    finished: bool,
}

impl ImageSequenceSink {
    pub fn create(dir: &Path, info: &SourceInfo, fps: f64) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("创建输出目录失败: {}", dir.display()))?;
        let removed = remove_stale_frames(dir)?;
        if removed > 0 {
            warn!("🧹 清除输出目录中上次留下的 {} 个帧文件", removed);
        }
        let sink = Self {
            dir: dir.to_path_buf(),
            manifest: SinkManifest {
                width: info.width,
                height: info.height,
                fps,
                frames: 0,
                pattern: FRAME_PATTERN.to_string(),
                complete: false,
            },
            finished: false,
        };
        sink.write_manifest()?;
        info!(
            "💾 输出目录 {} ({}x{} @ {:.2} fps)",
            dir.display(),
            info.width,
            info.height,
            fps
        );
        Ok(sink)
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame_{:06}.png", index))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest(&self) -> &SinkManifest {
        &self.manifest
    }

    fn write_manifest(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.manifest)?;
        let path = self.dir.join("manifest.json");
        fs::write(&path, json).with_context(|| format!("写入清单失败: {}", path.display()))
    }
}

impl FrameSink for ImageSequenceSink {
    fn write_frame(&mut self, image: &RgbImage) -> Result<()> {
        let path = self.frame_path(self.manifest.frames);
        let tmp = path.with_extension("png.part");
        image
            .save_with_format(&tmp, image::ImageFormat::Png)
            .with_context(|| format!("写入帧失败: {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("写入帧失败: {}", path.display()))?;
        self.manifest.frames += 1;
        Ok(())
    }

    fn finish(&mut self, complete: bool) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.manifest.complete = complete;
        self.write_manifest()?;
        if complete {
            info!("✅ 输出完成: {} 帧", self.manifest.frames);
        } else {
            warn!("⚠️ 输出中断: 已写出 {} 帧", self.manifest.frames);
        }
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.manifest.frames
    }
}

/// 删除目录中已有的 `frame_*.png` (及未改名的 `.png.part`)
///
/// 新一轮输出从0编号, 旧帧留在目录里会被当作本轮的后续帧读回。
fn remove_stale_frames(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    let entries =
        fs::read_dir(dir).with_context(|| format!("读取输出目录失败: {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let is_frame = name.starts_with("frame_")
            && (name.ends_with(".png") || name.ends_with(".png.part"));
        if is_frame && path.is_file() {
            fs::remove_file(&path).with_context(|| format!("删除旧帧失败: {}", path.display()))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// 读取输出目录的清单
pub fn read_manifest(dir: &Path) -> Result<SinkManifest> {
    let path = dir.join("manifest.json");
    let json =
        fs::read_to_string(&path).with_context(|| format!("读取清单失败: {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("解析清单失败: {}", path.display()))
}
