//! 检测/跟踪引擎边界 (DetectorTracker)
//!
//! 主循环只依赖这个 trait; 具体后端在构造时选定:
//! - `.onnx` 文件  → [`OnnxTracker`] (YOLOv8 + ByteTrack)
//! - 标签目录      → [`ReplayTracker`] (回放已保存的逐帧标签)

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::Result;
use image::RgbImage;
use tracing::info;

use super::onnx::{OnnxTracker, YoloOnnx};
use super::replay::ReplayTracker;
use super::types::{ClassNames, Detection};
use crate::error::{FrameError, PreflightError};
use crate::input::Frame;
use crate::ui_config::MonitorConfig;

/// 推理设备
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    /// 启动时自动选择 (有CUDA用CUDA)
    Auto,
    Cpu,
    Cuda(i32),
}

impl Device {
    pub fn is_gpu(&self) -> bool {
        matches!(self, Device::Cuda(_))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Auto => write!(f, "auto"),
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(id) => write!(f, "cuda:{}", id),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Device::Auto),
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" | "0" => Ok(Device::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|id| id.parse::<i32>().ok())
                .map(Device::Cuda)
                .ok_or_else(|| format!("无法识别的设备: {} (auto/cpu/cuda[:N])", s)),
        }
    }
}

/// predict 模式参数 (无身份, 单张图片)
#[derive(Debug, Clone, PartialEq)]
pub struct PredictOptions {
    pub conf: f32,
    pub iou: f32,
    /// 只保留这些类别, `None` 表示全部
    pub classes: Option<Vec<u32>>,
}

impl Default for PredictOptions {
    fn default() -> Self {
        Self {
            conf: 0.25,
            iou: 0.45,
            classes: None,
        }
    }
}

impl PredictOptions {
    pub fn keeps(&self, class_id: u32) -> bool {
        self.classes
            .as_ref()
            .map_or(true, |classes| classes.contains(&class_id))
    }
}

/// 检测 + 跟踪能力接口
///
/// `track` 有状态: 同一会话内连续调用时, 同一物体的身份保持稳定。
/// 单帧失败以 [`FrameError`] 返回, 由调用方决定跳过还是中止。
pub trait DetectorTracker {
    fn track(&mut self, frame: &Frame) -> Result<Vec<Detection>, FrameError>;

    /// 无状态检测, 结果不带身份
    fn predict(
        &mut self,
        image: &RgbImage,
        options: &PredictOptions,
    ) -> Result<Vec<Detection>, FrameError>;

    fn class_names(&self) -> &ClassNames;

    /// 实际使用的设备 (已解析, 不会是 `Auto`)
    fn device(&self) -> Device;
}

/// 根据模型路径构造后端; 加载失败对整个会话是致命的
pub fn open_backend(
    model: &Path,
    device: Device,
    conf: f32,
    config: &MonitorConfig,
) -> Result<Box<dyn DetectorTracker>> {
    if !model.exists() {
        return Err(PreflightError::MissingModel(model.to_path_buf()).into());
    }

    if model.is_dir() {
        let replay = ReplayTracker::open(model)?;
        info!("🎞️ 标签回放后端: {} 帧", replay.frame_count());
        return Ok(Box::new(replay));
    }

    let is_onnx = model
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"));
    if !is_onnx {
        return Err(PreflightError::UnsupportedModel(model.to_path_buf()).into());
    }

    let yolo = YoloOnnx::load(model, device, config)?;
    Ok(Box::new(OnnxTracker::new(yolo, conf, config)))
}
