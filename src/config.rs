//! 命令行参数

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::detection::backend::{Device, PredictOptions};
use crate::error::PreflightError;
use crate::gen_time_string;
use crate::ui_config::MonitorConfig;

fn check_paths(model: &Path, source: &Path) -> Result<(), PreflightError> {
    if !model.exists() {
        return Err(PreflightError::MissingModel(model.to_path_buf()));
    }
    if !source.exists() {
        return Err(PreflightError::MissingSource(source.to_path_buf()));
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> MonitorConfig {
    path.map(MonitorConfig::load).unwrap_or_default()
}

/// 交互式交通监控参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "交通监控 - 目标跟踪与计数", long_about = None)]
pub struct MonitorArgs {
    /// 模型文件 (.onnx) 或逐帧标签目录
    #[arg(short, long, default_value = "models/best.onnx")]
    pub model: PathBuf,

    /// 输入帧序列目录
    #[arg(short, long, default_value = "video/frames")]
    pub source: PathBuf,

    /// 置信度阈值
    #[arg(long, default_value_t = 0.25)]
    pub conf: f32,

    /// 推理设备: auto / cpu / cuda[:N]
    #[arg(long, default_value = "auto")]
    pub device: Device,

    /// JSON配置文件 (不存在时写出默认配置)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 字体文件 (.ttf)
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// 启动后立即播放 (默认暂停在第一帧)
    #[arg(long, default_value_t = false)]
    pub start: bool,
}

impl MonitorArgs {
    pub fn preflight(&self) -> Result<(), PreflightError> {
        check_paths(&self.model, &self.source)
    }

    pub fn load_config(&self) -> MonitorConfig {
        load_config(self.config.as_deref())
    }
}

/// 离线视频标注参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "交通视频离线标注", long_about = None)]
pub struct AnnotateArgs {
    /// 模型文件 (.onnx) 或逐帧标签目录
    #[arg(short, long, default_value = "models/best.onnx")]
    pub model: PathBuf,

    /// 输入帧序列目录
    #[arg(short, long, default_value = "video/frames")]
    pub source: PathBuf,

    /// 输出目录 (默认 runs/annotate/<时间>)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 置信度阈值
    #[arg(long, default_value_t = 0.25)]
    pub conf: f32,

    /// 同时保存逐帧标签 (class identity x1 y1 x2 y2)
    #[arg(long, default_value_t = false)]
    pub save_txt: bool,

    /// 推理设备: auto / cpu / cuda[:N]
    #[arg(long, default_value = "auto")]
    pub device: Device,

    /// JSON配置文件
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 字体文件 (.ttf)
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// 输入未携带帧率时使用
    #[arg(long)]
    pub fps: Option<f64>,

    /// 不绘制仪表盘
    #[arg(long, default_value_t = false)]
    pub no_dashboard: bool,
}

impl AnnotateArgs {
    pub fn preflight(&self) -> Result<(), PreflightError> {
        check_paths(&self.model, &self.source)
    }

    pub fn load_config(&self) -> MonitorConfig {
        load_config(self.config.as_deref())
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| Path::new("runs/annotate").join(gen_time_string("-")))
    }
}

/// 图片标注参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "图片目标检测标注", long_about = None)]
pub struct ImageArgs {
    /// 输入图片或图片目录
    #[arg(short, long)]
    pub image: PathBuf,

    /// 模型文件 (.onnx)
    #[arg(short, long, default_value = "models/best.onnx")]
    pub model: PathBuf,

    /// 输出目录
    #[arg(short, long, default_value = "runs/detect/predict")]
    pub output: PathBuf,

    /// 置信度阈值
    #[arg(long, default_value_t = 0.25)]
    pub conf: f32,

    /// 同时保存标签 (<图片名>.txt)
    #[arg(long, default_value_t = false)]
    pub save_txt: bool,

    /// 推理设备: auto / cpu / cuda[:N]
    #[arg(long, default_value = "auto")]
    pub device: Device,

    /// 字体文件 (.ttf)
    #[arg(long)]
    pub font: Option<PathBuf>,
}

impl ImageArgs {
    pub fn preflight(&self) -> Result<(), PreflightError> {
        check_paths(&self.model, &self.image)
    }

    pub fn predict_options(&self, config: &MonitorConfig) -> PredictOptions {
        PredictOptions {
            conf: self.conf,
            iou: config.nms_iou_threshold,
            classes: None,
        }
    }
}
