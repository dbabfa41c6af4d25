//! 错误类型
//!
//! - `PreflightError`: 启动前检查失败, 直接退出
//! - `FrameError`:     单帧可恢复错误, 主循环记录警告后继续

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreflightError {
    #[error("模型文件不存在: {0}")]
    MissingModel(PathBuf),
    #[error("输入源不存在: {0}")]
    MissingSource(PathBuf),
    #[error("不支持的模型格式: {0} (需要 .onnx 文件或标签目录)")]
    UnsupportedModel(PathBuf),
}

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("推理失败: {0}")]
    Inference(String),
    #[error("第 {index} 帧数据无效: {reason}")]
    Decode { index: u64, reason: String },
}
