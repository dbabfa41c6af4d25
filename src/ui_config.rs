//! 监控配置 - 通过JSON文件调整参数

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::detection::bytetrack::ByteTrackParams;
use crate::detection::tracker::KalmanParams;
use crate::detection::types::INF_SIZE;
use crate::renderer::ButtonRect;

/// 监控参数配置
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    // === 检测参数 ===
    pub nms_iou_threshold: f32, // NMS IOU阈值
    pub inference_size: u32,    // 推理输入尺寸
    /// 覆盖模型自带的类别名称 (为空则读取模型元数据)
    pub class_names: Vec<String>,

    // === ByteTrack参数 ===
    pub bytetrack_max_lost_frames: u32,      // 最大丢失帧数
    pub bytetrack_high_score_threshold: f32, // 高分阈值
    pub bytetrack_low_score_threshold: f32,  // 低分阈值
    pub bytetrack_high_iou_threshold: f32,   // 高分IOU阈值
    pub bytetrack_low_iou_threshold: f32,    // 低分IOU阈值

    // === 卡尔曼滤波参数 ===
    pub kalman_process_noise: f32,        // 过程噪声 q
    pub kalman_observation_noise: f32,    // 观测噪声 r
    pub kalman_velocity_decay: f32,       // 速度衰减
    pub kalman_stationary_threshold: f32, // 静止判定阈值(像素)

    // === 界面 ===
    pub start_button: ButtonRect,
    pub stop_button: ButtonRect,
    pub poll_wait_ms: u64, // 每轮等待输入的上限
    pub window_width: u32,
    pub window_height: u32,
    pub default_fps: f64, // 输入未携带帧率时使用
    pub font_path: Option<PathBuf>,
    pub show_dashboard: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let bytetrack = ByteTrackParams::default();
        let kalman = KalmanParams::default();
        Self {
            nms_iou_threshold: 0.45,
            inference_size: INF_SIZE,
            class_names: Vec::new(),

            bytetrack_max_lost_frames: bytetrack.max_lost_frames,
            bytetrack_high_score_threshold: bytetrack.high_score_threshold,
            bytetrack_low_score_threshold: bytetrack.low_score_threshold,
            bytetrack_high_iou_threshold: bytetrack.high_iou_threshold,
            bytetrack_low_iou_threshold: bytetrack.low_iou_threshold,

            kalman_process_noise: kalman.process_noise,
            kalman_observation_noise: kalman.observation_noise,
            kalman_velocity_decay: kalman.velocity_decay,
            kalman_stationary_threshold: kalman.stationary_threshold,

            start_button: ButtonRect::START,
            stop_button: ButtonRect::STOP,
            poll_wait_ms: 30,
            window_width: 1280,
            window_height: 720,
            default_fps: 30.0,
            font_path: None,
            show_dashboard: true,
        }
    }
}

impl MonitorConfig {
    /// 从JSON文件加载配置; 文件不存在时写出默认配置, 解析失败时使用默认值
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️ 配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    error!("❌ 保存配置失败: {}", e);
                } else {
                    info!("💾 配置已保存到 {}", path.display());
                }
            }
            Err(e) => error!("❌ 序列化配置失败: {}", e),
        }
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️ 当前配置:");
        info!("  NMS IOU: {:.2}, 输入尺寸: {}", self.nms_iou_threshold, self.inference_size);
        info!(
            "  ByteTrack 最大丢失帧: {}, 高/低分阈值: {:.2}/{:.2}",
            self.bytetrack_max_lost_frames,
            self.bytetrack_high_score_threshold,
            self.bytetrack_low_score_threshold
        );
        info!("  卡尔曼观测噪声: {:.2}", self.kalman_observation_noise);
        info!(
            "  窗口: {}x{}, 输入等待: {}ms",
            self.window_width, self.window_height, self.poll_wait_ms
        );
    }

    pub fn bytetrack_params(&self) -> ByteTrackParams {
        ByteTrackParams {
            max_lost_frames: self.bytetrack_max_lost_frames,
            high_score_threshold: self.bytetrack_high_score_threshold,
            low_score_threshold: self.bytetrack_low_score_threshold,
            high_iou_threshold: self.bytetrack_high_iou_threshold,
            low_iou_threshold: self.bytetrack_low_iou_threshold,
        }
    }

    pub fn kalman_params(&self) -> KalmanParams {
        KalmanParams {
            process_noise: self.kalman_process_noise,
            observation_noise: self.kalman_observation_noise,
            velocity_decay: self.kalman_velocity_decay,
            stationary_threshold: self.kalman_stationary_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.json");
        let config = MonitorConfig::load(&path);
        assert_eq!(config, MonitorConfig::default());
        assert!(path.exists());
        assert_eq!(MonitorConfig::load(&path), config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.json");
        fs::write(&path, r#"{"poll_wait_ms": 5, "class_names": ["car"]}"#).unwrap();
        let config = MonitorConfig::load(&path);
        assert_eq!(config.poll_wait_ms, 5);
        assert_eq!(config.class_names, vec!["car"]);
        assert_eq!(config.inference_size, INF_SIZE);
        assert_eq!(config.bytetrack_params(), ByteTrackParams::default());
    }

    #[test]
    fn test_broken_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(MonitorConfig::load(&path), MonitorConfig::default());
    }
}
