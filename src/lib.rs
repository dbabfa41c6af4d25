// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 命令行参数
pub mod detection; // 检测/跟踪/计数
pub mod error; // 错误类型
pub mod input; // 帧输入输出
pub mod logging; // 日志
pub mod pipeline; // 播放状态机与主循环
pub mod renderer; // 标注渲染
pub mod ui_config; // JSON配置

pub use crate::config::{AnnotateArgs, ImageArgs, MonitorArgs};
pub use crate::detection::{
    open_backend, BBox, CountAggregator, Detection, DetectorTracker, Device, PredictOptions,
};
pub use crate::error::{FrameError, PreflightError};
pub use crate::pipeline::{
    CancelFlag, Display, InputEvent, Orchestrator, PlaybackController, PlaybackState,
    SessionSummary,
};
pub use crate::renderer::AnnotationRenderer;
pub use crate::ui_config::MonitorConfig;

use crate::detection::tracker::compute_iou;

/// 按类别的非极大值抑制, 结果按置信度降序
pub fn non_max_suppression(boxes: &mut Vec<BBox>, iou_threshold: f32) {
    boxes.sort_by(|b1, b2| b2.confidence.total_cmp(&b1.confidence));

    let mut current_index = 0;
    for index in 0..boxes.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if boxes[prev_index].class_id != boxes[index].class_id {
                continue;
            }
            if compute_iou(&boxes[prev_index], &boxes[index]) > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            boxes.swap(current_index, index);
            current_index += 1;
        }
    }
    boxes.truncate(current_index);
}

pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S",
        delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nms_is_class_aware() {
        let mut boxes = vec![
            BBox::new(0.0, 0.0, 10.0, 10.0, 0.6, 0),
            BBox::new(1.0, 1.0, 11.0, 11.0, 0.9, 0),
            BBox::new(1.0, 1.0, 11.0, 11.0, 0.7, 1),
            BBox::new(50.0, 50.0, 60.0, 60.0, 0.5, 0),
        ];
        non_max_suppression(&mut boxes, 0.45);
        assert_eq!(boxes.len(), 3);
        assert_eq!(boxes[0].confidence, 0.9);
        assert_eq!(boxes[1].class_id, 1);
        assert_eq!(boxes[2].x1, 50.0);
    }

    #[test]
    fn test_gen_time_string() {
        let s = gen_time_string("-");
        assert_eq!(s.split('-').count(), 6);
    }
}
