//! 多目标跟踪公共组件
//! Common components for multi-object tracking

use super::types::BBox;

// ========== 卡尔曼滤波器 ==========

/// 卡尔曼滤波参数
#[derive(Clone, Copy, Debug)]
pub struct KalmanParams {
    /// 过程噪声 q (0.1-1.0, 越小越平滑)
    pub process_noise: f32,
    /// 观测噪声 r (越大越信任预测)
    pub observation_noise: f32,
    /// 速度衰减因子 (每帧保留比例)
    pub velocity_decay: f32,
    /// 静止阈值 (像素/帧)
    pub stationary_threshold: f32,
}

impl Default for KalmanParams {
    fn default() -> Self {
        Self {
            process_noise: 0.1,
            observation_noise: 0.5,
            velocity_decay: 0.95,
            stationary_threshold: 2.0,
        }
    }
}

/// 简化卡尔曼滤波器 (对角协方差, 匀速模型)
/// 状态向量: [cx, cy, w, h, vx, vy, vw, vh]
#[derive(Clone, Debug)]
pub struct KalmanBoxFilter {
    state: [f32; 8],
    p: [f32; 8],
    params: KalmanParams,
    stationary_count: u32,
}

impl KalmanBoxFilter {
    pub fn new(bbox: &BBox, params: KalmanParams) -> Self {
        let (cx, cy) = bbox.center();
        Self {
            state: [cx, cy, bbox.width(), bbox.height(), 0.0, 0.0, 0.0, 0.0],
            p: [10.0; 8],
            params,
            stationary_count: 0,
        }
    }

    fn speed(&self) -> f32 {
        (self.state[4] * self.state[4] + self.state[5] * self.state[5]).sqrt()
    }

    /// 预测下一帧状态
    pub fn predict(&mut self) {
        let stationary = self.speed() < self.params.stationary_threshold;
        let (pos_decay, size_decay) = if stationary {
            self.stationary_count += 1;
            // 连续静止3帧后大幅衰减速度
            let decay = if self.stationary_count > 3 {
                0.7
            } else {
                self.params.velocity_decay
            };
            (decay, decay)
        } else {
            self.stationary_count = 0;
            (self.params.velocity_decay, 0.98)
        };

        self.state[4] *= pos_decay;
        self.state[5] *= pos_decay;
        self.state[6] *= size_decay;
        self.state[7] *= size_decay;

        for i in 0..4 {
            self.state[i] += self.state[i + 4];
        }

        let q = self.params.process_noise * if stationary { 0.5 } else { 1.0 };
        self.p.iter_mut().for_each(|p| *p += q);
    }

    /// 融合观测值 (残差越大越信任预测)
    pub fn update(&mut self, bbox: &BBox) {
        let (cx, cy) = bbox.center();
        let residual = [
            cx - self.state[0],
            cy - self.state[1],
            bbox.width() - self.state[2],
            bbox.height() - self.state[3],
        ];

        let residual_norm = (residual[0] * residual[0] + residual[1] * residual[1]).sqrt();
        let threshold = self.params.stationary_threshold;
        let r = self.params.observation_noise
            * if residual_norm < threshold {
                0.3
            } else if residual_norm < 10.0 {
                1.0
            } else {
                3.0
            };
        let velocity_gain = if residual_norm < threshold { 0.3 } else { 1.0 };

        for i in 0..4 {
            let k_pos = self.p[i] / (self.p[i] + r);
            let k_vel = self.p[i + 4] / (self.p[i + 4] + r * 10.0);
            self.state[i] += k_pos * residual[i];
            self.state[i + 4] += k_vel * residual[i] * velocity_gain;
            self.p[i] *= 1.0 - k_pos;
            self.p[i + 4] *= 1.0 - k_vel;
        }

        if residual_norm >= threshold {
            self.stationary_count = 0;
        }
    }

    /// 当前状态对应的边界框 (保留调用方提供的置信度与类别)
    pub fn state_bbox(&self, confidence: f32, class_id: u32) -> BBox {
        Self::to_bbox(
            self.state[0],
            self.state[1],
            self.state[2],
            self.state[3],
            confidence,
            class_id,
        )
    }

    fn to_bbox(cx: f32, cy: f32, w: f32, h: f32, confidence: f32, class_id: u32) -> BBox {
        let w = w.max(1.0);
        let h = h.max(1.0);
        BBox::new(
            cx - w / 2.0,
            cy - h / 2.0,
            cx + w / 2.0,
            cy + h / 2.0,
            confidence,
            class_id,
        )
    }
}

// ========== 跟踪器统一接口 ==========

/// 单帧跟踪输出
#[derive(Clone, Debug, PartialEq)]
pub struct TrackOutput {
    pub bbox: BBox,
    /// `None` 表示该检测没有形成 (或延续) 任何轨迹
    pub track_id: Option<u32>,
}

/// 多目标跟踪器 Trait
///
/// 同一会话内连续调用 `update`, 同一物体应保持相同 ID
pub trait Tracker {
    /// 输入当前帧检测框, 返回本帧可见目标 (含未跟踪的检测)
    fn update(&mut self, detections: &[BBox]) -> Vec<TrackOutput>;

    /// 当前活跃轨迹数量
    fn track_count(&self) -> usize;
}

// ========== 工具函数 ==========

/// 计算两个边界框的IOU (Intersection over Union)
pub fn compute_iou(a: &BBox, b: &BBox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let intersection = (x2 - x1) * (y2 - y1);
    let union = a.width() * a.height() + b.width() * b.height() - intersection;
    if union <= 0.0 {
        return 0.0;
    }
    intersection / union
}

/// 根据ID生成不同颜色 (黄金角度采样色相)
pub fn id_to_color(id: u32) -> (u8, u8, u8) {
    let hue = (id as f32 * 137.508) % 360.0;
    hsv_to_rgb(hue, 0.8, 0.9)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (u8, u8, u8) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h as u32 {
        0..=59 => (c, x, 0.0),
        60..=119 => (x, c, 0.0),
        120..=179 => (0.0, c, x),
        180..=239 => (0.0, x, c),
        240..=299 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    (
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou_identical_and_disjoint() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0, 1.0, 0);
        let b = BBox::new(20.0, 20.0, 30.0, 30.0, 1.0, 0);
        assert!((compute_iou(&a, &a) - 1.0).abs() < 1e-6);
        assert_eq!(compute_iou(&a, &b), 0.0);
    }

    #[test]
    fn test_iou_half_overlap() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0, 1.0, 0);
        let b = BBox::new(5.0, 0.0, 15.0, 10.0, 1.0, 0);
        // 交集50, 并集150
        assert!((compute_iou(&a, &b) - 1.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_kalman_follows_moving_box() {
        let mut bbox = BBox::new(0.0, 0.0, 20.0, 20.0, 0.9, 1);
        let mut kalman = KalmanBoxFilter::new(&bbox, KalmanParams::default());
        for _ in 0..20 {
            bbox.x1 += 5.0;
            bbox.x2 += 5.0;
            kalman.predict();
            kalman.update(&bbox);
        }
        let state = kalman.state_bbox(0.9, 1);
        assert!((state.center().0 - bbox.center().0).abs() < 5.0);
        assert_eq!(state.class_id, 1);
        // 预测后应继续向右移动
        kalman.predict();
        assert!(kalman.state_bbox(0.9, 1).center().0 > state.center().0);
    }

    #[test]
    fn test_id_colors_differ() {
        assert_ne!(id_to_color(1), id_to_color(2));
    }
}
