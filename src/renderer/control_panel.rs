//! 控制面板布局: 开始/停止按钮区域与命中测试

use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

/// 按钮矩形 (帧像素坐标)
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ButtonRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ButtonRect {
    pub const START: ButtonRect = ButtonRect::new(20, 100, 100, 40);
    pub const STOP: ButtonRect = ButtonRect::new(140, 100, 100, 40);

    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 边界包含在内
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x as f32
            && x <= (self.x + self.width as i32) as f32
            && y >= self.y as f32
            && y <= (self.y + self.height as i32) as f32
    }

    pub fn to_rect(&self) -> Option<Rect> {
        (self.width > 0 && self.height > 0)
            .then(|| Rect::at(self.x, self.y).of_size(self.width, self.height))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlButton {
    Start,
    Stop,
}

/// 仪表盘布局
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlLayout {
    pub start: ButtonRect,
    pub stop: ButtonRect,
}

impl Default for ControlLayout {
    fn default() -> Self {
        Self {
            start: ButtonRect::START,
            stop: ButtonRect::STOP,
        }
    }
}

impl ControlLayout {
    /// FPS/CPU/GPU 文字基线
    pub const STATS_Y: i32 = 40;
    pub const FPS_X: i32 = 20;
    pub const CPU_X: i32 = 140;
    pub const GPU_X: i32 = 280;
    /// 计数列表标题基线, 之后每行递增
    pub const COUNTS_TITLE_Y: i32 = 160;
    pub const COUNTS_FIRST_Y: i32 = 180;
    pub const COUNTS_LINE_STEP: i32 = 25;

    pub fn new(start: ButtonRect, stop: ButtonRect) -> Self {
        Self { start, stop }
    }

    pub fn hit(&self, x: f32, y: f32) -> Option<ControlButton> {
        if self.start.contains(x, y) {
            Some(ControlButton::Start)
        } else if self.stop.contains(x, y) {
            Some(ControlButton::Stop)
        } else {
            None
        }
    }

    /// 第 i 行计数的基线
    pub fn count_line_y(i: usize) -> i32 {
        Self::COUNTS_FIRST_Y + Self::COUNTS_LINE_STEP * i as i32
    }
}

/// 窗口坐标 → 帧像素坐标 (画面按窗口拉伸显示)
pub fn window_to_frame(
    (wx, wy): (f32, f32),
    (window_w, window_h): (f32, f32),
    (frame_w, frame_h): (u32, u32),
) -> (f32, f32) {
    if window_w <= 0.0 || window_h <= 0.0 {
        return (wx, wy);
    }
    (
        wx * frame_w as f32 / window_w,
        wy * frame_h as f32 / window_h,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_testing() {
        let layout = ControlLayout::default();
        assert_eq!(layout.hit(20.0, 100.0), Some(ControlButton::Start));
        assert_eq!(layout.hit(120.0, 140.0), Some(ControlButton::Start));
        assert_eq!(layout.hit(200.0, 120.0), Some(ControlButton::Stop));
        assert_eq!(layout.hit(130.0, 120.0), None);
        assert_eq!(layout.hit(60.0, 99.0), None);
    }

    #[test]
    fn test_window_to_frame_scaling() {
        let (x, y) = window_to_frame((640.0, 360.0), (1280.0, 720.0), (1920, 1080));
        assert_eq!((x, y), (960.0, 540.0));
        assert_eq!(window_to_frame((5.0, 6.0), (0.0, 0.0), (100, 100)), (5.0, 6.0));
    }

    #[test]
    fn test_zero_sized_button_has_no_rect() {
        assert!(ButtonRect::new(0, 0, 0, 10).to_rect().is_none());
        assert!(ButtonRect::START.to_rect().is_some());
    }
}
