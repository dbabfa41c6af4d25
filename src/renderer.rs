//! 标注渲染 (AnnotationRenderer)
//!
//! 纯函数: (帧, 检测结果, 播放状态, 仪表盘统计) → 标注后的帧。
//! 没有内部状态, 相同输入得到逐像素相同的输出。
//! 未加载字体时只绘制几何图形 (框、标签底条、按钮、暂停符号)。

pub mod control_panel;

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::{info, warn};

use crate::detection::tracker::id_to_color;
use crate::detection::types::Detection;
use crate::pipeline::playback::PlaybackState;
use crate::pipeline::stats::DashboardStats;
pub use control_panel::{window_to_frame, ButtonRect, ControlButton, ControlLayout};

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const STATS_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const START_ACTIVE: Rgb<u8> = Rgb([0, 255, 0]);
const STOP_ACTIVE: Rgb<u8> = Rgb([255, 0, 0]);
const BUTTON_IDLE: Rgb<u8> = Rgb([100, 100, 100]);
const UNTRACKED_COLOR: Rgb<u8> = Rgb([255, 165, 0]);
const PAUSED_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const LABEL_SCALE: f32 = 16.0;
const STATS_SCALE: f32 = 22.0;
const COUNTS_SCALE: f32 = 19.0;
const PAUSED_SCALE: f32 = 48.0;
const LABEL_STRIP_HEIGHT: u32 = 18;

/// "PAUSED" 文字基线位置
const PAUSED_ORIGIN: (i32, i32) = (500, 360);

/// 常见字体位置, 按顺序尝试
const FONT_CANDIDATES: [&str; 5] = [
    "assets/fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

pub fn load_font(path: &Path) -> Result<FontArc> {
    let bytes = std::fs::read(path).with_context(|| format!("读取字体失败: {}", path.display()))?;
    FontArc::try_from_vec(bytes).map_err(|e| anyhow!("字体解析失败 {}: {}", path.display(), e))
}

/// 先用指定字体, 否则依次尝试常见位置
pub fn find_font(explicit: Option<&Path>) -> Option<FontArc> {
    if let Some(path) = explicit {
        match load_font(path) {
            Ok(font) => {
                info!("🔤 字体: {}", path.display());
                return Some(font);
            }
            Err(e) => warn!("⚠️ {:#}", e),
        }
    }
    let found = FONT_CANDIDATES
        .iter()
        .map(Path::new)
        .filter(|p| p.exists())
        .find_map(|p| load_font(p).ok());
    if found.is_none() {
        warn!("⚠️ 未找到可用字体, 只绘制图形不绘制文字");
    }
    found
}

/// 宽高不为正的矩形返回 `None`
fn rect(x: i32, y: i32, width: i32, height: i32) -> Option<Rect> {
    (width > 0 && height > 0).then(|| Rect::at(x, y).of_size(width as u32, height as u32))
}

pub struct AnnotationRenderer {
    font: Option<FontArc>,
    layout: ControlLayout,
    show_controls: bool,
    show_dashboard: bool,
}

impl AnnotationRenderer {
    pub fn new(font: Option<FontArc>) -> Self {
        Self {
            font,
            layout: ControlLayout::default(),
            show_controls: false,
            show_dashboard: true,
        }
    }

    pub fn with_layout(mut self, layout: ControlLayout) -> Self {
        self.layout = layout;
        self
    }

    /// 开始/停止按钮 (仅交互模式)
    pub fn with_controls(mut self, show: bool) -> Self {
        self.show_controls = show;
        self
    }

    pub fn with_dashboard(mut self, show: bool) -> Self {
        self.show_dashboard = show;
        self
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn layout(&self) -> &ControlLayout {
        &self.layout
    }

    pub fn render(
        &self,
        frame: &RgbImage,
        detections: &[Detection],
        state: PlaybackState,
        stats: &DashboardStats,
    ) -> RgbImage {
        let mut canvas = frame.clone();
        self.draw_detections(&mut canvas, detections);
        if self.show_dashboard {
            self.draw_dashboard(&mut canvas, state, stats);
        }
        if state == PlaybackState::Paused {
            self.draw_paused(&mut canvas);
        }
        canvas
    }

    /// 检测框 + 标签; 有身份的按ID着色, 无身份的统一颜色
    pub fn draw_detections(&self, canvas: &mut RgbImage, detections: &[Detection]) {
        for det in detections {
            let color = match det.track_id {
                Some(id) => {
                    let (r, g, b) = id_to_color(id);
                    Rgb([r, g, b])
                }
                None => UNTRACKED_COLOR,
            };
            let (x1, y1, x2, y2) = det.bbox.to_pixels();
            let (w, h) = (x2 - x1, y2 - y1);

            // 2px 边框
            if let Some(r) = rect(x1, y1, w, h) {
                draw_hollow_rect_mut(canvas, r, color);
            }
            if let Some(r) = rect(x1 + 1, y1 + 1, w - 2, h - 2) {
                draw_hollow_rect_mut(canvas, r, color);
            }

            let label = det.label();
            let strip_w = self.text_width(&label, LABEL_SCALE) as i32 + 4;
            let strip_h = LABEL_STRIP_HEIGHT as i32;
            // 框贴近上边缘时标签放进框内
            let strip_y = if y1 >= strip_h { y1 - strip_h } else { y1 };
            if let Some(r) = rect(x1, strip_y, strip_w, strip_h) {
                draw_filled_rect_mut(canvas, r, color);
            }
            self.draw_text(canvas, WHITE, x1 + 2, strip_y + 1, LABEL_SCALE, &label);
        }
    }

    pub fn draw_dashboard(&self, canvas: &mut RgbImage, state: PlaybackState, stats: &DashboardStats) {
        let y = ControlLayout::STATS_Y;
        self.draw_text_baseline(canvas, STATS_COLOR, ControlLayout::FPS_X, y, STATS_SCALE, &stats.fps_text());
        self.draw_text_baseline(canvas, STATS_COLOR, ControlLayout::CPU_X, y, STATS_SCALE, &stats.cpu_text());
        self.draw_text_baseline(canvas, STATS_COLOR, ControlLayout::GPU_X, y, STATS_SCALE, &stats.gpu_text());

        if self.show_controls {
            let running = state == PlaybackState::Running;
            let start_color = if running { START_ACTIVE } else { BUTTON_IDLE };
            let stop_color = if running { BUTTON_IDLE } else { STOP_ACTIVE };
            self.draw_button(canvas, &self.layout.start, start_color, "START", 15);
            self.draw_button(canvas, &self.layout.stop, stop_color, "STOP", 20);
        }

        self.draw_text_baseline(
            canvas,
            WHITE,
            ControlLayout::FPS_X,
            ControlLayout::COUNTS_TITLE_Y,
            COUNTS_SCALE,
            "Object Counts:",
        );
        for (i, (class, count)) in stats.counts.iter().enumerate() {
            self.draw_text_baseline(
                canvas,
                WHITE,
                ControlLayout::FPS_X,
                ControlLayout::count_line_y(i),
                COUNTS_SCALE,
                &format!("{}: {}", class, count),
            );
        }
    }

    /// 暂停符号 + "PAUSED"
    pub fn draw_paused(&self, canvas: &mut RgbImage) {
        let (x, baseline) = PAUSED_ORIGIN;
        for bar_x in [x - 34, x - 18] {
            if let Some(r) = rect(bar_x, baseline - 36, 10, 36) {
                draw_filled_rect_mut(canvas, r, PAUSED_COLOR);
            }
        }
        self.draw_text_baseline(canvas, PAUSED_COLOR, x, baseline, PAUSED_SCALE, "PAUSED");
    }

    fn draw_button(&self, canvas: &mut RgbImage, button: &ButtonRect, color: Rgb<u8>, text: &str, text_dx: i32) {
        if let Some(r) = button.to_rect() {
            draw_filled_rect_mut(canvas, r, color);
        }
        self.draw_text_baseline(canvas, WHITE, button.x + text_dx, button.y + 28, COUNTS_SCALE, text);
    }

    fn text_width(&self, text: &str, scale: f32) -> u32 {
        match &self.font {
            Some(font) => text_size(PxScale::from(scale), font, text).0,
            // 无字体时按等宽估算, 保证标签底条仍然可见
            None => (text.chars().count() as f32 * scale * 0.5) as u32,
        }
    }

    /// `y` 为文字顶部
    fn draw_text(&self, canvas: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, scale: f32, text: &str) {
        if let Some(font) = &self.font {
            draw_text_mut(canvas, color, x, y, PxScale::from(scale), font, text);
        }
    }

    /// `baseline` 为文字基线
    fn draw_text_baseline(
        &self,
        canvas: &mut RgbImage,
        color: Rgb<u8>,
        x: i32,
        baseline: i32,
        scale: f32,
        text: &str,
    ) {
        let top = baseline - (scale * 0.75) as i32;
        self.draw_text(canvas, color, x, top, scale, text);
    }
}
