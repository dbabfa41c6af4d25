/// 交通监控 (Traffic Monitor)
///
/// 交互式窗口: 逐帧检测跟踪并统计各类别唯一目标数。
///
/// 操作:
/// - S / START 按钮: 播放
/// - P / STOP 按钮:  暂停
/// - Q / 关闭窗口:   退出
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use image::RgbImage;
use macroquad::prelude::{
    clear_background, draw_texture_ex, get_char_pressed, is_mouse_button_pressed, mouse_position,
    next_frame, prevent_quit, is_quit_requested, screen_height, screen_width, vec2, Conf,
    DrawTextureParams, FilterMode, Image, MouseButton, Texture2D, BLACK, WHITE,
};
use mimalloc::MiMalloc;
use tracing::{error, info};

use traffic_monitor::detection::{open_backend, Device};
use traffic_monitor::input::{FrameSource, ImageSequenceSource};
use traffic_monitor::pipeline::{
    CancelFlag, InputEvent, Orchestrator, PlaybackController, SystemProbe,
};
use traffic_monitor::renderer::{find_font, window_to_frame, AnnotationRenderer, ControlLayout};
use traffic_monitor::{logging, MonitorArgs};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn window_conf() -> Conf {
    let config = MonitorArgs::parse().load_config();
    Conf {
        window_title: "Traffic Monitor".to_string(),
        window_width: config.window_width as i32,
        window_height: config.window_height as i32,
        high_dpi: false,
        ..Default::default()
    }
}

/// macroquad 窗口: 显示标注帧, 把键盘/鼠标转换为 [`InputEvent`]
struct WindowDisplay {
    texture: Option<Texture2D>,
    frame_size: (u32, u32),
}

impl WindowDisplay {
    fn new() -> Self {
        Self {
            texture: None,
            frame_size: (0, 0),
        }
    }

    fn show(&mut self, frame: &RgbImage) {
        let (width, height) = frame.dimensions();
        let rgba = image::DynamicImage::ImageRgb8(frame.clone()).into_rgba8();

        // 只在分辨率变化时重建纹理, 否则更新像素数据
        match &self.texture {
            Some(tex) if self.frame_size == (width, height) => {
                tex.update(&Image {
                    bytes: rgba.into_raw(),
                    width: width as u16,
                    height: height as u16,
                });
            }
            _ => {
                let texture = Texture2D::from_rgba8(width as u16, height as u16, &rgba);
                texture.set_filter(FilterMode::Linear);
                self.texture = Some(texture);
                self.frame_size = (width, height);
            }
        }
    }

    fn draw(&self) {
        clear_background(BLACK);
        if let Some(texture) = &self.texture {
            draw_texture_ex(
                texture,
                0.0,
                0.0,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(vec2(screen_width(), screen_height())),
                    ..Default::default()
                },
            );
        }
    }

    /// 本帧的输入, 至多一个
    fn take_event(&self) -> Option<InputEvent> {
        if is_quit_requested() {
            return Some(InputEvent::Closed);
        }
        if let Some(key) = get_char_pressed() {
            return Some(InputEvent::Key(key));
        }
        if is_mouse_button_pressed(MouseButton::Left) {
            let (x, y) = window_to_frame(
                mouse_position(),
                (screen_width(), screen_height()),
                self.frame_size,
            );
            return Some(InputEvent::Click { x, y });
        }
        None
    }

    /// 有上限的等待: 直到收到一个事件或超时
    async fn poll_event(&self, wait: Duration) -> Option<InputEvent> {
        let deadline = Instant::now() + wait;
        loop {
            self.draw();
            next_frame().await;
            if let Some(event) = self.take_event() {
                return Some(event);
            }
            if Instant::now() >= deadline {
                return None;
            }
        }
    }
}

async fn run() -> Result<()> {
    logging::init();
    let args = MonitorArgs::parse();
    args.preflight()?;

    let config = args.load_config();
    config.print_summary();

    let engine = open_backend(&args.model, args.device, args.conf, &config)?;
    let gpu_id = match engine.device() {
        Device::Cuda(id) => Some(id),
        _ => None,
    };
    let source = ImageSequenceSource::open(&args.source)?;
    info!(
        "🎞️ {}x{}, {} 帧",
        source.info().width,
        source.info().height,
        source.info().frame_count.unwrap_or(0)
    );

    let layout = ControlLayout::new(config.start_button, config.stop_button);
    let font = find_font(args.font.as_deref().or(config.font_path.as_deref()));
    let renderer = AnnotationRenderer::new(font)
        .with_layout(layout)
        .with_controls(true)
        .with_dashboard(config.show_dashboard);

    let cancel = CancelFlag::new();
    cancel.install_ctrlc()?;

    let mut orchestrator = Orchestrator::new(
        source,
        engine,
        renderer,
        PlaybackController::interactive(args.start, layout),
    )
    .with_probe(Box::new(SystemProbe::new(gpu_id)))
    .with_cancel(cancel);

    info!("🚦 开始监控. 按 S 播放 / P 暂停 / Q 退出");
    prevent_quit();
    let poll_wait = Duration::from_millis(config.poll_wait_ms);
    let mut display = WindowDisplay::new();

    let mut pending = None;
    while let Some(step) = orchestrator.advance(pending.take())? {
        let Some(annotated) = step.frame else {
            continue;
        };
        display.show(&annotated);
        pending = display.poll_event(poll_wait).await;
    }

    orchestrator.close().log();
    Ok(())
}

#[macroquad::main(window_conf)]
async fn main() {
    if let Err(e) = run().await {
        error!("❌ {:#}", e);
        std::process::exit(1);
    }
}
