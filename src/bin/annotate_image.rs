/// 图片目标检测标注 (predict 模式)
use anyhow::Result;
use clap::Parser;
use tracing::info;

use traffic_monitor::detection::open_backend;
use traffic_monitor::pipeline::annotate_images;
use traffic_monitor::renderer::{find_font, AnnotationRenderer};
use traffic_monitor::ui_config::MonitorConfig;
use traffic_monitor::{logging, ImageArgs};

fn main() -> Result<()> {
    logging::init();
    let args = ImageArgs::parse();
    args.preflight()?;

    let config = MonitorConfig::default();
    let mut engine = open_backend(&args.model, args.device, args.conf, &config)?;
    let renderer = AnnotationRenderer::new(find_font(args.font.as_deref())).with_dashboard(false);

    let summary = annotate_images(
        engine.as_mut(),
        &renderer,
        &args.image,
        &args.output,
        &args.predict_options(&config),
        args.save_txt,
    )?;
    info!(
        "✅ 完成: {} 张图片, {} 个目标, {} 张失败",
        summary.images, summary.detections, summary.failed
    );
    info!("💾 结果保存在 {}", args.output.display());
    Ok(())
}
