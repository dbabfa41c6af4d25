/// 交通视频离线标注
///
/// 逐帧检测、跟踪、计数, 标注结果写入输出目录 (每帧一张图片 + manifest.json)。
/// Ctrl-C 中断时已写出的帧保持有效。
use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mimalloc::MiMalloc;
use tracing::info;

use traffic_monitor::detection::open_backend;
use traffic_monitor::input::{FrameSource, ImageSequenceSource, ImageSequenceSink, LabelWriter};
use traffic_monitor::pipeline::{CancelFlag, Orchestrator, PlaybackController, SystemProbe};
use traffic_monitor::renderer::{find_font, AnnotationRenderer};
use traffic_monitor::{logging, AnnotateArgs};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<()> {
    logging::init();
    let args = AnnotateArgs::parse();
    args.preflight()?;

    let config = args.load_config();
    config.print_summary();

    let engine = open_backend(&args.model, args.device, args.conf, &config)?;
    let gpu_id = match engine.device() {
        traffic_monitor::Device::Cuda(id) => Some(id),
        _ => None,
    };
    let source = ImageSequenceSource::open(&args.source)?;
    let info = source.info();
    let fps = info.fps.or(args.fps).unwrap_or(config.default_fps);

    // 输出打不开时直接失败
    let output = args.output_dir();
    let mut sink = ImageSequenceSink::create(&output, &info, fps)?;
    let mut labels = if args.save_txt {
        Some(LabelWriter::create(output.join("labels"))?)
    } else {
        None
    };

    let font = find_font(args.font.as_deref().or(config.font_path.as_deref()));
    let renderer = AnnotationRenderer::new(font).with_dashboard(!args.no_dashboard);

    let cancel = CancelFlag::new();
    cancel.install_ctrlc()?;

    let progress = match info.frame_count {
        Some(total) => ProgressBar::new(total),
        None => ProgressBar::new_spinner(),
    };
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut orchestrator = Orchestrator::new(source, engine, renderer, PlaybackController::batch())
        .with_probe(Box::new(SystemProbe::new(gpu_id)))
        .with_cancel(cancel);
    info!("▶️ 开始处理 {}", args.source.display());
    let result = orchestrator.run_batch(&mut sink, labels.as_mut(), &progress);

    let summary = orchestrator.close();
    summary.log();
    result?;
    info!("💾 结果保存在 {}", output.display());
    Ok(())
}
