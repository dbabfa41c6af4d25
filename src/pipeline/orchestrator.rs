//! 主循环 (Orchestrator)
//!
//! 单线程, 每轮严格按顺序: 读帧 → 检测跟踪 → 计数 → 渲染 → 显示/写出 → 输入。
//! 交互模式每轮等待一个输入事件 (有上限); 批处理模式不读输入, 流结束即退出。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use image::RgbImage;
use indexmap::IndexMap;
use indicatif::ProgressBar;
use tracing::{debug, info, warn};

use super::playback::{InputEvent, PlaybackCommand, PlaybackController, PlaybackMode, PlaybackState};
use super::stats::{DashboardStats, FpsMeter, ResourceProbe, StaticProbe};
use crate::detection::backend::DetectorTracker;
use crate::detection::counter::CountAggregator;
use crate::detection::types::Detection;
use crate::input::labels::LabelWriter;
use crate::input::sink::FrameSink;
use crate::input::source::{Frame, FrameSource};
use crate::renderer::AnnotationRenderer;

/// 显示窗口
pub trait Display {
    fn show(&mut self, frame: &RgbImage) -> Result<()>;

    /// 最多等待 `wait`, 返回至多一个输入事件
    fn poll_event(&mut self, wait: Duration) -> Option<InputEvent>;
}

/// 中断标志 (Ctrl-C)
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// 安装 Ctrl-C 处理器; 收到信号只置位, 由主循环在下一轮检查
    pub fn install_ctrlc(&self) -> Result<()> {
        let flag = self.clone();
        ctrlc::set_handler(move || {
            flag.cancel();
        })
        .context("安装 Ctrl-C 处理器失败")
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 一轮循环的结果
#[derive(Debug)]
pub struct Step {
    /// 本轮结束后的状态
    pub state: PlaybackState,
    /// 待显示/写出的标注帧; 本轮没有可显示内容时为 `None`
    pub frame: Option<RgbImage>,
    /// 活动帧的序号
    pub frame_index: Option<u64>,
    /// 本轮新读入并检测了一帧
    pub fresh: bool,
    pub detections: Vec<Detection>,
}

impl Step {
    fn empty(state: PlaybackState) -> Self {
        Self {
            state,
            frame: None,
            frame_index: None,
            fresh: false,
            detections: Vec::new(),
        }
    }
}

/// 会话结束时的汇总
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionSummary {
    pub frames_processed: u64,
    pub frame_errors: u64,
    pub loops: u32,
    pub interrupted: bool,
    pub counts: IndexMap<String, usize>,
}

impl SessionSummary {
    pub fn log(&self) {
        info!(
            "📊 共处理 {} 帧 (失败 {} 帧, 循环 {} 次){}",
            self.frames_processed,
            self.frame_errors,
            self.loops,
            if self.interrupted { ", 已中断" } else { "" }
        );
        if self.counts.is_empty() {
            info!("  未统计到目标");
        }
        for (class, count) in &self.counts {
            info!("  {}: {}", class, count);
        }
    }
}

pub struct Orchestrator<S: FrameSource> {
    source: S,
    engine: Box<dyn DetectorTracker>,
    counter: CountAggregator,
    renderer: AnnotationRenderer,
    controller: PlaybackController,
    probe: Box<dyn ResourceProbe>,
    fps: FpsMeter,
    cancel: CancelFlag,
    /// 最近一次成功读取的帧, 暂停时重复显示
    snapshot: Option<Frame>,
    summary: SessionSummary,
}

impl<S: FrameSource> Orchestrator<S> {
    pub fn new(
        source: S,
        engine: Box<dyn DetectorTracker>,
        renderer: AnnotationRenderer,
        controller: PlaybackController,
    ) -> Self {
        Self {
            source,
            engine,
            counter: CountAggregator::new(),
            renderer,
            controller,
            probe: Box::new(StaticProbe::default()),
            fps: FpsMeter::new(),
            cancel: CancelFlag::new(),
            snapshot: None,
            summary: SessionSummary::default(),
        }
    }

    pub fn with_probe(mut self, probe: Box<dyn ResourceProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> PlaybackState {
        self.controller.state()
    }

    pub fn counts(&self) -> IndexMap<String, usize> {
        self.counter.counts()
    }

    pub fn snapshot(&self) -> Option<&Frame> {
        self.snapshot.as_ref()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            counts: self.counter.counts(),
            ..self.summary.clone()
        }
    }

    /// 把一个输入事件交给状态机
    pub fn dispatch(&mut self, event: InputEvent) -> Option<PlaybackCommand> {
        let before = self.controller.state();
        let command = self.controller.handle(event);
        let after = self.controller.state();
        if before != after {
            info!("⏯️ {} → {}", before.as_str(), after.as_str());
        }
        command
    }

    /// 交互循环的一轮: 先处理上一轮收到的输入, 已停止则返回 `None`
    ///
    /// 窗口端 (同步或异步取输入) 都经由此处推进状态机。
    pub fn advance(&mut self, pending: Option<InputEvent>) -> Result<Option<Step>> {
        if let Some(event) = pending {
            self.dispatch(event);
        }
        if self.controller.is_stopped() {
            return Ok(None);
        }
        self.step().map(Some)
    }

    /// 执行一轮循环
    pub fn step(&mut self) -> Result<Step> {
        if self.cancel.is_cancelled() && !self.controller.is_stopped() {
            warn!("🛑 收到中断信号");
            self.summary.interrupted = true;
            self.controller.apply(PlaybackCommand::Quit);
        }

        match self.controller.state() {
            PlaybackState::Stopped => Ok(Step::empty(PlaybackState::Stopped)),
            PlaybackState::Running => self.step_running(),
            PlaybackState::Paused => self.step_paused(),
        }
    }

    fn step_running(&mut self) -> Result<Step> {
        let frame = match self.source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return self.end_of_stream(),
            Err(e) => {
                warn!("⚠️ 读取帧失败, 按流结束处理: {:#}", e);
                return self.end_of_stream();
            }
        };

        let detections = match self.engine.track(&frame) {
            Ok(detections) => detections,
            Err(e) => {
                warn!("⚠️ 第 {} 帧跳过检测: {}", frame.index, e);
                self.summary.frame_errors += 1;
                Vec::new()
            }
        };
        let added = self.counter.record(&detections);
        if added > 0 {
            debug!("第 {} 帧新增 {} 个目标", frame.index, added);
        }
        self.summary.frames_processed += 1;

        let stats = self.dashboard_stats();
        let annotated = self
            .renderer
            .render(&frame.image, &detections, self.controller.state(), &stats);
        let index = frame.index;
        self.snapshot = Some(frame);

        Ok(Step {
            state: self.controller.state(),
            frame: Some(annotated),
            frame_index: Some(index),
            fresh: true,
            detections,
        })
    }

    fn step_paused(&mut self) -> Result<Step> {
        if self.snapshot.is_none() {
            // 暂停启动: 先取第一帧用于显示, 再回到起点
            match self.source.read_frame() {
                Ok(Some(frame)) => {
                    self.snapshot = Some(frame);
                    self.source.rewind().context("帧源回到起点失败")?;
                }
                Ok(None) | Err(_) => {
                    warn!("⚠️ 输入为空, 结束会话");
                    self.controller.apply(PlaybackCommand::Quit);
                    return Ok(Step::empty(PlaybackState::Stopped));
                }
            }
        }

        let stats = self.dashboard_stats();
        let state = self.controller.state();
        let Some(frame) = self.snapshot.as_ref() else {
            return Ok(Step::empty(state));
        };
        let annotated = self.renderer.render(&frame.image, &[], state, &stats);
        Ok(Step {
            state,
            frame: Some(annotated),
            frame_index: Some(frame.index),
            fresh: false,
            detections: Vec::new(),
        })
    }

    fn end_of_stream(&mut self) -> Result<Step> {
        let state = self.controller.end_of_stream();
        if self.controller.mode() == PlaybackMode::Interactive && state == PlaybackState::Paused {
            self.source.rewind().context("帧源回到起点失败")?;
            self.summary.loops += 1;
            info!("🔁 播放结束, 回到起点并暂停");
        } else {
            info!("🏁 输入流结束");
        }
        Ok(Step::empty(state))
    }

    fn dashboard_stats(&mut self) -> DashboardStats {
        DashboardStats {
            fps: self.fps.tick(),
            cpu: self.probe.cpu_usage(),
            gpu: self.probe.gpu_usage(),
            counts: self.counter.counts(),
        }
    }

    /// 交互模式: 直到 `Stopped` 或窗口关闭
    pub fn run_interactive<D: Display>(
        &mut self,
        display: &mut D,
        poll_wait: Duration,
    ) -> Result<SessionSummary> {
        let mut pending = None;
        while let Some(step) = self.advance(pending.take())? {
            let Some(annotated) = step.frame else {
                continue;
            };
            display.show(&annotated)?;
            pending = display.poll_event(poll_wait);
        }
        Ok(self.summary())
    }

    /// 批处理模式: 逐帧写出, 流结束或中断时收尾
    ///
    /// 写出失败是致命错误; 中断时已写出的帧保持有效。
    pub fn run_batch(
        &mut self,
        sink: &mut dyn FrameSink,
        mut labels: Option<&mut LabelWriter>,
        progress: &ProgressBar,
    ) -> Result<SessionSummary> {
        while !self.controller.is_stopped() {
            let step = self.step()?;
            let (Some(annotated), Some(index)) = (step.frame, step.frame_index) else {
                continue;
            };
            sink.write_frame(&annotated)?;
            if let Some(writer) = labels.as_deref_mut() {
                writer.write_frame(index, &step.detections)?;
            }
            progress.inc(1);
        }

        sink.finish(!self.summary.interrupted)?;
        if self.summary.interrupted {
            progress.abandon_with_message("已中断");
        } else {
            progress.finish_with_message("完成");
        }
        Ok(self.summary())
    }

    /// 释放帧源
    pub fn close(self) -> SessionSummary {
        let summary = self.summary();
        drop(self.source);
        info!("✅ 资源已释放");
        summary
    }
}
