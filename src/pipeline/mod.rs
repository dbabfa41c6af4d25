/// 处理流程 (Processing Pipeline)
///
/// - playback:     播放状态机
/// - stats:        帧率与资源统计
/// - orchestrator: 交互/批处理主循环
/// - still:        图片标注
pub mod orchestrator;
pub mod playback;
pub mod stats;
pub mod still;

pub use orchestrator::{CancelFlag, Display, Orchestrator, SessionSummary, Step};
pub use playback::{InputEvent, PlaybackCommand, PlaybackController, PlaybackMode, PlaybackState};
pub use stats::{DashboardStats, FpsMeter, ResourceProbe, StaticProbe, SystemProbe};
pub use still::{annotate_images, StillSummary};
