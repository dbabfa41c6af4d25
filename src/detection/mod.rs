/// 检测系统 (Detection System)
///
/// - types:     检测框/检测结果/类别名称
/// - backend:   DetectorTracker 接口与后端选择
/// - onnx:      YOLOv8 ONNX + ByteTrack 后端
/// - replay:    逐帧标签回放后端
/// - tracker:   卡尔曼滤波与跟踪器接口
/// - bytetrack: ByteTrack 多目标跟踪
/// - counter:   按类别的唯一身份计数
pub mod backend;
pub mod bytetrack;
pub mod counter;
pub mod onnx;
pub mod replay;
pub mod tracker;
pub mod types;

pub use backend::{open_backend, DetectorTracker, Device, PredictOptions};
pub use bytetrack::{ByteTrackParams, ByteTracker};
pub use counter::{CountAggregator, CountRegistry};
pub use replay::ReplayTracker;
pub use tracker::{KalmanParams, Tracker};
pub use types::{BBox, ClassNames, Detection};
