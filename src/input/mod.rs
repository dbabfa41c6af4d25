/// 视频输入输出 (Video Input/Output)
///
/// - FrameSource: 顺序读取帧, 可回到起点
/// - FrameSink:   标注结果逐帧写出
/// - labels:      逐帧标签文件读写
pub mod labels;
pub mod sink;
pub mod source;

pub use labels::{LabelLine, LabelWriter};
pub use sink::{read_manifest, FrameSink, ImageSequenceSink, SinkManifest};
pub use source::{
    is_image_file, list_images, Frame, FrameSource, ImageSequenceSource, MemorySource, SourceInfo,
};
