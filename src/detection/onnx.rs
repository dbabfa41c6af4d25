//! YOLOv8 ONNX 后端
//! 模型加载 → 预处理 → 推理 → 后处理(NMS) → ByteTrack

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use fast_image_resize as fr;
use image::RgbImage;
use ndarray::Array4;
use once_cell::sync::Lazy;
use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
use ort::session::Session;
use ort::value::Tensor;
use regex::Regex;
use tracing::{debug, info, warn};

use super::backend::{DetectorTracker, Device, PredictOptions};
use super::bytetrack::ByteTracker;
use super::tracker::Tracker;
use super::types::{BBox, ClassNames, Detection};
use crate::error::FrameError;
use crate::input::Frame;
use crate::non_max_suppression;
use crate::ui_config::MonitorConfig;

/// Ultralytics 导出的 `names` 元数据: `{0: 'person', 1: 'bicycle', ...}`
static NAMES_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(\d+)\s*:\s*['"]([^'"]*)['"]"#).expect("valid names regex"));

/// 解析模型元数据中的类别名称表
pub fn parse_names_metadata(raw: &str) -> ClassNames {
    let mut pairs: Vec<(usize, String)> = NAMES_PATTERN
        .captures_iter(raw)
        .filter_map(|cap| Some((cap[1].parse().ok()?, cap[2].to_string())))
        .collect();
    pairs.sort_by_key(|(id, _)| *id);

    let len = pairs.last().map_or(0, |(id, _)| id + 1);
    let mut names: Vec<String> = (0..len).map(|i| format!("class{}", i)).collect();
    for (id, name) in pairs {
        names[id] = name;
    }
    ClassNames::new(names)
}

/// 解析 `Auto` 设备: CUDA 可用则使用 GPU 0
fn resolve_device(device: Device) -> Device {
    match device {
        Device::Auto => {
            if matches!(CUDAExecutionProvider::default().is_available(), Ok(true)) {
                info!("🚀 检测到 CUDA, 使用 GPU 0");
                Device::Cuda(0)
            } else {
                info!("💻 未检测到 CUDA, 使用 CPU");
                Device::Cpu
            }
        }
        other => other,
    }
}

/// YOLOv8 检测模型
pub struct YoloOnnx {
    session: Session,
    names: ClassNames,
    inf_size: u32,
    device: Device,
    iou: f32,
}

impl YoloOnnx {
    pub fn load(model: &Path, device: Device, config: &MonitorConfig) -> Result<Self> {
        let device = resolve_device(device);
        info!("📦 加载模型 {} ({})", model.display(), device);

        let mut builder =
            Session::builder().map_err(|e| anyhow!("创建ONNX会话失败: {}", e))?;
        if let Device::Cuda(id) = device {
            builder = builder
                .with_execution_providers([CUDAExecutionProvider::default()
                    .with_device_id(id)
                    .build()])
                .map_err(|e| anyhow!("注册CUDA执行器失败: {}", e))?;
        }
        let session = builder
            .commit_from_file(model)
            .map_err(|e| anyhow!("加载模型失败 {}: {}", model.display(), e))?;

        let names = if !config.class_names.is_empty() {
            ClassNames::new(config.class_names.clone())
        } else {
            session
                .metadata()
                .ok()
                .and_then(|meta| meta.custom("names").ok().flatten())
                .map(|raw| parse_names_metadata(&raw))
                .unwrap_or_default()
        };
        if names.is_empty() {
            warn!("⚠️ 模型未携带类别名称, 使用 classN 命名");
        } else {
            info!("✅ 模型加载成功: {} 个类别", names.len());
        }

        Ok(Self {
            session,
            names,
            inf_size: config.inference_size,
            device,
            iou: config.nms_iou_threshold,
        })
    }

    /// RGB帧 → NCHW 张量 (拉伸缩放到 inf_size, 归一化到 0-1)
    fn preprocess(&self, image: &RgbImage) -> Result<Array4<f32>> {
        let size = self.inf_size;
        let src = fr::images::Image::from_vec_u8(
            image.width(),
            image.height(),
            image.as_raw().clone(),
            fr::PixelType::U8x3,
        )
        .context("构建缩放源图像失败")?;
        let mut dst = fr::images::Image::new(size, size, fr::PixelType::U8x3);
        fr::Resizer::new()
            .resize(
                &src,
                &mut dst,
                &fr::ResizeOptions::new()
                    .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
            )
            .context("图像缩放失败")?;

        let size = size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for (i, px) in dst.buffer().chunks_exact(3).enumerate() {
            let (y, x) = (i / size, i % size);
            for c in 0..3 {
                tensor[[0, c, y, x]] = px[c] as f32 / 255.0;
            }
        }
        Ok(tensor)
    }

    /// 检测一帧, 返回原图坐标下的检测框 (已NMS)
    pub fn detect(&mut self, image: &RgbImage, conf: f32, iou: f32) -> Result<Vec<BBox>> {
        let input = Tensor::from_array(self.preprocess(image)?)
            .map_err(|e| anyhow!("创建输入张量失败: {}", e))?;

        let outputs = self
            .session
            .run(ort::inputs![input])
            .map_err(|e| anyhow!("推理失败: {}", e))?;
        let (shape, data) = outputs["output0"]
            .try_extract_tensor::<f32>()
            .map_err(|e| anyhow!("读取输出张量失败: {}", e))?;

        // 输出形状 [1, 4 + nc, N]
        if shape.len() != 3 || shape[1] <= 4 {
            return Err(anyhow!("不支持的输出形状: {:?}", &shape[..]));
        }
        let rows = shape[1] as usize;
        let anchors = shape[2] as usize;
        let scale_x = image.width() as f32 / self.inf_size as f32;
        let scale_y = image.height() as f32 / self.inf_size as f32;

        let mut boxes = decode_predictions(data, rows, anchors, conf, scale_x, scale_y);
        non_max_suppression(&mut boxes, iou);
        debug!("检测到 {} 个目标", boxes.len());
        Ok(boxes)
    }

    pub fn names(&self) -> &ClassNames {
        &self.names
    }
}

/// 解码 YOLOv8 原始输出: 每列 [cx, cy, w, h, cls0, cls1, ...]
fn decode_predictions(
    data: &[f32],
    rows: usize,
    anchors: usize,
    conf: f32,
    scale_x: f32,
    scale_y: f32,
) -> Vec<BBox> {
    let at = |row: usize, i: usize| data[row * anchors + i];
    (0..anchors)
        .filter_map(|i| {
            let (class_id, score) = (4..rows)
                .map(|row| (row - 4, at(row, i)))
                .max_by(|a, b| a.1.total_cmp(&b.1))?;
            if score < conf {
                return None;
            }
            let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
            Some(BBox::new(
                (cx - w / 2.0) * scale_x,
                (cy - h / 2.0) * scale_y,
                (cx + w / 2.0) * scale_x,
                (cy + h / 2.0) * scale_y,
                score,
                class_id as u32,
            ))
        })
        .collect()
}

/// YOLOv8 + ByteTrack 组合后端
pub struct OnnxTracker {
    model: YoloOnnx,
    tracker: ByteTracker,
    conf: f32,
}

impl OnnxTracker {
    pub fn new(model: YoloOnnx, conf: f32, config: &MonitorConfig) -> Self {
        let tracker = ByteTracker::new(config.bytetrack_params(), config.kalman_params());
        Self {
            model,
            tracker,
            conf,
        }
    }
}

impl DetectorTracker for OnnxTracker {
    fn track(&mut self, frame: &Frame) -> Result<Vec<Detection>, FrameError> {
        let iou = self.model.iou;
        let boxes = self
            .model
            .detect(&frame.image, self.conf, iou)
            .map_err(|e| FrameError::Inference(format!("{:#}", e)))?;

        let outputs = self.tracker.update(&boxes);
        debug!("帧 {}: 活跃轨迹 {}", frame.index, self.tracker.track_count());

        let names = self.model.names();
        Ok(outputs
            .into_iter()
            .map(|out| {
                let class_name = names.name(out.bbox.class_id);
                Detection::new(out.bbox, class_name, out.track_id)
            })
            .collect())
    }

    fn predict(
        &mut self,
        image: &RgbImage,
        options: &PredictOptions,
    ) -> Result<Vec<Detection>, FrameError> {
        let boxes = self
            .model
            .detect(image, options.conf, options.iou)
            .map_err(|e| FrameError::Inference(format!("{:#}", e)))?;
        let names = self.model.names();
        Ok(boxes
            .into_iter()
            .filter(|b| options.keeps(b.class_id))
            .map(|b| {
                let class_name = names.name(b.class_id);
                Detection::new(b, class_name, None)
            })
            .collect())
    }

    fn class_names(&self) -> &ClassNames {
        self.model.names()
    }

    fn device(&self) -> Device {
        self.model.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names_metadata() {
        let names = parse_names_metadata("{0: 'car', 1: 'bus', 3: \"motorcycle\"}");
        assert_eq!(names.len(), 4);
        assert_eq!(names.name(0), "car");
        assert_eq!(names.name(2), "class2");
        assert_eq!(names.name(3), "motorcycle");
        assert!(parse_names_metadata("garbage").is_empty());
    }

    #[test]
    fn test_decode_predictions() {
        // 2 个类别, 3 个锚点
        let anchors = 3;
        #[rustfmt::skip]
        let data = vec![
            // cx
            100.0, 200.0, 300.0,
            // cy
            100.0, 200.0, 300.0,
            // w
            20.0, 20.0, 20.0,
            // h
            10.0, 10.0, 10.0,
            // cls0
            0.9, 0.1, 0.05,
            // cls1
            0.2, 0.6, 0.1,
        ];
        let boxes = decode_predictions(&data, 6, anchors, 0.25, 2.0, 1.0);
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].class_id, 0);
        assert_eq!(boxes[0].x1, 180.0);
        assert_eq!(boxes[0].x2, 220.0);
        assert_eq!(boxes[0].y1, 95.0);
        assert_eq!(boxes[1].class_id, 1);
        assert!((boxes[1].confidence - 0.6).abs() < 1e-6);
    }
}
