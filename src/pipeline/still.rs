//! 图片标注 (predict 模式)
//!
//! 对单张图片或图片目录逐张检测, 结果不带身份, 不参与计数。

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::playback::PlaybackState;
use super::stats::DashboardStats;
use crate::detection::backend::{DetectorTracker, PredictOptions};
use crate::input::labels::LabelWriter;
use crate::input::source::list_images;
use crate::renderer::AnnotationRenderer;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StillSummary {
    pub images: usize,
    pub detections: usize,
    pub failed: usize,
}

/// 标注 `input` 中的图片, 写入 `output`; `save_txt` 时另写 `output/labels/<图片名>.txt`
pub fn annotate_images(
    engine: &mut dyn DetectorTracker,
    renderer: &AnnotationRenderer,
    input: &Path,
    output: &Path,
    options: &PredictOptions,
    save_txt: bool,
) -> Result<StillSummary> {
    let images = list_images(input)?;
    fs::create_dir_all(output)
        .with_context(|| format!("创建输出目录失败: {}", output.display()))?;
    let mut labels = if save_txt {
        Some(LabelWriter::create(output.join("labels"))?)
    } else {
        None
    };
    info!("🖼️ 共 {} 张图片", images.len());

    let stats = DashboardStats::default();
    let mut summary = StillSummary::default();
    for path in &images {
        let image = match image::open(path) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                warn!("⚠️ 无法读取 {}: {}", path.display(), e);
                summary.failed += 1;
                continue;
            }
        };
        let detections = engine.predict(&image, options).unwrap_or_else(|e| {
            warn!("⚠️ {} 检测失败: {}", path.display(), e);
            summary.failed += 1;
            Vec::new()
        });

        let annotated = renderer.render(&image, &detections, PlaybackState::Running, &stats);
        let out_path = output_path(output, path);
        annotated
            .save(&out_path)
            .with_context(|| format!("写入结果失败: {}", out_path.display()))?;

        if let Some(writer) = labels.as_mut() {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("image");
            writer.write_named(&format!("{}.txt", stem), &detections)?;
        }
        info!("  {} → {} 个目标", path.display(), detections.len());
        summary.images += 1;
        summary.detections += detections.len();
    }
    Ok(summary)
}

fn output_path(output: &Path, input: &Path) -> PathBuf {
    match input.file_name() {
        Some(name) => output.join(name),
        None => output.join("image.png"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::backend::Device;
    use crate::detection::types::{BBox, ClassNames, Detection};
    use crate::error::FrameError;
    use crate::input::Frame;
    use image::{Rgb, RgbImage};

    /// 每张图返回一个固定目标, 名称为 "bad" 的图片检测失败
    struct FixedEngine {
        names: ClassNames,
    }

    impl DetectorTracker for FixedEngine {
        fn track(&mut self, _frame: &Frame) -> Result<Vec<Detection>, FrameError> {
            unreachable!("still mode never tracks")
        }

        fn predict(
            &mut self,
            image: &RgbImage,
            options: &PredictOptions,
        ) -> Result<Vec<Detection>, FrameError> {
            if image.get_pixel(0, 0)[0] == 255 {
                return Err(FrameError::Inference("bad image".into()));
            }
            let bbox = BBox::new(2.0, 2.0, 20.0, 20.0, 0.8, 0);
            Ok(vec![Detection::new(bbox, "car", None)]
                .into_iter()
                .filter(|d| options.keeps(d.bbox.class_id))
                .collect())
        }

        fn class_names(&self) -> &ClassNames {
            &self.names
        }

        fn device(&self) -> Device {
            Device::Cpu
        }
    }

    #[test]
    fn test_annotate_directory_with_labels() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(32, 32, Rgb([0, 0, 0]))
            .save(input.path().join("a.png"))
            .unwrap();
        RgbImage::from_pixel(32, 32, Rgb([255, 0, 0]))
            .save(input.path().join("bad.png"))
            .unwrap();

        let mut engine = FixedEngine {
            names: ClassNames::new(vec!["car".into()]),
        };
        let renderer = AnnotationRenderer::new(None).with_dashboard(false);
        let summary = annotate_images(
            &mut engine,
            &renderer,
            input.path(),
            output.path(),
            &PredictOptions::default(),
            true,
        )
        .unwrap();

        assert_eq!(summary.images, 2);
        assert_eq!(summary.detections, 1);
        assert_eq!(summary.failed, 1);
        assert!(output.path().join("a.png").exists());
        assert!(output.path().join("bad.png").exists());
        let label = fs::read_to_string(output.path().join("labels/a.txt")).unwrap();
        assert_eq!(label, "car - 2 2 20 20\n");
        assert_eq!(
            fs::read_to_string(output.path().join("labels/bad.txt")).unwrap(),
            ""
        );
    }
}
