//! 标签回放后端
//!
//! 读取 `--save-txt` 保存的逐帧标签, 按帧序号重放检测结果,
//! 无需模型即可重新计数或重新渲染。

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::RgbImage;

use super::backend::{DetectorTracker, Device, PredictOptions};
use super::types::{ClassNames, Detection};
use crate::error::FrameError;
use crate::input::labels::{self, LabelLine};
use crate::input::Frame;

pub struct ReplayTracker {
    frames: BTreeMap<u64, Vec<Detection>>,
    names: ClassNames,
}

impl ReplayTracker {
    /// 打开标签目录; 目录下若有 `labels/` 子目录则使用它
    pub fn open(dir: &Path) -> Result<Self> {
        let nested = dir.join("labels");
        let dir = if nested.is_dir() { nested } else { dir.to_path_buf() };

        let mut files: BTreeMap<u64, Vec<LabelLine>> = BTreeMap::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("读取目录失败: {}", dir.display()))? {
            let path = entry?.path();
            let Some(index) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(labels::parse_frame_index)
            else {
                continue;
            };
            files.insert(index, labels::parse_file(&path)?);
        }
        if files.is_empty() {
            return Err(anyhow!("目录中没有逐帧标签: {}", dir.display()));
        }

        // 类别编号按首次出现顺序分配
        let mut names: Vec<String> = Vec::new();
        for line in files.values().flatten() {
            if !names.contains(&line.class_name) {
                names.push(line.class_name.clone());
            }
        }
        let names = ClassNames::new(names);

        let frames = files
            .into_iter()
            .map(|(index, lines)| {
                let detections = lines
                    .iter()
                    .map(|line| line.to_detection(names.id_of(&line.class_name).unwrap_or(0)))
                    .collect();
                (index, detections)
            })
            .collect();

        Ok(Self { frames, names })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl DetectorTracker for ReplayTracker {
    /// 没有记录的帧返回空列表
    fn track(&mut self, frame: &Frame) -> Result<Vec<Detection>, FrameError> {
        Ok(self.frames.get(&frame.index).cloned().unwrap_or_default())
    }

    fn predict(
        &mut self,
        _image: &RgbImage,
        _options: &PredictOptions,
    ) -> Result<Vec<Detection>, FrameError> {
        Err(FrameError::Inference(
            "标签回放后端不支持单张图片检测".to_string(),
        ))
    }

    fn class_names(&self) -> &ClassNames {
        &self.names
    }

    fn device(&self) -> Device {
        Device::Cpu
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_by_frame_index() {
        let dir = tempfile::tempdir().unwrap();
        let labels_dir = dir.path().join("labels");
        fs::create_dir(&labels_dir).unwrap();
        fs::write(labels_dir.join("frame_000000.txt"), "bus 4 0 0 10 10\n").unwrap();
        fs::write(
            labels_dir.join("frame_000002.txt"),
            "car 1 5 5 20 20\ncar - 30 30 40 40\n",
        )
        .unwrap();
        fs::write(labels_dir.join("readme.md"), "not a label").unwrap();

        let mut replay = ReplayTracker::open(dir.path()).unwrap();
        assert_eq!(replay.frame_count(), 2);
        assert_eq!(replay.class_names().as_slice(), ["bus", "car"]);

        let frame = |index| Frame::new(index, RgbImage::new(4, 4));
        let first = replay.track(&frame(0)).unwrap();
        assert_eq!(first[0].class_name, "bus");
        assert_eq!(first[0].track_id, Some(4));

        assert!(replay.track(&frame(1)).unwrap().is_empty());

        let third = replay.track(&frame(2)).unwrap();
        assert_eq!(third.len(), 2);
        assert_eq!(third[0].bbox.class_id, 1);
        assert_eq!(third[1].track_id, None);

        assert!(replay.track(&frame(99)).unwrap().is_empty());
    }

    #[test]
    fn test_empty_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ReplayTracker::open(dir.path()).is_err());
    }
}
