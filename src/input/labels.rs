//! 逐帧标签文件
//!
//! 每行一个目标: `class identity x1 y1 x2 y2`
//! - 类别名中的空格替换为 `_`
//! - 没有身份时写 `-`
//! - 坐标为整数像素
//!
//! 视频帧的标签文件名为 `frame_NNNNNN.txt` (从0开始)。

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use crate::detection::types::{BBox, Detection};

const FRAME_PREFIX: &str = "frame_";

/// 解析后的一行标签
#[derive(Clone, Debug, PartialEq)]
pub struct LabelLine {
    pub class_name: String,
    pub track_id: Option<u32>,
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl LabelLine {
    /// 转为检测框; 标签不保存置信度, 统一记为 1.0
    pub fn to_detection(&self, class_id: u32) -> Detection {
        let bbox = BBox::new(
            self.x1 as f32,
            self.y1 as f32,
            self.x2 as f32,
            self.y2 as f32,
            1.0,
            class_id,
        );
        Detection::new(bbox, self.class_name.clone(), self.track_id)
    }
}

pub fn format_line(det: &Detection) -> String {
    let (x1, y1, x2, y2) = det.bbox.to_pixels();
    let identity = det
        .track_id
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    format!(
        "{} {} {} {} {} {}",
        det.class_name.replace(' ', "_"),
        identity,
        x1,
        y1,
        x2,
        y2
    )
}

pub fn parse_line(line: &str) -> Result<LabelLine> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 6 {
        return Err(anyhow!("标签行应有6列, 实际 {}: {:?}", fields.len(), line));
    }
    let track_id = match fields[1] {
        "-" => None,
        id => Some(id.parse::<u32>().with_context(|| format!("无效身份: {}", id))?),
    };
    let coord = |i: usize| -> Result<i32> {
        fields[i]
            .parse::<i32>()
            .with_context(|| format!("无效坐标: {}", fields[i]))
    };
    Ok(LabelLine {
        class_name: fields[0].to_string(),
        track_id,
        x1: coord(2)?,
        y1: coord(3)?,
        x2: coord(4)?,
        y2: coord(5)?,
    })
}

/// 解析整份标签文件, 忽略空行
pub fn parse_file(path: &Path) -> Result<Vec<LabelLine>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("读取标签失败: {}", path.display()))?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("解析标签失败: {}", path.display()))
}

pub fn frame_file_name(index: u64) -> String {
    format!("{}{:06}.txt", FRAME_PREFIX, index)
}

/// `frame_000012.txt` → 12
pub fn parse_frame_index(file_name: &str) -> Option<u64> {
    file_name
        .strip_prefix(FRAME_PREFIX)?
        .strip_suffix(".txt")?
        .parse()
        .ok()
}

/// 标签写入器
pub struct LabelWriter {
    dir: PathBuf,
    files_written: u64,
}

impl LabelWriter {
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("创建标签目录失败: {}", dir.display()))?;
        Ok(Self {
            dir,
            files_written: 0,
        })
    }

    /// 写入一帧的标签; 没有目标时也写空文件, 保持与帧一一对应
    pub fn write_frame(&mut self, index: u64, detections: &[Detection]) -> Result<PathBuf> {
        self.write_named(&frame_file_name(index), detections)
    }

    /// 以指定文件名写入 (图片模式使用 `<图片名>.txt`)
    pub fn write_named(&mut self, file_name: &str, detections: &[Detection]) -> Result<PathBuf> {
        let path = self.dir.join(file_name);
        let mut text = String::new();
        for det in detections {
            text.push_str(&format_line(det));
            text.push('\n');
        }
        fs::write(&path, text).with_context(|| format!("写入标签失败: {}", path.display()))?;
        self.files_written += 1;
        Ok(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn files_written(&self) -> u64 {
        self.files_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line() {
        let bbox = BBox::new(10.4, 20.6, 50.0, 60.2, 0.9, 0);
        let tracked = Detection::new(bbox.clone(), "traffic light", Some(12));
        assert_eq!(format_line(&tracked), "traffic_light 12 10 21 50 60");

        let untracked = Detection::new(bbox, "car", None);
        assert_eq!(format_line(&untracked), "car - 10 21 50 60");
    }

    #[test]
    fn test_parse_line() {
        let line = parse_line("bus 3 1 2 30 40").unwrap();
        assert_eq!(line.class_name, "bus");
        assert_eq!(line.track_id, Some(3));
        assert_eq!((line.x1, line.y1, line.x2, line.y2), (1, 2, 30, 40));

        assert_eq!(parse_line("car - 0 0 5 5").unwrap().track_id, None);
        assert!(parse_line("car 1 0 0 5").is_err());
        assert!(parse_line("car x 0 0 5 5").is_err());
    }

    #[test]
    fn test_frame_file_names() {
        assert_eq!(frame_file_name(7), "frame_000007.txt");
        assert_eq!(parse_frame_index("frame_000007.txt"), Some(7));
        assert_eq!(parse_frame_index("image_01.txt"), None);
        assert_eq!(parse_frame_index("frame_000007.png"), None);
    }

    #[test]
    fn test_writer_writes_empty_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = LabelWriter::create(dir.path().join("labels")).unwrap();
        let det = Detection::new(BBox::new(0.0, 0.0, 8.0, 8.0, 0.7, 0), "car", Some(1));

        writer.write_frame(0, &[det]).unwrap();
        let empty = writer.write_frame(1, &[]).unwrap();

        assert_eq!(writer.files_written(), 2);
        assert_eq!(fs::read_to_string(empty).unwrap(), "");
        let lines = parse_file(&writer.dir().join("frame_000000.txt")).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].to_detection(0).track_id, Some(1));
    }
}
