/// 检测系统数据结构定义
/// Data structures for the detection/tracking boundary

// ========== 公共常量 ==========

/// YOLOv8推理输入尺寸
pub const INF_SIZE: u32 = 640;

// ========== 数据结构 ==========

/// 检测框 (Detection bounding box)
///
/// 坐标为原始帧像素坐标, 左上角 (x1, y1), 右下角 (x2, y2)
#[derive(Clone, Debug, PartialEq)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: u32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, class_id: u32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_id,
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// 整数像素坐标 (用于绘制与标签文件)
    pub fn to_pixels(&self) -> (i32, i32, i32, i32) {
        (
            self.x1.round() as i32,
            self.y1.round() as i32,
            self.x2.round() as i32,
            self.y2.round() as i32,
        )
    }
}

/// 单帧中的一个目标实例
///
/// `track_id` 为跟踪器分配的持久身份; 没有身份的检测照常绘制, 但不参与计数。
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    pub class_name: String,
    pub confidence: f32,
    pub track_id: Option<u32>,
}

impl Detection {
    pub fn new(bbox: BBox, class_name: impl Into<String>, track_id: Option<u32>) -> Self {
        let confidence = bbox.confidence;
        Self {
            bbox,
            class_name: class_name.into(),
            confidence,
            track_id,
        }
    }

    pub fn is_tracked(&self) -> bool {
        self.track_id.is_some()
    }

    /// 绘制用标签文字
    pub fn label(&self) -> String {
        match self.track_id {
            Some(id) => format!("{} ID:{} {:.2}", self.class_name, id, self.confidence),
            None => format!("{} untracked", self.class_name),
        }
    }
}

/// 类别名称表 (class_id → 名称)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassNames {
    names: Vec<String>,
}

impl ClassNames {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// 缺失的类别用 `class{N}` 兜底
    pub fn name(&self, class_id: u32) -> String {
        self.names
            .get(class_id as usize)
            .cloned()
            .unwrap_or_else(|| format!("class{}", class_id))
    }

    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.names.iter().position(|n| n == name).map(|i| i as u32)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_with_and_without_identity() {
        let bbox = BBox::new(10.0, 20.0, 50.0, 60.0, 0.876, 2);
        let tracked = Detection::new(bbox.clone(), "car", Some(7));
        assert_eq!(tracked.label(), "car ID:7 0.88");

        let untracked = Detection::new(bbox, "car", None);
        assert!(!untracked.is_tracked());
        assert_eq!(untracked.label(), "car untracked");
    }

    #[test]
    fn test_class_names_fallback() {
        let names = ClassNames::new(vec!["car".into(), "bus".into()]);
        assert_eq!(names.name(1), "bus");
        assert_eq!(names.name(9), "class9");
        assert_eq!(names.id_of("car"), Some(0));
        assert_eq!(names.id_of("truck"), None);
    }
}
