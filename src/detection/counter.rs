//! 目标计数 (CountAggregator)
//!
//! 每个类别维护一个身份集合, 计数 = 集合大小。
//! 会话内只增不减, 暂停与循环播放都不会清空。

use std::collections::HashSet;

use indexmap::IndexMap;

use super::types::Detection;

/// 类别 → 已见身份集合
///
/// 类别按首次出现的顺序保存, 仪表盘按此顺序列出。
#[derive(Clone, Debug, Default)]
pub struct CountRegistry {
    classes: IndexMap<String, HashSet<u32>>,
}

impl CountRegistry {
    fn insert(&mut self, class_name: &str, track_id: u32) -> bool {
        match self.classes.get_mut(class_name) {
            Some(ids) => ids.insert(track_id),
            None => {
                self.classes
                    .insert(class_name.to_string(), HashSet::from([track_id]));
                true
            }
        }
    }

    /// 各类别的唯一身份数
    pub fn counts(&self) -> IndexMap<String, usize> {
        self.classes
            .iter()
            .map(|(class, ids)| (class.clone(), ids.len()))
            .collect()
    }
}

/// 计数聚合器: 唯一的写入方
#[derive(Clone, Debug, Default)]
pub struct CountAggregator {
    registry: CountRegistry,
}

impl CountAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一帧的检测结果, 返回新增的 (类别, 身份) 数量
    ///
    /// 没有身份的检测被忽略; 重复身份幂等。
    pub fn record(&mut self, detections: &[Detection]) -> usize {
        let mut added = 0;
        for det in detections {
            let Some(id) = det.track_id else {
                continue;
            };
            if self.registry.insert(&det.class_name, id) {
                added += 1;
            }
        }
        added
    }

    pub fn counts(&self) -> IndexMap<String, usize> {
        self.registry.counts()
    }
}
