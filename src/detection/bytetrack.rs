//! ByteTrack 算法实现 (多类别)
//! ByteTrack: Simple and effective multi-object tracking
//!
//! 核心思想:
//! 1. 高低分检测框分开处理
//! 2. 高分框优先匹配 (IOU)
//! 3. 低分框救援丢失的轨迹
//! 4. 纯运动模型,无需外观特征
//!
//! 只在同一类别内匹配; 未能形成轨迹的低分框以 `track_id = None` 输出。

use serde::{Deserialize, Serialize};

use super::tracker::{compute_iou, KalmanBoxFilter, KalmanParams, TrackOutput, Tracker};
use super::types::BBox;

/// ByteTrack 参数
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct ByteTrackParams {
    pub max_lost_frames: u32,
    pub high_score_threshold: f32,
    pub low_score_threshold: f32,
    pub high_iou_threshold: f32,
    pub low_iou_threshold: f32,
}

impl Default for ByteTrackParams {
    fn default() -> Self {
        Self {
            max_lost_frames: 30,
            high_score_threshold: 0.5,
            low_score_threshold: 0.1,
            high_iou_threshold: 0.3,
            low_iou_threshold: 0.2,
        }
    }
}

/// 单条轨迹
#[derive(Clone, Debug)]
struct Track {
    id: u32,
    class_id: u32,
    kalman: KalmanBoxFilter,
    score: f32,
    frames_lost: u32,
}

impl Track {
    fn new(id: u32, bbox: &BBox, kalman_params: KalmanParams) -> Self {
        Self {
            id,
            class_id: bbox.class_id,
            kalman: KalmanBoxFilter::new(bbox, kalman_params),
            score: bbox.confidence,
            frames_lost: 0,
        }
    }

    fn update(&mut self, bbox: &BBox) {
        self.kalman.update(bbox);
        self.score = bbox.confidence;
        self.frames_lost = 0;
    }

    fn output(&self) -> TrackOutput {
        TrackOutput {
            bbox: self.kalman.state_bbox(self.score, self.class_id),
            track_id: Some(self.id),
        }
    }
}

/// ByteTrack 追踪器
pub struct ByteTracker {
    tracks: Vec<Track>,
    next_id: u32,
    params: ByteTrackParams,
    kalman_params: KalmanParams,
}

impl ByteTracker {
    pub fn new(params: ByteTrackParams, kalman_params: KalmanParams) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            params,
            kalman_params,
        }
    }

    /// IOU 贪心匹配 (仅同类别), 返回 (检测索引, 轨迹索引)
    fn match_detections(
        &self,
        detections: &[BBox],
        det_indices: &[usize],
        track_indices: &[usize],
        iou_threshold: f32,
    ) -> Vec<(usize, usize)> {
        let mut candidates = Vec::new();
        for &det_idx in det_indices {
            let det = &detections[det_idx];
            for &track_idx in track_indices {
                let track = &self.tracks[track_idx];
                if track.class_id != det.class_id {
                    continue;
                }
                let iou = compute_iou(det, &track.kalman.state_bbox(1.0, track.class_id));
                if iou >= iou_threshold {
                    candidates.push((1.0 - iou, det_idx, track_idx));
                }
            }
        }

        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut used_det = vec![false; detections.len()];
        let mut used_track = vec![false; self.tracks.len()];
        let mut assignments = Vec::new();
        for (_, det_idx, track_idx) in candidates {
            if !used_det[det_idx] && !used_track[track_idx] {
                used_det[det_idx] = true;
                used_track[track_idx] = true;
                assignments.push((det_idx, track_idx));
            }
        }
        assignments
    }
}

impl Default for ByteTracker {
    fn default() -> Self {
        Self::new(ByteTrackParams::default(), KalmanParams::default())
    }
}

impl Tracker for ByteTracker {
    /// ByteTrack 三步匹配
    fn update(&mut self, detections: &[BBox]) -> Vec<TrackOutput> {
        // 1. 所有轨迹先预测
        for track in &mut self.tracks {
            track.kalman.predict();
        }

        // 2. 分离高低分检测框
        let (high, low): (Vec<usize>, Vec<usize>) = (0..detections.len())
            .filter(|&i| detections[i].confidence >= self.params.low_score_threshold)
            .partition(|&i| detections[i].confidence >= self.params.high_score_threshold);

        let mut det_track: Vec<Option<usize>> = vec![None; detections.len()];
        let mut matched_track = vec![false; self.tracks.len()];

        // 3. 第一轮: 高分检测 + 所有轨迹
        let all_tracks: Vec<usize> = (0..self.tracks.len()).collect();
        for (det_idx, track_idx) in
            self.match_detections(detections, &high, &all_tracks, self.params.high_iou_threshold)
        {
            det_track[det_idx] = Some(track_idx);
            matched_track[track_idx] = true;
        }

        // 4. 第二轮: 低分检测 + 未匹配轨迹 (救援)
        let unmatched: Vec<usize> = all_tracks
            .iter()
            .copied()
            .filter(|&i| !matched_track[i])
            .collect();
        for (det_idx, track_idx) in
            self.match_detections(detections, &low, &unmatched, self.params.low_iou_threshold)
        {
            det_track[det_idx] = Some(track_idx);
            matched_track[track_idx] = true;
        }

        for (det_idx, track_idx) in det_track.iter().enumerate() {
            if let Some(track_idx) = track_idx {
                self.tracks[*track_idx].update(&detections[det_idx]);
            }
        }

        // 5. 未匹配轨迹标记丢失
        for (track_idx, matched) in matched_track.iter().enumerate() {
            if !matched {
                self.tracks[track_idx].frames_lost += 1;
            }
        }

        // 6. 未匹配的高分检测 → 新建轨迹; 其余按原样输出 (无ID)
        let mut outputs = Vec::with_capacity(detections.len());
        for (det_idx, det) in detections.iter().enumerate() {
            if det.confidence < self.params.low_score_threshold {
                continue;
            }
            match det_track[det_idx] {
                Some(track_idx) => outputs.push(self.tracks[track_idx].output()),
                None if det.confidence >= self.params.high_score_threshold => {
                    let track = Track::new(self.next_id, det, self.kalman_params);
                    self.next_id += 1;
                    outputs.push(track.output());
                    self.tracks.push(track);
                }
                None => outputs.push(TrackOutput {
                    bbox: det.clone(),
                    track_id: None,
                }),
            }
        }

        // 7. 删除丢失太久的轨迹
        let max_lost = self.params.max_lost_frames;
        self.tracks.retain(|t| t.frames_lost <= max_lost);

        outputs
    }

    fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn car(x: f32, conf: f32) -> BBox {
        BBox::new(x, 100.0, x + 60.0, 140.0, conf, 2)
    }

    #[test]
    fn test_identity_persists_across_frames() {
        let mut tracker = ByteTracker::default();
        let first = tracker.update(&[car(100.0, 0.9)]);
        assert_eq!(first.len(), 1);
        let id = first[0].track_id.expect("new high-score track");

        for step in 1..10 {
            let out = tracker.update(&[car(100.0 + step as f32 * 4.0, 0.9)]);
            assert_eq!(out[0].track_id, Some(id));
        }
        assert_eq!(tracker.track_count(), 1);
    }

    #[test]
    fn test_low_score_detection_is_untracked() {
        let mut tracker = ByteTracker::default();
        let out = tracker.update(&[car(100.0, 0.2)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].track_id, None);
        assert_eq!(tracker.track_count(), 0);
    }

    #[test]
    fn test_low_score_rescues_existing_track() {
        let mut tracker = ByteTracker::default();
        let id = tracker.update(&[car(100.0, 0.9)])[0].track_id;
        let out = tracker.update(&[car(102.0, 0.2)]);
        assert_eq!(out[0].track_id, id);
    }

    #[test]
    fn test_classes_do_not_share_tracks() {
        let mut tracker = ByteTracker::default();
        tracker.update(&[car(100.0, 0.9)]);
        let mut truck = car(100.0, 0.9);
        truck.class_id = 7;
        let out = tracker.update(&[truck]);
        assert_eq!(out[0].track_id, Some(2));
    }

    #[test]
    fn test_lost_track_is_dropped() {
        let params = ByteTrackParams {
            max_lost_frames: 2,
            ..Default::default()
        };
        let mut tracker = ByteTracker::new(params, KalmanParams::default());
        tracker.update(&[car(100.0, 0.9)]);
        for _ in 0..3 {
            tracker.update(&[]);
        }
        assert_eq!(tracker.track_count(), 0);

        // 新目标取新 ID, 不复用已删除的轨迹
        let out = tracker.update(&[car(300.0, 0.9)]);
        assert_eq!(out[0].track_id, Some(2));
    }
}
