use crate::config::PoseConfig;

use super::keypoint::{Keypoint, Pose};

/// 信頼度による人物単位のゲート
///
/// 1. スコアが `keypoint_threshold` 未満のキーポイントを無効化
/// 2. 残った有効点が `number_threshold × 総数` 未満、または有効点の平均スコアが
///    `average_threshold` 未満なら、その人物全体を無効化
///
/// 有効点が0個の人物は平均を計算せず無効化する。
#[derive(Debug, Clone, Copy)]
pub struct FrameGate {
    keypoint_threshold: f64,
    number_threshold: f64,
    average_threshold: f64,
}

impl FrameGate {
    pub fn new(keypoint_threshold: f64, number_threshold: f64, average_threshold: f64) -> Self {
        Self {
            keypoint_threshold,
            number_threshold,
            average_threshold,
        }
    }

    pub fn from_config(config: &PoseConfig) -> Self {
        Self::new(
            config.keypoint_likelihood_threshold,
            config.keypoint_number_threshold,
            config.average_likelihood_threshold,
        )
    }

    /// 1人分のゲート。入力は変更しない。
    pub fn apply(&self, pose: &Pose) -> Pose {
        let keypoints: Vec<Keypoint> = pose
            .keypoints
            .iter()
            .map(|kp| {
                if kp.passes(self.keypoint_threshold) {
                    *kp
                } else {
                    Keypoint::invalid()
                }
            })
            .collect();
        let gated = Pose {
            keypoints,
            track_id: pose.track_id,
        };

        let total = gated.len();
        let good = gated.valid_count();
        let enough_keypoints = (good as f64) >= self.number_threshold * total as f64;
        let enough_score = gated
            .mean_valid_score()
            .is_some_and(|mean| mean >= self.average_threshold);

        if good > 0 && enough_keypoints && enough_score {
            gated
        } else {
            Pose::invalid(total).with_track_id(pose.track_id)
        }
    }

    /// 1フレーム内の全候補にゲートを適用
    pub fn apply_frame(&self, poses: &[Pose]) -> Vec<Pose> {
        poses.iter().map(|p| self.apply(p)).collect()
    }
}
