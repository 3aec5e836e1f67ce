use serde::{Deserialize, Serialize};

/// 無効値マーカー（座標・スコア共通）
pub const INVALID: f64 = f64::NAN;

/// 単一キーポイント（ピクセル座標）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    /// 信頼度スコア (0.0〜1.0)
    pub score: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, score: f64) -> Self {
        Self { x, y, score }
    }

    /// 座標・スコアとも無効値
    pub fn invalid() -> Self {
        Self {
            x: INVALID,
            y: INVALID,
            score: INVALID,
        }
    }

    /// 無効値マーカーを含まないか
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.score.is_finite()
    }

    /// 信頼度が閾値以上か（NaNは常にfalse）
    pub fn passes(&self, threshold: f64) -> bool {
        self.score >= threshold
    }
}

impl Default for Keypoint {
    fn default() -> Self {
        Self::invalid()
    }
}

/// 1フレーム・1人物分の検出結果
///
/// キーポイントは検出器のID順に並ぶ。`track_id` は検出器自身が
/// トラッキングを行う場合にのみ付与される。
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    pub keypoints: Vec<Keypoint>,
    pub track_id: Option<u32>,
}

impl Pose {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self {
            keypoints,
            track_id: None,
        }
    }

    /// (x, y) 配列と並行するスコア配列から構築
    ///
    /// 長さが一致することは呼び出し側の契約（[`crate::source`] で検証済み）。
    pub fn from_parts(coords: &[[f64; 2]], scores: &[f64]) -> Self {
        let keypoints = coords
            .iter()
            .zip(scores)
            .map(|(&[x, y], &score)| Keypoint::new(x, y, score))
            .collect();
        Self::new(keypoints)
    }

    pub fn with_track_id(mut self, track_id: Option<u32>) -> Self {
        self.track_id = track_id;
        self
    }

    /// 全キーポイントが無効値の姿勢
    pub fn invalid(len: usize) -> Self {
        Self::new(vec![Keypoint::invalid(); len])
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    /// IDでキーポイントを取得
    pub fn get(&self, id: usize) -> Option<&Keypoint> {
        self.keypoints.get(id)
    }

    /// 有効なキーポイント数
    pub fn valid_count(&self) -> usize {
        self.keypoints.iter().filter(|k| k.is_valid()).count()
    }

    /// 1つでも有効なキーポイントがあるか
    pub fn has_any_valid(&self) -> bool {
        self.keypoints.iter().any(|k| k.is_valid())
    }

    /// 有効なキーポイントの平均スコア。有効点がなければ None。
    pub fn mean_valid_score(&self) -> Option<f64> {
        let (sum, count) = self
            .keypoints
            .iter()
            .filter(|k| k.is_valid())
            .fold((0.0, 0usize), |(s, c), k| (s + k.score, c + 1));
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    /// 全キーポイントの平均スコア（無効値は除外しない生の平均）
    pub fn average_score(&self) -> f64 {
        if self.keypoints.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.keypoints.iter().map(|k| k.score).sum();
        sum / self.keypoints.len() as f64
    }
}

/// 検出器が出力する1フレーム分の生データ（JSON形式）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub keypoints: Vec<[f64; 2]>,
    pub scores: Vec<f64>,
    #[serde(default)]
    pub track_id: Option<u32>,
}

impl RawDetection {
    pub fn to_pose(&self) -> Pose {
        Pose::from_parts(&self.keypoints, &self.scores).with_track_id(self.track_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypoint_invalid_is_not_valid() {
        let kp = Keypoint::invalid();
        assert!(!kp.is_valid());
        assert!(!kp.passes(0.0));
    }

    #[test]
    fn test_keypoint_passes() {
        let kp = Keypoint::new(10.0, 20.0, 0.7);
        assert!(kp.passes(0.5));
        assert!(kp.passes(0.7));
        assert!(!kp.passes(0.8));
    }

    #[test]
    fn test_pose_from_parts() {
        let pose = Pose::from_parts(&[[1.0, 2.0], [3.0, 4.0]], &[0.9, 0.1]);
        assert_eq!(pose.len(), 2);
        assert_eq!(pose.get(1), Some(&Keypoint::new(3.0, 4.0, 0.1)));
        assert_eq!(pose.track_id, None);
    }

    #[test]
    fn test_mean_valid_score_ignores_invalid() {
        let mut pose = Pose::from_parts(&[[0.0, 0.0]; 3], &[0.8, 0.6, 0.1]);
        pose.keypoints[2] = Keypoint::invalid();
        assert!((pose.mean_valid_score().unwrap() - 0.7).abs() < 1e-12);
        assert_eq!(pose.valid_count(), 2);
    }

    #[test]
    fn test_mean_valid_score_empty() {
        let pose = Pose::invalid(4);
        assert_eq!(pose.mean_valid_score(), None);
        assert!(!pose.has_any_valid());
    }

    #[test]
    fn test_raw_detection_deserialize() {
        let json = r#"{"keypoints": [[1.0, 2.0]], "scores": [0.5]}"#;
        let raw: RawDetection = serde_json::from_str(json).unwrap();
        assert_eq!(raw.track_id, None);
        assert_eq!(raw.to_pose().keypoints[0], Keypoint::new(1.0, 2.0, 0.5));
    }
}
