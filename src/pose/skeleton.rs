use serde::{Deserialize, Serialize};

use super::keypoint::Pose;

/// 左右の区別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
    Midline,
}

/// 骨格の1ノード
///
/// `id` は検出器出力配列のインデックス。`None` のノードは木構造上の
/// 接続点のみで、キーポイントとしては出力されない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Joint {
    pub name: &'static str,
    pub id: Option<usize>,
    pub side: Side,
    pub parent: Option<&'static str>,
}

const fn joint(
    name: &'static str,
    id: Option<usize>,
    side: Side,
    parent: Option<&'static str>,
) -> Joint {
    Joint {
        name,
        id,
        side,
        parent,
    }
}

use Side::{Left as L, Midline as M, Right as R};

/// HALPE_26 (全身 + 足)。目・耳 (id 1〜4) は骨格に含まれない。
const HALPE_26_JOINTS: [Joint; 22] = [
    joint("Hip", Some(19), M, None),
    joint("RHip", Some(12), R, Some("Hip")),
    joint("RKnee", Some(14), R, Some("RHip")),
    joint("RAnkle", Some(16), R, Some("RKnee")),
    joint("RBigToe", Some(21), R, Some("RAnkle")),
    joint("RSmallToe", Some(23), R, Some("RBigToe")),
    joint("RHeel", Some(25), R, Some("RAnkle")),
    joint("LHip", Some(11), L, Some("Hip")),
    joint("LKnee", Some(13), L, Some("LHip")),
    joint("LAnkle", Some(15), L, Some("LKnee")),
    joint("LBigToe", Some(20), L, Some("LAnkle")),
    joint("LSmallToe", Some(22), L, Some("LBigToe")),
    joint("LHeel", Some(24), L, Some("LAnkle")),
    joint("Neck", Some(18), M, Some("Hip")),
    joint("Head", Some(17), M, Some("Neck")),
    joint("Nose", Some(0), M, Some("Head")),
    joint("RShoulder", Some(6), R, Some("Neck")),
    joint("RElbow", Some(8), R, Some("RShoulder")),
    joint("RWrist", Some(10), R, Some("RElbow")),
    joint("LShoulder", Some(5), L, Some("Neck")),
    joint("LElbow", Some(7), L, Some("LShoulder")),
    joint("LWrist", Some(9), L, Some("LElbow")),
];

/// COCO_17 (体幹のみ)。Hip/Neck は検出器に存在しない合成ノード。
const COCO_17_JOINTS: [Joint; 15] = [
    joint("Hip", None, M, None),
    joint("RHip", Some(12), R, Some("Hip")),
    joint("RKnee", Some(14), R, Some("RHip")),
    joint("RAnkle", Some(16), R, Some("RKnee")),
    joint("LHip", Some(11), L, Some("Hip")),
    joint("LKnee", Some(13), L, Some("LHip")),
    joint("LAnkle", Some(15), L, Some("LKnee")),
    joint("Neck", None, M, Some("Hip")),
    joint("Nose", Some(0), M, Some("Neck")),
    joint("RShoulder", Some(6), R, Some("Neck")),
    joint("RElbow", Some(8), R, Some("RShoulder")),
    joint("RWrist", Some(10), R, Some("RElbow")),
    joint("LShoulder", Some(5), L, Some("Neck")),
    joint("LElbow", Some(7), L, Some("LShoulder")),
    joint("LWrist", Some(9), L, Some("LElbow")),
];

/// BODY_43 (HALPE_26 + 脊柱17点)
const BODY_43_JOINTS: [Joint; 39] = [
    joint("Hip", Some(19), M, None),
    joint("RHip", Some(12), R, Some("Hip")),
    joint("RKnee", Some(14), R, Some("RHip")),
    joint("RAnkle", Some(16), R, Some("RKnee")),
    joint("RBigToe", Some(21), R, Some("RAnkle")),
    joint("RSmallToe", Some(23), R, Some("RBigToe")),
    joint("RHeel", Some(25), R, Some("RAnkle")),
    joint("LHip", Some(11), L, Some("Hip")),
    joint("LKnee", Some(13), L, Some("LHip")),
    joint("LAnkle", Some(15), L, Some("LKnee")),
    joint("LBigToe", Some(20), L, Some("LAnkle")),
    joint("LSmallToe", Some(22), L, Some("LBigToe")),
    joint("LHeel", Some(24), L, Some("LAnkle")),
    joint("Neck", Some(18), M, Some("Hip")),
    joint("Head", Some(17), M, Some("Neck")),
    joint("Nose", Some(0), M, Some("Head")),
    joint("RShoulder", Some(6), R, Some("Neck")),
    joint("RElbow", Some(8), R, Some("RShoulder")),
    joint("RWrist", Some(10), R, Some("RElbow")),
    joint("LShoulder", Some(5), L, Some("Neck")),
    joint("LElbow", Some(7), L, Some("LShoulder")),
    joint("LWrist", Some(9), L, Some("LElbow")),
    joint("Lumbar5", Some(26), M, Some("Hip")),
    joint("Lumbar4", Some(27), M, Some("Lumbar5")),
    joint("Lumbar3", Some(28), M, Some("Lumbar4")),
    joint("Lumbar2", Some(29), M, Some("Lumbar3")),
    joint("Lumbar1", Some(30), M, Some("Lumbar2")),
    joint("Thoracic12", Some(31), M, Some("Lumbar1")),
    joint("Thoracic11", Some(32), M, Some("Thoracic12")),
    joint("Thoracic10", Some(33), M, Some("Thoracic11")),
    joint("Thoracic9", Some(34), M, Some("Thoracic10")),
    joint("Thoracic8", Some(35), M, Some("Thoracic9")),
    joint("Thoracic7", Some(36), M, Some("Thoracic8")),
    joint("Thoracic6", Some(37), M, Some("Thoracic7")),
    joint("Thoracic5", Some(38), M, Some("Thoracic6")),
    joint("Thoracic4", Some(39), M, Some("Thoracic5")),
    joint("Thoracic3", Some(40), M, Some("Thoracic4")),
    joint("Thoracic2", Some(41), M, Some("Thoracic3")),
    joint("Thoracic1", Some(42), M, Some("Thoracic2")),
];

/// COCO_133 (全身 + 足 + 手)。顔68点と指の関節は骨格に含まれない。
/// Hip/Neck は COCO_17 と同じく合成ノード。
const COCO_133_JOINTS: [Joint; 27] = [
    joint("Hip", None, M, None),
    joint("RHip", Some(12), R, Some("Hip")),
    joint("RKnee", Some(14), R, Some("RHip")),
    joint("RAnkle", Some(16), R, Some("RKnee")),
    joint("RBigToe", Some(20), R, Some("RAnkle")),
    joint("RSmallToe", Some(21), R, Some("RBigToe")),
    joint("RHeel", Some(22), R, Some("RAnkle")),
    joint("LHip", Some(11), L, Some("Hip")),
    joint("LKnee", Some(13), L, Some("LHip")),
    joint("LAnkle", Some(15), L, Some("LKnee")),
    joint("LBigToe", Some(17), L, Some("LAnkle")),
    joint("LSmallToe", Some(18), L, Some("LBigToe")),
    joint("LHeel", Some(19), L, Some("LAnkle")),
    joint("Neck", None, M, Some("Hip")),
    joint("Nose", Some(0), M, Some("Neck")),
    joint("RShoulder", Some(6), R, Some("Neck")),
    joint("RElbow", Some(8), R, Some("RShoulder")),
    joint("RWrist", Some(10), R, Some("RElbow")),
    joint("RThumb", Some(114), R, Some("RWrist")),
    joint("RIndex", Some(117), R, Some("RWrist")),
    joint("RPinky", Some(129), R, Some("RWrist")),
    joint("LShoulder", Some(5), L, Some("Neck")),
    joint("LElbow", Some(7), L, Some("LShoulder")),
    joint("LWrist", Some(9), L, Some("LElbow")),
    joint("LThumb", Some(93), L, Some("LWrist")),
    joint("LIndex", Some(96), L, Some("LWrist")),
    joint("LPinky", Some(108), L, Some("LWrist")),
];

/// ポーズモデルごとの固定骨格
#[derive(Debug)]
pub struct Skeleton {
    pub model: PoseModel,
    /// 検出器が1人あたりに出力するキーポイント数
    pub raw_count: usize,
    pub joints: &'static [Joint],
}

static HALPE_26: Skeleton = Skeleton {
    model: PoseModel::Halpe26,
    raw_count: 26,
    joints: &HALPE_26_JOINTS,
};

static COCO_17: Skeleton = Skeleton {
    model: PoseModel::Coco17,
    raw_count: 17,
    joints: &COCO_17_JOINTS,
};

static BODY_43: Skeleton = Skeleton {
    model: PoseModel::Body43,
    raw_count: 43,
    joints: &BODY_43_JOINTS,
};

static COCO_133: Skeleton = Skeleton {
    model: PoseModel::Coco133,
    raw_count: 133,
    joints: &COCO_133_JOINTS,
};

/// 対応ポーズモデル
///
/// BODY_53 は BODY_43、WHOLEBODY_150 は COCO_133 と同じ骨格を使う。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PoseModel {
    #[default]
    #[serde(rename = "HALPE_26", alias = "halpe_26")]
    Halpe26,
    #[serde(rename = "COCO_17", alias = "coco_17")]
    Coco17,
    #[serde(rename = "BODY_43", alias = "body_43", alias = "BODY_53", alias = "body_53")]
    Body43,
    #[serde(
        rename = "COCO_133",
        alias = "coco_133",
        alias = "WHOLEBODY_150",
        alias = "wholebody_150"
    )]
    Coco133,
}

impl PoseModel {
    pub fn skeleton(self) -> &'static Skeleton {
        match self {
            Self::Halpe26 => &HALPE_26,
            Self::Coco17 => &COCO_17,
            Self::Body43 => &BODY_43,
            Self::Coco133 => &COCO_133,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Halpe26 => "HALPE_26",
            Self::Coco17 => "COCO_17",
            Self::Body43 => "BODY_43",
            Self::Coco133 => "COCO_133",
        }
    }
}

/// 左右判定に使うランドマークの位置（出力キーポイント順のインデックス）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FootLandmarks {
    pub left_toe: usize,
    pub left_heel: usize,
    pub right_toe: usize,
    pub right_heel: usize,
}

impl Skeleton {
    /// 出力対象（検出器IDを持つ）ノードを木の走査順で返す
    pub fn keypoints(&self) -> impl Iterator<Item = &'static Joint> {
        self.joints.iter().filter(|j| j.id.is_some())
    }

    /// 出力キーポイント数
    pub fn len(&self) -> usize {
        self.keypoints().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keypoint_names(&self) -> Vec<&'static str> {
        self.keypoints().map(|j| j.name).collect()
    }

    /// 出力順の検出器ID
    pub fn keypoint_ids(&self) -> Vec<usize> {
        self.keypoints().filter_map(|j| j.id).collect()
    }

    /// 出力順での位置
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.keypoints().position(|j| j.name == name)
    }

    pub fn joint(&self, name: &str) -> Option<&'static Joint> {
        self.joints.iter().find(|j| j.name == name)
    }

    /// 親子接続 (親, 子)。合成ノードを含む接続は除外する。
    pub fn connections(&self) -> Vec<(&'static str, &'static str)> {
        self.joints
            .iter()
            .filter(|j| j.id.is_some())
            .filter_map(|j| {
                let parent = self.joint(j.parent?)?;
                parent.id.map(|_| (parent.name, j.name))
            })
            .collect()
    }

    /// つま先・かかとのランドマークを持つモデルのみ Some
    pub fn foot_landmarks(&self) -> Option<FootLandmarks> {
        Some(FootLandmarks {
            left_toe: self.index_of("LBigToe")?,
            left_heel: self.index_of("LHeel")?,
            right_toe: self.index_of("RBigToe")?,
            right_heel: self.index_of("RHeel")?,
        })
    }

    /// 検出器ID順の姿勢を出力キーポイント順の (X, Y, score) 列に変換
    pub fn select(&self, pose: &Pose) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let n = self.len();
        let mut xs = Vec::with_capacity(n);
        let mut ys = Vec::with_capacity(n);
        let mut scores = Vec::with_capacity(n);
        for id in self.keypoint_ids() {
            let kp = pose.get(id).copied().unwrap_or_default();
            xs.push(kp.x);
            ys.push(kp.y);
            scores.push(kp.score);
        }
        (xs, ys, scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Keypoint;

    #[test]
    fn test_halpe_26_keypoints() {
        let sk = PoseModel::Halpe26.skeleton();
        assert_eq!(sk.len(), 22);
        assert_eq!(sk.keypoint_names()[0], "Hip");
        assert_eq!(sk.keypoint_ids()[0], 19);
        assert_eq!(sk.index_of("LWrist"), Some(21));
        assert!(sk.keypoint_ids().iter().all(|&id| id < sk.raw_count));
    }

    #[test]
    fn test_coco_17_excludes_synthetic_nodes() {
        let sk = PoseModel::Coco17.skeleton();
        assert_eq!(sk.len(), 13);
        assert_eq!(sk.index_of("Hip"), None);
        assert_eq!(sk.index_of("Neck"), None);
        assert!(sk.joint("Neck").is_some());
        assert!(sk.foot_landmarks().is_none());
    }

    #[test]
    fn test_body_43_spine_is_midline() {
        let sk = PoseModel::Body43.skeleton();
        assert_eq!(sk.len(), 39);
        assert_eq!(sk.joint("Lumbar5").unwrap().side, Side::Midline);
        assert_eq!(sk.joint("LHip").unwrap().side, Side::Left);
    }

    #[test]
    fn test_ids_are_unique() {
        for model in [PoseModel::Halpe26, PoseModel::Coco17, PoseModel::Body43, PoseModel::Coco133] {
            let mut ids = model.skeleton().keypoint_ids();
            let n = ids.len();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), n, "{}", model.name());
        }
    }

    #[test]
    fn test_connections_skip_synthetic_parent() {
        let sk = PoseModel::Coco17.skeleton();
        let conns = sk.connections();
        assert!(conns.contains(&("RHip", "RKnee")));
        assert!(!conns.iter().any(|(p, _)| *p == "Neck" || *p == "Hip"));
    }

    #[test]
    fn test_foot_landmarks_halpe() {
        let fl = PoseModel::Halpe26.skeleton().foot_landmarks().unwrap();
        assert_eq!(fl.right_toe, 4);
        assert_eq!(fl.right_heel, 6);
        assert_eq!(fl.left_toe, 10);
        assert_eq!(fl.left_heel, 12);
    }

    #[test]
    fn test_select_reorders_by_skeleton() {
        let sk = PoseModel::Halpe26.skeleton();
        let mut kps = vec![Keypoint::new(0.0, 0.0, 0.5); 26];
        kps[19] = Keypoint::new(100.0, 200.0, 0.9);
        let (xs, ys, scores) = sk.select(&Pose::new(kps));
        assert_eq!(xs.len(), 22);
        assert_eq!((xs[0], ys[0], scores[0]), (100.0, 200.0, 0.9));
    }

    #[test]
    fn test_pose_model_deserialize() {
        #[derive(Deserialize)]
        struct W {
            m: PoseModel,
        }
        let w: W = toml::from_str("m = \"BODY_43\"").unwrap();
        assert_eq!(w.m, PoseModel::Body43);
        let w: W = toml::from_str("m = \"BODY_53\"").unwrap();
        assert_eq!(w.m, PoseModel::Body43);
        let w: W = toml::from_str("m = \"WHOLEBODY_150\"").unwrap();
        assert_eq!(w.m, PoseModel::Coco133);
        assert!(toml::from_str::<W>("m = \"HAND_21\"").is_err());
    }

    #[test]
    fn test_coco_133_body_feet_hands() {
        let sk = PoseModel::Coco133.skeleton();
        assert_eq!(sk.raw_count, 133);
        assert_eq!(sk.len(), 25);
        assert_eq!(sk.index_of("Hip"), None);
        assert!(sk.keypoint_ids().iter().all(|&id| id < sk.raw_count));
        assert_eq!(sk.index_of("RIndex"), Some(17));
        assert_eq!(sk.joint("LPinky").unwrap().side, Side::Left);

        let fl = sk.foot_landmarks().unwrap();
        assert_eq!(fl.right_toe, 3);
        assert_eq!(fl.right_heel, 5);
        assert_eq!(fl.left_toe, 9);
        assert_eq!(fl.left_heel, 11);
        // 検出器IDは 17〜19 が左足、20〜22 が右足
        assert_eq!(sk.keypoint_ids()[fl.right_toe], 20);
        assert_eq!(sk.keypoint_ids()[fl.left_heel], 19);
    }
}
