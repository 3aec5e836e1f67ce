//! 関節角・セグメント角
//!
//! 角度は画像座標（Y下向き）上で、向き正規化済みのXを使って計算する。

use crate::error::ConfigError;
use crate::pose::{Skeleton, INVALID};

/// 角度の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleKind {
    /// 3〜4点で定義される関節角
    Joint,
    /// 2点で定義される水平に対するセグメント角
    Segment,
}

/// 角度カタログの1項目
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleSpec {
    pub name: &'static str,
    pub keypoints: &'static [&'static str],
    pub kind: AngleKind,
    pub offset: f64,
    pub scale: f64,
    /// 骨盤・体幹・肩: |X| を使い (−90°, 90°] に折り返す
    pub midline: bool,
}

const fn joint_angle(name: &'static str, keypoints: &'static [&'static str], offset: f64, scale: f64) -> AngleSpec {
    AngleSpec {
        name,
        keypoints,
        kind: AngleKind::Joint,
        offset,
        scale,
        midline: false,
    }
}

const fn segment_angle(name: &'static str, keypoints: &'static [&'static str], midline: bool) -> AngleSpec {
    AngleSpec {
        name,
        keypoints,
        kind: AngleKind::Segment,
        offset: 0.0,
        scale: -1.0,
        midline,
    }
}

pub static ANGLE_CATALOGUE: [AngleSpec; 28] = [
    // 関節角
    joint_angle("right ankle", &["RKnee", "RAnkle", "RBigToe", "RHeel"], 90.0, 1.0),
    joint_angle("left ankle", &["LKnee", "LAnkle", "LBigToe", "LHeel"], 90.0, 1.0),
    joint_angle("right knee", &["RAnkle", "RKnee", "RHip"], -180.0, 1.0),
    joint_angle("left knee", &["LAnkle", "LKnee", "LHip"], -180.0, 1.0),
    joint_angle("right hip", &["RKnee", "RHip", "Hip", "Neck"], 0.0, -1.0),
    joint_angle("left hip", &["LKnee", "LHip", "Hip", "Neck"], 0.0, -1.0),
    joint_angle("right shoulder", &["RElbow", "RShoulder", "Hip", "Neck"], 0.0, -1.0),
    joint_angle("left shoulder", &["LElbow", "LShoulder", "Hip", "Neck"], 0.0, -1.0),
    joint_angle("right elbow", &["RWrist", "RElbow", "RShoulder"], 180.0, -1.0),
    joint_angle("left elbow", &["LWrist", "LElbow", "LShoulder"], 180.0, -1.0),
    joint_angle("right wrist", &["RElbow", "RWrist", "RIndex"], -180.0, 1.0),
    joint_angle("left wrist", &["LElbow", "LWrist", "LIndex"], -180.0, 1.0),
    // セグメント角
    segment_angle("right foot", &["RBigToe", "RHeel"], false),
    segment_angle("left foot", &["LBigToe", "LHeel"], false),
    segment_angle("right shank", &["RAnkle", "RKnee"], false),
    segment_angle("left shank", &["LAnkle", "LKnee"], false),
    segment_angle("right thigh", &["RKnee", "RHip"], false),
    segment_angle("left thigh", &["LKnee", "LHip"], false),
    segment_angle("pelvis", &["LHip", "RHip"], true),
    segment_angle("trunk", &["Neck", "Hip"], true),
    segment_angle("shoulders", &["LShoulder", "RShoulder"], true),
    segment_angle("head", &["Head", "Neck"], false),
    segment_angle("right arm", &["RElbow", "RShoulder"], false),
    segment_angle("left arm", &["LElbow", "LShoulder"], false),
    segment_angle("right forearm", &["RWrist", "RElbow"], false),
    segment_angle("left forearm", &["LWrist", "LElbow"], false),
    segment_angle("right hand", &["RIndex", "RWrist"], false),
    segment_angle("left hand", &["LIndex", "LWrist"], false),
];

/// 名前（大文字小文字を区別しない）でカタログを検索
pub fn find_angle(name: &str) -> Option<&'static AngleSpec> {
    let name = name.trim().to_lowercase();
    ANGLE_CATALOGUE.iter().find(|a| a.name == name)
}

pub fn joint_angle_names() -> Vec<&'static str> {
    ANGLE_CATALOGUE
        .iter()
        .filter(|a| a.kind == AngleKind::Joint)
        .map(|a| a.name)
        .collect()
}

pub fn segment_angle_names() -> Vec<&'static str> {
    ANGLE_CATALOGUE
        .iter()
        .filter(|a| a.kind == AngleKind::Segment)
        .map(|a| a.name)
        .collect()
}

const MIN_VECTOR_NORM: f64 = 1e-9;

fn direction(dx: f64, dy: f64) -> Option<f64> {
    // NaN もここで弾かれる
    if (dx * dx + dy * dy).sqrt() > MIN_VECTOR_NORM {
        Some(dy.atan2(dx))
    } else {
        None
    }
}

/// 2〜4点から平面角（度）を計算
///
/// - 2点: (p0 − p1) の水平からの角度
/// - 3点: (p0 − p1) と (p2 − p1) のなす角
/// - 4点: (p1 − p0) と (p3 − p2) のなす角
///
/// 点数が範囲外、NaN、長さ0のベクトルは無効値を返す。
pub fn points_to_angle(points: &[(f64, f64)]) -> f64 {
    let (u, v) = match points {
        [p0, p1] => ((p0.0 - p1.0, p0.1 - p1.1), (1.0, 0.0)),
        [p0, p1, p2] => ((p0.0 - p1.0, p0.1 - p1.1), (p2.0 - p1.0, p2.1 - p1.1)),
        [p0, p1, p2, p3] => ((p1.0 - p0.0, p1.1 - p0.1), (p3.0 - p2.0, p3.1 - p2.1)),
        _ => return INVALID,
    };
    match (direction(u.0, u.1), direction(v.0, v.1)) {
        (Some(a), Some(b)) => (a - b).to_degrees(),
        _ => INVALID,
    }
}

/// (−half, half] に折り返す
fn wrap(angle: f64, half: f64) -> f64 {
    let period = 2.0 * half;
    angle - period * ((angle - half) / period).ceil()
}

impl AngleSpec {
    /// オフセット・スケール・折り返しを適用
    pub fn finish(&self, raw: f64) -> f64 {
        let angle = (raw + self.offset) * self.scale;
        if self.midline {
            wrap(angle, 90.0)
        } else {
            wrap(angle, 180.0)
        }
    }
}

/// 骨格上の位置を解決済みの角度
#[derive(Debug, Clone)]
struct ResolvedAngle {
    spec: &'static AngleSpec,
    /// 骨格に存在するキーポイントの出力順インデックス（存在しない点は除外）
    indices: Vec<usize>,
}

/// 選択された角度を1人・1フレームごとに計算する
#[derive(Debug, Clone)]
pub struct AngleEngine {
    angles: Vec<ResolvedAngle>,
}

impl AngleEngine {
    /// 角度名のリストから作成。未知の名前は設定エラー。
    pub fn new<S: AsRef<str>>(names: &[S], skeleton: &Skeleton) -> Result<Self, ConfigError> {
        let angles = names
            .iter()
            .map(|name| {
                let spec = find_angle(name.as_ref())
                    .ok_or_else(|| ConfigError::UnknownAngle(name.as_ref().to_string()))?;
                let indices = spec
                    .keypoints
                    .iter()
                    .filter_map(|kp| skeleton.index_of(kp))
                    .collect();
                Ok(ResolvedAngle { spec, indices })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { angles })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.angles.iter().map(|a| a.spec.name).collect()
    }

    pub fn len(&self) -> usize {
        self.angles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }

    /// 全角度を計算（出力キーポイント順の反転済みX, Y）
    pub fn compute(&self, xs_flipped: &[f64], ys: &[f64]) -> Vec<f64> {
        self.angles
            .iter()
            .map(|angle| {
                let points: Vec<(f64, f64)> = angle
                    .indices
                    .iter()
                    .map(|&i| {
                        let x = if angle.spec.midline {
                            xs_flipped[i].abs()
                        } else {
                            xs_flipped[i]
                        };
                        (x, ys[i])
                    })
                    .collect();
                angle.spec.finish(points_to_angle(&points))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::PoseModel;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_segment_horizontal() {
        assert!(approx_eq(points_to_angle(&[(1.0, 0.0), (0.0, 0.0)]), 0.0));
        assert!(approx_eq(points_to_angle(&[(0.0, 1.0), (0.0, 0.0)]), 90.0));
    }

    #[test]
    fn test_three_point_right_angle() {
        let a = points_to_angle(&[(1.0, 0.0), (0.0, 0.0), (0.0, 1.0)]);
        assert!(approx_eq(a, -90.0));
    }

    #[test]
    fn test_four_point_parallel() {
        let a = points_to_angle(&[(0.0, 0.0), (1.0, 1.0), (5.0, 5.0), (6.0, 6.0)]);
        assert!(approx_eq(a, 0.0));
    }

    #[test]
    fn test_degenerate_and_nan_are_invalid() {
        assert!(points_to_angle(&[(1.0, 1.0), (1.0, 1.0)]).is_nan());
        assert!(points_to_angle(&[(f64::NAN, 1.0), (1.0, 1.0)]).is_nan());
        assert!(points_to_angle(&[(1.0, 1.0)]).is_nan());
        assert!(points_to_angle(&[]).is_nan());
    }

    #[test]
    fn test_wrap_ranges() {
        assert!(approx_eq(wrap(180.0, 180.0), 180.0));
        assert!(approx_eq(wrap(-180.0, 180.0), 180.0));
        assert!(approx_eq(wrap(190.0, 180.0), -170.0));
        assert!(approx_eq(wrap(-530.0, 180.0), -170.0));
        assert!(approx_eq(wrap(90.0, 90.0), 90.0));
        assert!(approx_eq(wrap(-90.0, 90.0), 90.0));
        assert!(approx_eq(wrap(100.0, 90.0), -80.0));
        assert!(wrap(f64::NAN, 180.0).is_nan());
    }

    #[test]
    fn test_wrap_invariant_over_sweep() {
        for spec in ANGLE_CATALOGUE.iter() {
            for i in -1000..1000 {
                let raw = i as f64 * 0.73;
                let a = spec.finish(raw);
                if spec.midline {
                    assert!(a > -90.0 && a <= 90.0, "{} -> {}", spec.name, a);
                } else {
                    assert!(a > -180.0 && a <= 180.0, "{} -> {}", spec.name, a);
                }
            }
        }
    }

    #[test]
    fn test_find_angle_case_insensitive() {
        assert_eq!(find_angle("Right Knee").unwrap().name, "right knee");
        assert!(find_angle("tail").is_none());
        assert_eq!(joint_angle_names().len() + segment_angle_names().len(), ANGLE_CATALOGUE.len());
    }

    #[test]
    fn test_engine_rejects_unknown_angle() {
        let sk = PoseModel::Halpe26.skeleton();
        let err = AngleEngine::new(&["right knee", "tail"], sk).unwrap_err();
        assert_eq!(err, ConfigError::UnknownAngle("tail".to_string()));
    }

    /// 立位・右向きのHALPE_26姿勢（出力キーポイント順）
    fn standing(sk: &Skeleton) -> (Vec<f64>, Vec<f64>) {
        let mut xs = vec![0.0; sk.len()];
        let mut ys = vec![0.0; sk.len()];
        let mut set = |name: &str, x: f64, y: f64| {
            let i = sk.index_of(name).unwrap();
            xs[i] = x;
            ys[i] = y;
        };
        set("Hip", 100.0, 500.0);
        set("Neck", 100.0, 300.0);
        set("Head", 100.0, 250.0);
        set("Nose", 110.0, 240.0);
        for (side, dx) in [("R", 2.0), ("L", -2.0)] {
            set(&format!("{side}Hip"), 100.0 + dx, 500.0);
            set(&format!("{side}Knee"), 100.0 + dx, 700.0);
            set(&format!("{side}Ankle"), 100.0 + dx, 900.0);
            set(&format!("{side}Heel"), 90.0 + dx, 910.0);
            set(&format!("{side}BigToe"), 130.0 + dx, 910.0);
            set(&format!("{side}SmallToe"), 125.0 + dx, 910.0);
            set(&format!("{side}Shoulder"), 100.0 + dx, 300.0);
            set(&format!("{side}Elbow"), 100.0 + dx, 400.0);
            set(&format!("{side}Wrist"), 100.0 + dx, 500.0);
        }
        (xs, ys)
    }

    #[test]
    fn test_standing_pose_angles() {
        let sk = PoseModel::Halpe26.skeleton();
        let engine = AngleEngine::new(&["right knee", "right hip", "right ankle", "right elbow", "trunk"], sk).unwrap();
        let (xs, ys) = standing(sk);
        let angles = engine.compute(&xs, &ys);
        // 伸展位: 膝・股関節・肘 ≈ 0、足関節 ≈ 0 (足部が水平)、体幹 ≈ 90
        assert!(approx_eq(angles[0], 0.0), "knee {}", angles[0]);
        assert!(approx_eq(angles[1], 0.0), "hip {}", angles[1]);
        assert!(approx_eq(angles[2], 0.0), "ankle {}", angles[2]);
        assert!(approx_eq(angles[3], 0.0), "elbow {}", angles[3]);
        assert!(approx_eq(angles[4].abs(), 90.0), "trunk {}", angles[4]);
    }

    #[test]
    fn test_flexed_knee_is_positive() {
        let sk = PoseModel::Halpe26.skeleton();
        let engine = AngleEngine::new(&["right knee"], sk).unwrap();
        let (mut xs, mut ys) = standing(sk);
        // 足首を後方（−X）へ: 膝90°屈曲
        let ankle = sk.index_of("RAnkle").unwrap();
        xs[ankle] = 102.0 - 200.0;
        ys[ankle] = 700.0;
        let knee = engine.compute(&xs, &ys)[0];
        assert!(approx_eq(knee.abs(), 90.0), "knee {}", knee);
    }

    #[test]
    fn test_missing_keypoint_reduces_points() {
        // COCO_17 には Hip/Neck がないので股関節角は2点（大腿の水平角）になる
        let sk = PoseModel::Coco17.skeleton();
        let engine = AngleEngine::new(&["right hip", "right ankle"], sk).unwrap();
        let mut xs = vec![0.0; sk.len()];
        let mut ys = vec![0.0; sk.len()];
        let knee = sk.index_of("RKnee").unwrap();
        let hip = sk.index_of("RHip").unwrap();
        xs[knee] = 0.0;
        ys[knee] = 10.0;
        xs[hip] = 0.0;
        ys[hip] = 0.0;
        let angles = engine.compute(&xs, &ys);
        assert!(approx_eq(angles[0], -90.0), "hip {}", angles[0]);
        // 足関節は RKnee, RAnkle の2点のみ（足首は原点）
        assert!(approx_eq(angles[1], 180.0), "ankle {}", angles[1]);
    }

    #[test]
    fn test_nan_coordinate_gives_nan_angle() {
        let sk = PoseModel::Halpe26.skeleton();
        let engine = AngleEngine::new(&["right knee", "left knee"], sk).unwrap();
        let (mut xs, ys) = standing(sk);
        xs[sk.index_of("RKnee").unwrap()] = f64::NAN;
        let angles = engine.compute(&xs, &ys);
        assert!(angles[0].is_nan());
        assert!(!angles[1].is_nan());
    }

    #[test]
    fn test_midline_uses_absolute_x() {
        let sk = PoseModel::Halpe26.skeleton();
        let engine = AngleEngine::new(&["pelvis"], sk).unwrap();
        let (mut xs, ys) = standing(sk);
        let a = engine.compute(&xs, &ys)[0];
        // 片側だけ反転されても |X| を使うので値は変わらない
        let lhip = sk.index_of("LHip").unwrap();
        xs[lhip] = -xs[lhip];
        let b = engine.compute(&xs, &ys)[0];
        assert!(approx_eq(a, b));
    }
}
