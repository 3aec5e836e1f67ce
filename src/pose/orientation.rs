use super::skeleton::{FootLandmarks, Side, Skeleton};

/// 人物の向き（つま先 − かかと のX差の符号）
///
/// 各フラグが true のとき、その側のキーポイントのXを反転する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Facing {
    pub flip_left: bool,
    pub flip_right: bool,
    pub flip_midline: bool,
}

impl Facing {
    /// 足のランドマークから向きを判定
    ///
    /// NaN を含む場合は比較が false になり、その側は反転しない。
    pub fn detect(xs: &[f64], feet: &FootLandmarks) -> Self {
        let right = xs[feet.right_toe] - xs[feet.right_heel];
        let left = xs[feet.left_toe] - xs[feet.left_heel];
        let global = right + left;
        Self {
            flip_left: left < 0.0,
            flip_right: right < 0.0,
            flip_midline: global < 0.0,
        }
    }

    fn flips(&self, side: Side) -> bool {
        match side {
            Side::Left => self.flip_left,
            Side::Right => self.flip_right,
            Side::Midline => self.flip_midline,
        }
    }
}

/// 左右の向きに依存しないX座標を作る
///
/// 元のXは描画・出力用にそのまま残し、反転したコピーを返す。
pub struct OrientationNormalizer {
    skeleton: &'static Skeleton,
    feet: Option<FootLandmarks>,
    enabled: bool,
}

impl OrientationNormalizer {
    pub fn new(skeleton: &'static Skeleton, enabled: bool) -> Self {
        Self {
            skeleton,
            feet: skeleton.foot_landmarks(),
            enabled,
        }
    }

    /// 足のランドマークを持つモデルで、かつ有効化されているか
    pub fn is_active(&self) -> bool {
        self.enabled && self.feet.is_some()
    }

    pub fn facing(&self, xs: &[f64]) -> Facing {
        match (&self.feet, self.enabled) {
            (Some(feet), true) => Facing::detect(xs, feet),
            _ => Facing::default(),
        }
    }

    /// 向きに応じて反転したXのコピー（出力キーポイント順）
    pub fn normalize(&self, xs: &[f64]) -> Vec<f64> {
        let facing = self.facing(xs);
        self.mirror(xs, facing)
    }

    /// 指定した向きでXを反転する。同じ向きで2回適用すると元に戻る。
    pub fn mirror(&self, xs: &[f64], facing: Facing) -> Vec<f64> {
        self.skeleton
            .keypoints()
            .zip(xs)
            .map(|(joint, &x)| if facing.flips(joint.side) { -x } else { x })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::PoseModel;

    fn halpe() -> &'static Skeleton {
        PoseModel::Halpe26.skeleton()
    }

    /// つま先を heel + dx に置いたX列
    fn xs_with_feet(left_dx: f64, right_dx: f64) -> Vec<f64> {
        let sk = halpe();
        let feet = sk.foot_landmarks().unwrap();
        let mut xs: Vec<f64> = (0..sk.len()).map(|i| 100.0 + i as f64).collect();
        xs[feet.left_toe] = xs[feet.left_heel] + left_dx;
        xs[feet.right_toe] = xs[feet.right_heel] + right_dx;
        xs
    }

    #[test]
    fn test_facing_right_is_untouched() {
        let norm = OrientationNormalizer::new(halpe(), true);
        let xs = xs_with_feet(10.0, 12.0);
        assert_eq!(norm.normalize(&xs), xs);
    }

    #[test]
    fn test_facing_left_flips_everything() {
        let norm = OrientationNormalizer::new(halpe(), true);
        let xs = xs_with_feet(-10.0, -12.0);
        let flipped = norm.normalize(&xs);
        for (a, b) in flipped.iter().zip(&xs) {
            assert_eq!(*a, -*b);
        }
    }

    #[test]
    fn test_only_left_side_flipped() {
        let sk = halpe();
        let norm = OrientationNormalizer::new(sk, true);
        // 左足のみ逆向き、合計は正
        let xs = xs_with_feet(-2.0, 20.0);
        let flipped = norm.normalize(&xs);
        let lhip = sk.index_of("LHip").unwrap();
        let rhip = sk.index_of("RHip").unwrap();
        let neck = sk.index_of("Neck").unwrap();
        assert_eq!(flipped[lhip], -xs[lhip]);
        assert_eq!(flipped[rhip], xs[rhip]);
        assert_eq!(flipped[neck], xs[neck]);
    }

    #[test]
    fn test_mirror_twice_is_identity() {
        let norm = OrientationNormalizer::new(halpe(), true);
        let xs = xs_with_feet(-3.0, 5.0);
        let facing = Facing {
            flip_left: true,
            flip_right: true,
            flip_midline: true,
        };
        let twice = norm.mirror(&norm.mirror(&xs, facing), facing);
        assert_eq!(twice, xs);
    }

    #[test]
    fn test_rotated_input_gives_same_normalized_x() {
        let norm = OrientationNormalizer::new(halpe(), true);
        let xs = xs_with_feet(7.0, 9.0);
        let rotated: Vec<f64> = xs.iter().map(|x| -x).collect();
        assert_eq!(norm.normalize(&xs), norm.normalize(&rotated));
    }

    #[test]
    fn test_disabled_or_no_feet_is_passthrough() {
        let xs = xs_with_feet(-10.0, -10.0);
        assert_eq!(OrientationNormalizer::new(halpe(), false).normalize(&xs), xs);

        let coco = PoseModel::Coco17.skeleton();
        let norm = OrientationNormalizer::new(coco, true);
        assert!(!norm.is_active());
        let xs: Vec<f64> = (0..coco.len()).map(|i| -(i as f64)).collect();
        assert_eq!(norm.normalize(&xs), xs);
    }

    #[test]
    fn test_nan_feet_do_not_flip() {
        let norm = OrientationNormalizer::new(halpe(), true);
        let mut xs = xs_with_feet(-10.0, -10.0);
        let feet = halpe().foot_landmarks().unwrap();
        xs[feet.left_toe] = f64::NAN;
        let facing = norm.facing(&xs);
        assert!(!facing.flip_left);
        assert!(facing.flip_right);
        assert!(!facing.flip_midline);
    }
}
