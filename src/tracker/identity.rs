use std::collections::HashMap;
use tracing::{info, warn};

use crate::config::{Config, SinglePersonPolicy, TrackingMode};
use crate::pose::Pose;

/// 人物同一性の追跡状態
///
/// フレーム間で持ち越す唯一の可変状態。クリップごとに1つ作り、
/// 各フレームの [`IdentityTracker::assign`] に `&mut` で渡す。
#[derive(Debug, Clone, Default)]
pub struct TrackState {
    /// 人物ごと・キーポイントごとの最後に観測された (x, y)
    last_known: Vec<Vec<[f64; 2]>>,
    /// 検出器の track_id → 人物番号
    native_ids: HashMap<u32, usize>,
}

impl TrackState {
    pub fn new() -> Self {
        Self::default()
    }

    /// これまでに生成された人物数
    pub fn identity_count(&self) -> usize {
        self.last_known.len()
    }

    pub fn last_known(&self, identity: usize) -> Option<&[[f64; 2]]> {
        self.last_known.get(identity).map(|v| v.as_slice())
    }

    fn create(&mut self, pose: &Pose) -> usize {
        let id = self.last_known.len();
        self.last_known.push(vec![[f64::NAN; 2]; pose.len()]);
        self.remember(id, pose);
        info!("new person #{}", id);
        id
    }

    /// 有効なキーポイントだけ更新し、欠けた点は以前の値を持ち越す
    fn remember(&mut self, identity: usize, pose: &Pose) {
        let slots = &mut self.last_known[identity];
        if slots.len() < pose.len() {
            slots.resize(pose.len(), [f64::NAN; 2]);
        }
        for (slot, kp) in slots.iter_mut().zip(&pose.keypoints) {
            if kp.is_valid() {
                *slot = [kp.x, kp.y];
            }
        }
    }
}

/// 前フレームの人物と現フレームの検出の距離
///
/// 両方で有効なキーポイントのユークリッド距離の平均。共通の有効点が
/// なければ NaN（マッチング対象外）。
pub fn pose_distance(previous: &[[f64; 2]], current: &Pose) -> f64 {
    let (sum, count) = previous
        .iter()
        .zip(&current.keypoints)
        .filter(|(p, k)| p[0].is_finite() && p[1].is_finite() && k.is_valid())
        .fold((0.0, 0usize), |(s, c), (p, k)| {
            let dx = p[0] - k.x;
            let dy = p[1] - k.y;
            (s + (dx * dx + dy * dy).sqrt(), c + 1)
        });
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// 貪欲な排他的最小割り当て
///
/// 全コストを昇順に並べ、行・列がまだ使われていないものから順に採用する。
/// 同値は行優先の走査順で先に現れたものが勝つ。総コスト最小（ハンガリアン法）
/// ではない。非有限のコストは割り当てない。
///
/// 戻り値は (行, 列) の組を採用順に並べたもの。
pub fn greedy_assign(costs: &[Vec<f64>]) -> Vec<(usize, usize)> {
    let mut pairs: Vec<(f64, usize, usize)> = costs
        .iter()
        .enumerate()
        .flat_map(|(r, row)| row.iter().enumerate().map(move |(c, &cost)| (cost, r, c)))
        .filter(|(cost, _, _)| cost.is_finite())
        .collect();
    // 安定ソートなので同値は走査順のまま
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let n_cols = costs.iter().map(|row| row.len()).max().unwrap_or(0);
    let mut used_rows = vec![false; costs.len()];
    let mut used_cols = vec![false; n_cols];
    let mut assigned = Vec::new();
    for (_, r, c) in pairs {
        if used_rows[r] || used_cols[c] {
            continue;
        }
        used_rows[r] = true;
        used_cols[c] = true;
        assigned.push((r, c));
    }
    assigned
}

/// フレームごとの検出を安定した人物番号に並べ替える
#[derive(Debug, Clone, Copy)]
pub struct IdentityTracker {
    mode: TrackingMode,
    multiperson: bool,
    policy: SinglePersonPolicy,
}

impl IdentityTracker {
    pub fn new(mode: TrackingMode, multiperson: bool, policy: SinglePersonPolicy) -> Self {
        Self {
            mode,
            multiperson,
            policy,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.pose.tracking_mode,
            config.process.multiperson,
            config.process.single_person_policy,
        )
    }

    pub fn is_multiperson(&self) -> bool {
        self.multiperson
    }

    /// 単一人物モードで使う検出を選ぶ（ゲート前の生データに対して）
    pub fn select_single<'a>(&self, poses: &'a [Pose]) -> Option<&'a Pose> {
        match self.policy {
            SinglePersonPolicy::First => poses.first(),
            SinglePersonPolicy::HighestScore => poses
                .iter()
                .enumerate()
                .max_by(|(ia, a), (ib, b)| {
                    // 同点は先に現れた方
                    a.average_score()
                        .total_cmp(&b.average_score())
                        .then(ib.cmp(ia))
                })
                .map(|(_, p)| p),
        }
    }

    /// ゲート済みの検出を人物番号順に並べる
    ///
    /// 戻り値の長さは割り当て後の `state.identity_count()`。このフレームで
    /// 観測されなかった人物は `None`。全点無効の検出は人物を生成しない。
    pub fn assign(&self, state: &mut TrackState, poses: Vec<Pose>) -> Vec<Option<Pose>> {
        let poses: Vec<Pose> = poses.into_iter().filter(|p| p.has_any_valid()).collect();

        if !self.multiperson {
            return self.assign_single(state, poses);
        }
        match self.mode {
            TrackingMode::Sports2d => self.assign_greedy(state, poses),
            TrackingMode::Rtmlib => self.assign_native(state, poses),
        }
    }

    fn assign_single(&self, state: &mut TrackState, poses: Vec<Pose>) -> Vec<Option<Pose>> {
        let pose = poses.into_iter().next();
        if let Some(p) = &pose {
            if state.identity_count() == 0 {
                state.create(p);
            } else {
                state.remember(0, p);
            }
        }
        let mut frame = vec![None; state.identity_count()];
        if let Some(slot) = frame.first_mut() {
            *slot = pose;
        }
        frame
    }

    fn assign_greedy(&self, state: &mut TrackState, poses: Vec<Pose>) -> Vec<Option<Pose>> {
        let costs: Vec<Vec<f64>> = state
            .last_known
            .iter()
            .map(|prev| poses.iter().map(|p| pose_distance(prev, p)).collect())
            .collect();
        let pairs = greedy_assign(&costs);

        let mut detection_to_identity = vec![None; poses.len()];
        for &(identity, detection) in &pairs {
            detection_to_identity[detection] = Some(identity);
        }

        let mut frame: Vec<Option<Pose>> = vec![None; state.identity_count()];
        for (pose, identity) in poses.into_iter().zip(detection_to_identity) {
            let identity = match identity {
                Some(id) => {
                    state.remember(id, &pose);
                    id
                }
                None => {
                    let id = state.create(&pose);
                    frame.push(None);
                    id
                }
            };
            frame[identity] = Some(pose);
        }
        frame
    }

    fn assign_native(&self, state: &mut TrackState, poses: Vec<Pose>) -> Vec<Option<Pose>> {
        let mut frame: Vec<Option<Pose>> = vec![None; state.identity_count()];
        for pose in poses {
            let known = pose.track_id.and_then(|tid| state.native_ids.get(&tid).copied());
            let identity = match known {
                Some(id) => {
                    if frame[id].is_some() {
                        warn!("duplicate track_id {:?} in one frame, detection ignored", pose.track_id);
                        continue;
                    }
                    state.remember(id, &pose);
                    id
                }
                None => {
                    if pose.track_id.is_none() {
                        warn!("detection without track_id, starting a new person");
                    }
                    let id = state.create(&pose);
                    if let Some(tid) = pose.track_id {
                        state.native_ids.insert(tid, id);
                    }
                    frame.push(None);
                    id
                }
            };
            frame[identity] = Some(pose);
        }
        frame
    }
}
