//! 人物ごとの時系列の蓄積
//!
//! 全人物の系列は常に同じフレーム数を持つ。途中から現れた人物は
//! それまでのフレームを無効値で埋めて作成する。

use ndarray::{aview1, Array2, Axis, ShapeError};
use std::collections::BTreeMap;

use crate::pose::INVALID;

/// 1人物・1フレーム分の計算結果（出力キーポイント順、反転前のX）
#[derive(Debug, Clone, PartialEq)]
pub struct PersonFrame {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub scores: Vec<f64>,
    pub angles: Vec<f64>,
}

impl PersonFrame {
    pub fn invalid(n_keypoints: usize, n_angles: usize) -> Self {
        Self {
            xs: vec![INVALID; n_keypoints],
            ys: vec![INVALID; n_keypoints],
            scores: vec![INVALID; n_keypoints],
            angles: vec![INVALID; n_angles],
        }
    }
}

/// 1人物のクリップ全体の時系列。各配列は (フレーム, 列)。
#[derive(Debug, Clone, PartialEq)]
pub struct PersonTrack {
    pub id: usize,
    pub x: Array2<f64>,
    pub y: Array2<f64>,
    pub scores: Array2<f64>,
    pub angles: Array2<f64>,
}

/// 1列でも有効値を含む行の数
pub fn valid_rows(table: &Array2<f64>) -> usize {
    table
        .axis_iter(Axis(0))
        .filter(|row| row.iter().any(|v| !v.is_nan()))
        .count()
}

impl PersonTrack {
    fn empty(id: usize, n_keypoints: usize, n_angles: usize) -> Self {
        Self {
            id,
            x: Array2::zeros((0, n_keypoints)),
            y: Array2::zeros((0, n_keypoints)),
            scores: Array2::zeros((0, n_keypoints)),
            angles: Array2::zeros((0, n_angles)),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.x.nrows()
    }

    /// 座標が1つでも有効なフレーム数
    pub fn valid_pose_frames(&self) -> usize {
        valid_rows(&self.x)
    }

    pub fn valid_angle_frames(&self) -> usize {
        valid_rows(&self.angles)
    }

    fn push(&mut self, frame: &PersonFrame) -> Result<(), ShapeError> {
        self.x.push_row(aview1(&frame.xs))?;
        self.y.push_row(aview1(&frame.ys))?;
        self.scores.push_row(aview1(&frame.scores))?;
        self.angles.push_row(aview1(&frame.angles))?;
        Ok(())
    }
}

/// フレームごとの結果を人物別の時系列にまとめる
#[derive(Debug, Clone)]
pub struct Aggregator {
    n_keypoints: usize,
    n_angles: usize,
    frame_count: usize,
    tracks: BTreeMap<usize, PersonTrack>,
}

impl Aggregator {
    pub fn new(n_keypoints: usize, n_angles: usize) -> Self {
        Self {
            n_keypoints,
            n_angles,
            frame_count: 0,
            tracks: BTreeMap::new(),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn person_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn track(&self, id: usize) -> Option<&PersonTrack> {
        self.tracks.get(&id)
    }

    /// 1フレーム分を追加。添字が人物番号、`None` はこのフレームで不在。
    pub fn push_frame(&mut self, persons: &[Option<PersonFrame>]) -> Result<(), ShapeError> {
        let missing = PersonFrame::invalid(self.n_keypoints, self.n_angles);

        for (id, person) in persons.iter().enumerate() {
            if person.is_some() && !self.tracks.contains_key(&id) {
                let track = self.backfilled(id, &missing)?;
                self.tracks.insert(id, track);
            }
        }

        for (id, track) in self.tracks.iter_mut() {
            let frame = persons.get(*id).and_then(|p| p.as_ref()).unwrap_or(&missing);
            track.push(frame)?;
        }
        self.frame_count += 1;
        Ok(())
    }

    /// デコードに失敗したフレーム。全人物に無効行を追加する。
    pub fn push_failed_frame(&mut self) -> Result<(), ShapeError> {
        self.push_frame(&[])
    }

    fn backfilled(&self, id: usize, missing: &PersonFrame) -> Result<PersonTrack, ShapeError> {
        let mut track = PersonTrack::empty(id, self.n_keypoints, self.n_angles);
        for _ in 0..self.frame_count {
            track.push(missing)?;
        }
        Ok(track)
    }

    /// 人物番号順の時系列
    pub fn finish(self) -> Vec<PersonTrack> {
        self.tracks.into_values().collect()
    }
}
