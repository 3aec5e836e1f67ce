//! クリップ単位の処理
//!
//! フレームごと: ゲート → 追跡 → 向き正規化 → 角度 → 蓄積
//! クリップ終了後: 後処理 → ファイル出力

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::angles::AngleEngine;
use crate::config::Config;
use crate::error::ConfigError;
use crate::export::Exporter;
use crate::pose::{FrameGate, OrientationNormalizer, Pose, Skeleton};
use crate::postprocess::{PostProcessor, ProcessedTrack};
use crate::series::{Aggregator, PersonFrame, PersonTrack};
use crate::source::DetectionFrame;
use crate::tracker::{IdentityTracker, TrackState};

/// 1クリップ分のフレーム処理と、その間の状態
pub struct ClipProcessor {
    skeleton: &'static Skeleton,
    gate: FrameGate,
    tracker: IdentityTracker,
    state: TrackState,
    orientation: OrientationNormalizer,
    angles: AngleEngine,
    aggregator: Aggregator,
}

impl ClipProcessor {
    /// 設定を検証してから作成する
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let skeleton = config.pose.pose_model.skeleton();
        let angles = AngleEngine::new(&config.angles.all(), skeleton)?;
        let orientation = OrientationNormalizer::new(skeleton, config.angles.flip_left_right);
        if config.angles.flip_left_right && !orientation.is_active() {
            info!(
                "{} has no foot landmarks, left/right flip disabled",
                skeleton.model.name()
            );
        }
        Ok(Self {
            skeleton,
            gate: FrameGate::from_config(&config.pose),
            tracker: IdentityTracker::from_config(config),
            state: TrackState::new(),
            orientation,
            aggregator: Aggregator::new(skeleton.len(), angles.len()),
            angles,
        })
    }

    pub fn skeleton(&self) -> &'static Skeleton {
        self.skeleton
    }

    pub fn keypoint_names(&self) -> Vec<&'static str> {
        self.skeleton.keypoint_names()
    }

    pub fn angle_names(&self) -> Vec<&'static str> {
        self.angles.names()
    }

    pub fn frame_count(&self) -> usize {
        self.aggregator.frame_count()
    }

    /// ゲート済みの候補（単一人物モードでは選ばれた1人のみ）
    fn gated(&self, poses: &[Pose]) -> Vec<Pose> {
        if self.tracker.is_multiperson() {
            self.gate.apply_frame(poses)
        } else {
            self.tracker
                .select_single(poses)
                .map(|p| vec![self.gate.apply(p)])
                .unwrap_or_default()
        }
    }

    fn person_frame(&self, pose: &Pose) -> PersonFrame {
        let (xs, ys, scores) = self.skeleton.select(pose);
        let flipped = self.orientation.normalize(&xs);
        let angles = self.angles.compute(&flipped, &ys);
        PersonFrame {
            xs,
            ys,
            scores,
            angles,
        }
    }

    /// 1フレーム分を処理。`None` はデコードに失敗したフレーム。
    pub fn push_frame(&mut self, frame: Option<&DetectionFrame>) -> Result<()> {
        let index = self.aggregator.frame_count();
        let Some(frame) = frame else {
            debug!("frame {}: no detections decoded", index);
            self.aggregator.push_failed_frame()?;
            return Ok(());
        };
        frame.validate(index, self.skeleton)?;

        let gated = self.gated(&frame.poses());
        let assigned = self.tracker.assign(&mut self.state, gated);
        let persons: Vec<Option<PersonFrame>> = assigned
            .iter()
            .map(|p| p.as_ref().map(|pose| self.person_frame(pose)))
            .collect();
        self.aggregator.push_frame(&persons)?;
        Ok(())
    }

    pub fn finish(self) -> Vec<PersonTrack> {
        self.aggregator.finish()
    }
}

/// クリップ処理の結果
#[derive(Debug)]
pub struct ClipSummary {
    pub frames: usize,
    pub persons: usize,
    pub tracks: Vec<ProcessedTrack>,
    pub written: Vec<PathBuf>,
}

/// フレーム列を処理して出力ディレクトリに書き出す
///
/// ファイルは全フレームの処理が終わってから書く。途中でエラーになった場合は
/// 何も書かない。全員が除外された場合も成功として扱う。
pub fn run_clip<I>(config: &Config, frames: I, output_dir: &Path, stem: &str) -> Result<ClipSummary>
where
    I: IntoIterator<Item = Result<Option<DetectionFrame>>>,
{
    let mut processor = ClipProcessor::new(config).context("invalid configuration")?;
    for frame in frames {
        let frame = frame?;
        processor.push_frame(frame.as_ref())?;
    }

    let frames = processor.frame_count();
    let keypoint_names = processor.keypoint_names();
    let angle_names = processor.angle_names();
    let tracks = processor.finish();
    info!("{} frames processed, {} person(s) detected", frames, tracks.len());

    let processed = PostProcessor::from_config(config).process(&tracks);
    let written = Exporter::from_config(config, output_dir, stem)
        .write_all(&processed, &keypoint_names, &angle_names)
        .with_context(|| format!("failed to export to {}", output_dir.display()))?;

    Ok(ClipSummary {
        frames,
        persons: tracks.len(),
        tracks: processed,
        written,
    })
}
