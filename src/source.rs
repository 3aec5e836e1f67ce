//! 外部検出器の出力（JSON / JSON Lines）の読み込み

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use tracing::warn;

use crate::error::DetectionError;
use crate::pose::{Pose, RawDetection, Skeleton};

/// 1フレーム分の検出結果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionFrame {
    #[serde(default)]
    pub persons: Vec<RawDetection>,
}

impl DetectionFrame {
    pub fn poses(&self) -> Vec<Pose> {
        self.persons.iter().map(|p| p.to_pose()).collect()
    }

    /// 全人物のキーポイント数・スコア数を骨格と照合
    pub fn validate(&self, frame: usize, skeleton: &Skeleton) -> Result<(), DetectionError> {
        for (person, det) in self.persons.iter().enumerate() {
            if det.scores.len() != det.keypoints.len() {
                return Err(DetectionError::ScoreLengthMismatch {
                    frame,
                    person,
                    keypoints: det.keypoints.len(),
                    scores: det.scores.len(),
                });
            }
            if det.keypoints.len() != skeleton.raw_count {
                return Err(DetectionError::KeypointCountMismatch {
                    frame,
                    person,
                    model: skeleton.model.name(),
                    expected: skeleton.raw_count,
                    actual: det.keypoints.len(),
                });
            }
        }
        Ok(())
    }
}

/// クリップ全体の検出結果。`null` のフレームはデコード失敗。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionClip {
    #[serde(default)]
    pub frame_rate: Option<f64>,
    pub frames: Vec<Option<DetectionFrame>>,
}

impl DetectionClip {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read detections {}", path.display()))?;
        let clip: DetectionClip = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse detections {}", path.display()))?;
        Ok(clip)
    }

    /// フレーム処理の前に全フレームを検証
    pub fn validate(&self, skeleton: &Skeleton) -> Result<(), DetectionError> {
        for (i, frame) in self.frames.iter().enumerate() {
            if let Some(frame) = frame {
                frame.validate(i, skeleton)?;
            }
        }
        Ok(())
    }
}

/// JSON Lines の1行を解釈。壊れた行・`null` はデコード失敗フレーム (None)。
pub fn parse_frame_line(line_no: usize, line: &str) -> Option<DetectionFrame> {
    match serde_json::from_str::<Option<DetectionFrame>>(line) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("line {}: frame could not be decoded ({}), marked invalid", line_no, e);
            None
        }
    }
}

/// 別スレッドで JSON Lines を読み、到着順にフレームを渡す
///
/// チャネルは有界なので、読み込みが処理より先行しすぎることはない。
pub struct FrameReader {
    rx: Receiver<io::Result<Option<DetectionFrame>>>,
    _handle: thread::JoinHandle<()>,
}

impl FrameReader {
    pub fn start<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open detections {}", path.display()))?;
        Ok(Self::from_reader(BufReader::new(file), capacity))
    }

    pub fn from_reader<R: BufRead + Send + 'static>(reader: R, capacity: usize) -> Self {
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        let handle = thread::spawn(move || {
            for (i, line) in reader.lines().enumerate() {
                let item = match line {
                    Ok(line) if line.trim().is_empty() => continue,
                    Ok(line) => Ok(parse_frame_line(i + 1, &line)),
                    Err(e) => Err(e),
                };
                let failed = item.is_err();
                // 受信側が先に終了した場合は読み込みをやめる
                if tx.send(item).is_err() || failed {
                    break;
                }
            }
        });
        Self { rx, _handle: handle }
    }
}

impl Iterator for FrameReader {
    type Item = io::Result<Option<DetectionFrame>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}

/// 拡張子 `.jsonl` / `.ndjson` なら JSON Lines とみなす
pub fn is_json_lines(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("jsonl") | Some("ndjson")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::PoseModel;
    use std::io::Cursor;

    fn detection(n: usize, scores: usize) -> RawDetection {
        RawDetection {
            keypoints: vec![[1.0, 2.0]; n],
            scores: vec![0.9; scores],
            track_id: None,
        }
    }

    #[test]
    fn test_parse_clip_with_null_frame() {
        let json = r#"{"frame_rate": 25.0, "frames": [
            {"persons": [{"keypoints": [[1, 2], [3, 4]], "scores": [0.9, 0.8], "track_id": 4}]},
            null,
            {"persons": []}
        ]}"#;
        let clip: DetectionClip = serde_json::from_str(json).unwrap();
        assert_eq!(clip.frame_rate, Some(25.0));
        assert_eq!(clip.frames.len(), 3);
        assert!(clip.frames[1].is_none());
        let poses = clip.frames[0].as_ref().unwrap().poses();
        assert_eq!(poses[0].track_id, Some(4));
        assert_eq!(poses[0].keypoints[1].x, 3.0);
    }

    #[test]
    fn test_validate_counts() {
        let sk = PoseModel::Coco17.skeleton();
        let ok = DetectionFrame {
            persons: vec![detection(17, 17)],
        };
        assert!(ok.validate(0, sk).is_ok());

        let bad_scores = DetectionFrame {
            persons: vec![detection(17, 17), detection(17, 16)],
        };
        assert_eq!(
            bad_scores.validate(3, sk),
            Err(DetectionError::ScoreLengthMismatch {
                frame: 3,
                person: 1,
                keypoints: 17,
                scores: 16
            })
        );

        let wrong_model = DetectionFrame {
            persons: vec![detection(26, 26)],
        };
        assert!(matches!(
            wrong_model.validate(0, sk),
            Err(DetectionError::KeypointCountMismatch { expected: 17, actual: 26, .. })
        ));
    }

    #[test]
    fn test_reader_keeps_arrival_order() {
        let text = "{\"persons\": []}\nnull\n\n{broken\n{\"persons\": [{\"keypoints\": [[0,0]], \"scores\": [1.0]}]}\n";
        let frames: Vec<_> = FrameReader::from_reader(Cursor::new(text.to_string()), 1)
            .map(|f| f.unwrap())
            .collect();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0], Some(DetectionFrame::default()));
        assert!(frames[1].is_none());
        assert!(frames[2].is_none());
        assert_eq!(frames[3].as_ref().unwrap().persons.len(), 1);
    }

    #[test]
    fn test_is_json_lines() {
        assert!(is_json_lines(Path::new("a/b.jsonl")));
        assert!(!is_json_lines(Path::new("a/b.json")));
    }
}
