use approx::assert_relative_eq;
use ndarray::Array2;

use kinetrack::error::ExportError;
use kinetrack::export::{read_mot, read_trc, write_mot, write_trc, TimeAxis};
use kinetrack::postprocess::Trajectory;

fn trajectory(frames: usize, markers: usize) -> Trajectory {
    Trajectory {
        x: Array2::from_shape_fn((frames, markers), |(f, m)| 0.1 * m as f64 + 0.001234567 * f as f64),
        y: Array2::from_shape_fn((frames, markers), |(f, m)| -(1.0 / 3.0) * (m + 1) as f64 - 0.0005 * f as f64),
    }
}

#[test]
fn test_trc_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip_px_person00.trc");
    let names = ["Hip", "RHip", "RKnee"];
    let mut t = trajectory(25, 3);
    t.x[[7, 2]] = f64::NAN;

    write_trc(&path, &names, &t, &TimeAxis::new(60.0, 12)).unwrap();
    let back = read_trc(&path).unwrap();

    assert_eq!(back.frame_count(), 25);
    assert_eq!(back.marker_names, names);
    assert_eq!(back.frame_rate, 60.0);
    assert_eq!(back.frames, (1..=25).collect::<Vec<_>>());
    assert_relative_eq!(back.time[0], 0.2);
    for f in 0..25 {
        for m in 0..3 {
            if f == 7 && m == 2 {
                assert!(back.x[[f, m]].is_nan());
            } else {
                assert_relative_eq!(back.x[[f, m]], t.x[[f, m]], max_relative = 1e-12);
            }
            assert_relative_eq!(back.y[[f, m]], t.y[[f, m]], max_relative = 1e-12);
            assert_eq!(back.z[[f, m]], 0.0);
        }
    }
    // 一時ファイルは残らない
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_mot_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip_angles_person03.mot");
    let names = ["right knee", "left knee", "trunk"];
    let angles = Array2::from_shape_fn((12, 3), |(f, a)| -170.5 + 13.37 * (f * 3 + a) as f64);

    write_mot(&path, &names, &angles, &TimeAxis::new(30.0, 0)).unwrap();
    let back = read_mot(&path).unwrap();

    assert!(back.in_degrees);
    assert_eq!(back.names, names);
    assert_eq!(back.frame_count(), 12);
    assert_relative_eq!(back.time[3], 0.1);
    for (a, b) in back.values.iter().zip(angles.iter()) {
        assert_relative_eq!(*a, *b, max_relative = 1e-12);
    }
}

#[test]
fn test_mot_header_counts_angle_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.mot");
    let angles = Array2::zeros((4, 2));
    write_mot(&path, &["pelvis", "trunk"], &angles, &TimeAxis::new(30.0, 0)).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\nnRows=4\n"));
    assert!(text.contains("\nnColumns=2\n"));
}

#[test]
fn test_read_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_trc(&dir.path().join("nope.trc")).unwrap_err();
    assert!(matches!(err, ExportError::Read { .. }));
}

#[test]
fn test_read_rejects_non_trc() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x.trc");
    std::fs::write(&path, "hello\nworld\n").unwrap();
    assert!(matches!(read_trc(&path), Err(ExportError::Parse { .. })));
}

#[test]
fn test_write_into_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing/x.mot");
    let angles = Array2::zeros((1, 1));
    let err = write_mot(&path, &["trunk"], &angles, &TimeAxis::new(30.0, 0)).unwrap_err();
    assert!(matches!(err, ExportError::Write { .. }));
}
