use crate::config::GapFill;

/// 短い欠損区間の線形補間
///
/// 前後を有効値に挟まれた、長さ `max_gap` 未満の欠損区間のみ補間する。
/// 先頭・末尾の欠損は外挿しない。有効値が2個未満の列はそのまま。
pub fn interpolate_gaps(column: &mut [f64], max_gap: usize) {
    let valid: Vec<usize> = column
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .map(|(i, _)| i)
        .collect();
    if valid.len() < 2 {
        return;
    }
    for pair in valid.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let gap = b - a - 1;
        if gap == 0 || gap >= max_gap {
            continue;
        }
        let (va, vb) = (column[a], column[b]);
        let span = (b - a) as f64;
        for i in a + 1..b {
            let t = (i - a) as f64 / span;
            column[i] = (1.0 - t) * va + t * vb;
        }
    }
}

/// 補間後に残った欠損の処理
pub fn fill_gaps(column: &mut [f64], policy: GapFill) {
    match policy {
        GapFill::Nan => {}
        GapFill::Zeros => {
            for v in column.iter_mut().filter(|v| v.is_nan()) {
                *v = 0.0;
            }
        }
        GapFill::LastValue => {
            // 前方埋め → 後方埋め
            let mut last = f64::NAN;
            for v in column.iter_mut() {
                if v.is_nan() {
                    *v = last;
                } else {
                    last = *v;
                }
            }
            let mut next = f64::NAN;
            for v in column.iter_mut().rev() {
                if v.is_nan() {
                    *v = next;
                } else {
                    next = *v;
                }
            }
        }
    }
}
