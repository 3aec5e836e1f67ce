use nalgebra::{Complex, DMatrix, DVector};

use super::Filter1d;
use crate::config::ButterworthConfig;

/// 2次以上の係数列を持つIIRフィルタ (b, a)。a[0] = 1 に正規化済み。
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficients {
    pub b: Vec<f64>,
    pub a: Vec<f64>,
}

/// 多項式の根から係数（高次から）を作る
fn poly(roots: &[Complex<f64>]) -> Vec<Complex<f64>> {
    let mut coeffs = vec![Complex::new(1.0, 0.0)];
    for &r in roots {
        let mut next = coeffs.clone();
        next.push(Complex::new(0.0, 0.0));
        for i in 1..next.len() {
            next[i] -= r * coeffs[i - 1];
        }
        coeffs = next;
    }
    coeffs
}

fn binomial_row(n: usize) -> Vec<f64> {
    let mut row = vec![1.0];
    for _ in 0..n {
        let mut next = vec![1.0; row.len() + 1];
        for i in 1..row.len() {
            next[i] = row[i - 1] + row[i];
        }
        row = next;
    }
    row
}

/// N次ローパス・バターワースの設計
///
/// `wn` はナイキスト周波数で正規化したカットオフ (0 < wn < 1)。
/// アナログ原型の極を事前ワープしてから双一次変換する（サンプリング周波数2）。
pub fn design_lowpass(order: usize, wn: f64) -> Coefficients {
    let n = order.max(1);
    let warped = 4.0 * (std::f64::consts::PI * wn / 2.0).tan();

    // アナログ原型の極（左半平面）
    let poles: Vec<Complex<f64>> = (0..n)
        .map(|k| {
            let m = -(n as f64) + 1.0 + 2.0 * k as f64;
            let theta = std::f64::consts::PI * m / (2.0 * n as f64);
            -Complex::new(theta.cos(), theta.sin()) * warped
        })
        .collect();
    let gain = warped.powi(n as i32);

    let four = Complex::new(4.0, 0.0);
    let z_poles: Vec<Complex<f64>> = poles.iter().map(|&p| (four + p) / (four - p)).collect();
    let denom = poles
        .iter()
        .fold(Complex::new(1.0, 0.0), |acc, &p| acc * (four - p));
    let k_z = gain * (Complex::new(1.0, 0.0) / denom).re;

    let b = binomial_row(n).into_iter().map(|c| c * k_z).collect();
    let a = poly(&z_poles).into_iter().map(|c| c.re).collect();
    Coefficients { b, a }
}

/// ステップ応答の定常状態に対応する初期状態
pub fn lfilter_zi(coeffs: &Coefficients) -> Vec<f64> {
    let n = coeffs.a.len().max(coeffs.b.len());
    let mut a = coeffs.a.clone();
    let mut b = coeffs.b.clone();
    a.resize(n, 0.0);
    b.resize(n, 0.0);
    if n < 2 {
        return Vec::new();
    }

    let m = n - 1;
    let mut i_minus_a = DMatrix::<f64>::identity(m, m);
    for i in 0..m {
        i_minus_a[(i, 0)] += a[i + 1];
        if i + 1 < m {
            i_minus_a[(i, i + 1)] -= 1.0;
        }
    }
    let rhs = DVector::from_iterator(m, (0..m).map(|i| b[i + 1] - a[i + 1] * b[0]));
    match i_minus_a.lu().solve(&rhs) {
        Some(zi) => zi.iter().copied().collect(),
        None => vec![0.0; m],
    }
}

/// 直接形II転置での1方向フィルタ
pub fn lfilter(coeffs: &Coefficients, x: &[f64], zi: &[f64]) -> Vec<f64> {
    let n = coeffs.a.len().max(coeffs.b.len());
    let coef = |v: &[f64], i: usize| v.get(i).copied().unwrap_or(0.0);
    let mut z = zi.to_vec();
    z.resize(n.saturating_sub(1), 0.0);

    x.iter()
        .map(|&xi| {
            let y = coef(&coeffs.b, 0) * xi + z.first().copied().unwrap_or(0.0);
            for i in 0..z.len() {
                let next = z.get(i + 1).copied().unwrap_or(0.0);
                z[i] = coef(&coeffs.b, i + 1) * xi + next - coef(&coeffs.a, i + 1) * y;
            }
            y
        })
        .collect()
}

/// 端点を中心に点対称に拡張
fn odd_ext(x: &[f64], pad: usize) -> Vec<f64> {
    let first = x[0];
    let last = x[x.len() - 1];
    let mut ext = Vec::with_capacity(x.len() + 2 * pad);
    ext.extend((1..=pad).rev().map(|i| 2.0 * first - x[i]));
    ext.extend_from_slice(x);
    ext.extend((1..=pad).map(|i| 2.0 * last - x[x.len() - 1 - i]));
    ext
}

/// 前後2回かけるゼロ位相フィルタ
///
/// 入力が `padlen` 以下の長さなら何もしない（コピーを返す）。
pub fn filtfilt(coeffs: &Coefficients, x: &[f64]) -> Vec<f64> {
    let padlen = 3 * coeffs.a.len().max(coeffs.b.len());
    if x.len() <= padlen {
        return x.to_vec();
    }
    let ext = odd_ext(x, padlen);
    let zi = lfilter_zi(coeffs);

    let scaled = |s: f64| zi.iter().map(|z| z * s).collect::<Vec<_>>();
    let forward = lfilter(coeffs, &ext, &scaled(ext[0]));
    let mut reversed: Vec<f64> = forward.into_iter().rev().collect();
    let backward = lfilter(coeffs, &reversed, &scaled(reversed[0]));
    reversed = backward.into_iter().rev().collect();

    reversed[padlen..reversed.len() - padlen].to_vec()
}

/// ゼロ位相バターワース・ローパス
#[derive(Debug, Clone)]
pub struct Butterworth {
    order: usize,
    cutoff: f64,
    coeffs: Coefficients,
}

impl Butterworth {
    /// `order` は往復後の実効次数。片道は order/2 次（最低1）。
    pub fn new(order: usize, cutoff: f64, frame_rate: f64) -> Self {
        let wn = cutoff / (frame_rate / 2.0);
        Self {
            order,
            cutoff,
            coeffs: design_lowpass((order / 2).max(1), wn),
        }
    }

    pub fn from_config(config: &ButterworthConfig, frame_rate: f64) -> Self {
        Self::new(config.order, config.cut_off_frequency, frame_rate)
    }
}

impl Filter1d for Butterworth {
    fn filter_run(&self, run: &[f64]) -> Vec<f64> {
        filtfilt(&self.coeffs, run)
    }

    fn describe(&self) -> String {
        format!("Butterworth order {}, cut-off {} Hz", self.order, self.cutoff)
    }
}
