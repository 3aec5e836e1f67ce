use super::Filter1d;
use crate::config::LoessConfig;

/// 局所線形回帰（tricube重み）
///
/// 各点で近傍 `window` 点に重み付き直線を当てはめ、その点の値を使う。
/// 区間が窓より短い場合は何もしない。
#[derive(Debug, Clone)]
pub struct Loess {
    window: usize,
}

impl Loess {
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    pub fn from_config(config: &LoessConfig) -> Self {
        Self::new(config.nb_values_used)
    }

    fn fit_at(&self, run: &[f64], i: usize) -> f64 {
        let n = run.len();
        let k = self.window;
        // 最近傍 k 点（等間隔なので端で寄せた連続窓になる）
        let lo = i.saturating_sub(k / 2).min(n - k);
        let hi = lo + k;
        let radius = (i - lo).max(hi - 1 - i) as f64;

        let mut sw = 0.0;
        let mut sx = 0.0;
        let mut sy = 0.0;
        let mut sxx = 0.0;
        let mut sxy = 0.0;
        for j in lo..hi {
            let d = (j as f64 - i as f64).abs() / radius;
            let w = if d < 1.0 { (1.0 - d.powi(3)).powi(3) } else { 0.0 };
            let x = j as f64;
            sw += w;
            sx += w * x;
            sy += w * run[j];
            sxx += w * x * x;
            sxy += w * x * run[j];
        }
        if sw <= 0.0 {
            return run[i];
        }
        let mean_x = sx / sw;
        let mean_y = sy / sw;
        let var = sxx / sw - mean_x * mean_x;
        if var.abs() < 1e-12 {
            return mean_y;
        }
        let slope = (sxy / sw - mean_x * mean_y) / var;
        mean_y + slope * (i as f64 - mean_x)
    }
}

impl Filter1d for Loess {
    fn filter_run(&self, run: &[f64]) -> Vec<f64> {
        if self.window < 2 || run.len() < self.window {
            return run.to_vec();
        }
        (0..run.len()).map(|i| self.fit_at(run, i)).collect()
    }

    fn describe(&self) -> String {
        format!("LOESS {} values", self.window)
    }
}
