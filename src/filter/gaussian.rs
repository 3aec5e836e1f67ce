use super::Filter1d;
use crate::config::GaussianConfig;

/// ガウシアン平滑化（半径 round(4σ)、端は反射）
#[derive(Debug, Clone)]
pub struct Gaussian {
    sigma: f64,
    weights: Vec<f64>,
}

impl Gaussian {
    pub fn new(sigma: f64) -> Self {
        let radius = (4.0 * sigma + 0.5) as usize;
        let raw: Vec<f64> = (0..=2 * radius)
            .map(|i| {
                let d = i as f64 - radius as f64;
                (-0.5 * d * d / (sigma * sigma)).exp()
            })
            .collect();
        let sum: f64 = raw.iter().sum();
        Self {
            sigma,
            weights: raw.into_iter().map(|w| w / sum).collect(),
        }
    }

    pub fn from_config(config: &GaussianConfig) -> Self {
        Self::new(config.sigma_kernel)
    }

    fn radius(&self) -> usize {
        self.weights.len() / 2
    }
}

/// 反射境界 (d c b a | a b c d | d c b a) での添字
fn reflect(i: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let m = i.rem_euclid(period);
    if m < n as isize {
        m as usize
    } else {
        (period - 1 - m) as usize
    }
}

impl Filter1d for Gaussian {
    fn filter_run(&self, run: &[f64]) -> Vec<f64> {
        let n = run.len();
        let r = self.radius() as isize;
        (0..n as isize)
            .map(|i| {
                self.weights
                    .iter()
                    .enumerate()
                    .map(|(k, w)| w * run[reflect(i + k as isize - r, n)])
                    .sum()
            })
            .collect()
    }

    fn describe(&self) -> String {
        format!("Gaussian sigma {}", self.sigma)
    }
}
