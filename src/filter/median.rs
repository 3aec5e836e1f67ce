use super::Filter1d;
use crate::config::MedianConfig;

/// メディアンフィルタ（区間の外は0で埋める）
#[derive(Debug, Clone)]
pub struct Median {
    kernel_size: usize,
}

impl Median {
    pub fn new(kernel_size: usize) -> Self {
        Self { kernel_size }
    }

    pub fn from_config(config: &MedianConfig) -> Self {
        Self::new(config.kernel_size)
    }
}

impl Filter1d for Median {
    fn filter_run(&self, run: &[f64]) -> Vec<f64> {
        let half = (self.kernel_size / 2) as isize;
        let n = run.len() as isize;
        let mut window = Vec::with_capacity(self.kernel_size);
        (0..n)
            .map(|i| {
                window.clear();
                window.extend((i - half..=i + half).map(|j| {
                    if (0..n).contains(&j) {
                        run[j as usize]
                    } else {
                        0.0
                    }
                }));
                window.sort_by(|a, b| a.total_cmp(b));
                window[window.len() / 2]
            })
            .collect()
    }

    fn describe(&self) -> String {
        format!("median kernel {}", self.kernel_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_spike() {
        let m = Median::new(3);
        let y = m.filter_run(&[1.0, 1.0, 50.0, 1.0, 1.0]);
        assert_eq!(y, vec![1.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_zero_padding_at_edges() {
        let m = Median::new(3);
        // 端では0が窓に入る: median(0, 5, 6) = 5, median(6, 7, 0) = 6
        let y = m.filter_run(&[5.0, 6.0, 7.0]);
        assert_eq!(y, vec![5.0, 6.0, 6.0]);
    }

    #[test]
    fn test_kernel_one_is_identity() {
        let m = Median::new(1);
        let x = vec![3.0, -1.0, 2.0];
        assert_eq!(m.filter_run(&x), x);
    }
}
