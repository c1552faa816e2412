/// Population mean and standard deviation of a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanStd {
    pub mean: f64,
    pub std: f64,
    pub count: u64,
}

impl MeanStd {
    /// Bessel-corrected (n - 1) standard deviation; zero below two values.
    pub fn sample_std(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        let n = self.count as f64;
        self.std * (n / (n - 1.0)).sqrt()
    }
}

/// Single pass (Welford) mean/std accumulated in f64.
///
/// An empty iterator yields zeros.
pub fn mean_std<I>(values: I) -> MeanStd
where
    I: IntoIterator<Item = f64>,
{
    let mut count = 0u64;
    let mut mean = 0.0f64;
    let mut m2 = 0.0f64;

    for value in values {
        count += 1;
        let delta = value - mean;
        mean += delta / count as f64;
        m2 += delta * (value - mean);
    }

    if count == 0 {
        return MeanStd {
            mean: 0.0,
            std: 0.0,
            count: 0,
        };
    }

    MeanStd {
        mean,
        std: (m2 / count as f64).max(0.0).sqrt(),
        count,
    }
}
