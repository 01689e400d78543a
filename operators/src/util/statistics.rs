use num_traits::AsPrimitive;
use snafu::{OptionExt, ensure};

use crate::error;
use crate::util::Result;

/// Streaming estimate of a single quantile with the P² algorithm.
///
/// Only five markers are kept instead of the samples: the minimum, the maximum and the
/// current estimates of the (p/2)-, p- and (1+p)/2-quantiles. Each sample moves the marker
/// positions, and marker heights are corrected with a piecewise-parabolic formula.
///
/// R. Jain and I. Chlamtac, The P² algorithm for dynamic calculation of quantiles and
/// histograms without storing observations, Communications of the ACM 28(10), 1985.
///
/// The estimate depends on the order of the samples, so estimators cannot be merged.
#[derive(Debug, Clone)]
pub struct PSquareQuantileEstimator {
    quantile: f64,
    positions: [i64; 5],
    markers: [f64; 5],
    desired: [f64; 5],
    increment: [f64; 5],
    sample_count: u64,
}

impl PSquareQuantileEstimator {
    /// Creates an estimator from the first five samples.
    ///
    /// # Errors
    ///
    /// Fails if `quantile` is not inside `(0, 1)` or if `initial_samples` has fewer than five
    /// values that are not NaN.
    ///
    pub fn new<T>(quantile: f64, initial_samples: &[T]) -> Result<Self>
    where
        T: AsPrimitive<f64>,
    {
        ensure!(
            quantile > 0.0 && quantile < 1.0,
            error::InvalidQuantile { quantile }
        );

        let mut samples = initial_samples
            .iter()
            .map(|v| v.as_())
            .filter(|v: &f64| !v.is_nan());

        let mut markers = [0.0; 5];
        for marker in &mut markers {
            *marker = samples
                .next()
                .context(error::NotEnoughSamples { required: 5_usize })?;
        }
        markers.sort_unstable_by(f64::total_cmp);

        let mut estimator = Self {
            quantile,
            positions: [1, 2, 3, 4, 5],
            markers,
            desired: [
                1.0,
                1.0 + 2.0 * quantile,
                1.0 + 4.0 * quantile,
                3.0 + 2.0 * quantile,
                5.0,
            ],
            increment: [0.0, quantile / 2.0, quantile, (1.0 + quantile) / 2.0, 1.0],
            sample_count: 5,
        };

        for sample in samples {
            estimator.update(sample);
        }

        Ok(estimator)
    }

    pub fn quantile(&self) -> f64 {
        self.quantile
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    pub fn min(&self) -> f64 {
        self.markers[0]
    }

    pub fn max(&self) -> f64 {
        self.markers[4]
    }

    pub fn quantile_estimate(&self) -> f64 {
        self.markers[2]
    }

    /// NaN samples are ignored
    pub fn update<T>(&mut self, sample: T)
    where
        T: AsPrimitive<f64>,
    {
        let value: f64 = sample.as_();
        if value.is_nan() {
            return;
        }

        self.sample_count += 1;

        let cell = if value < self.markers[0] {
            self.markers[0] = value;
            0
        } else if value < self.markers[1] {
            0
        } else if value < self.markers[2] {
            1
        } else if value < self.markers[3] {
            2
        } else if value < self.markers[4] {
            3
        } else {
            self.markers[4] = value;
            3
        };

        for position in &mut self.positions[cell + 1..] {
            *position += 1;
        }
        for (desired, increment) in self.desired.iter_mut().zip(self.increment) {
            *desired += increment;
        }

        for i in 1..4 {
            let delta = self.desired[i] - self.positions[i] as f64;

            if delta >= 1.0 && self.positions[i + 1] - self.positions[i] > 1
                || delta <= -1.0 && self.positions[i - 1] - self.positions[i] < -1
            {
                let delta = delta.signum();

                let mut height = self.parabolic(i, delta);
                if self.markers[i - 1] >= height || height >= self.markers[i + 1] {
                    height = self.linear(i, delta);
                }

                self.markers[i] = height;
                self.positions[i] += delta as i64;
            }
        }
    }

    fn linear(&self, i: usize, delta: f64) -> f64 {
        let neighbor = if delta < 0.0 { i - 1 } else { i + 1 };
        self.markers[i]
            + delta * (self.markers[neighbor] - self.markers[i])
                / (self.positions[neighbor] - self.positions[i]) as f64
    }

    fn parabolic(&self, i: usize, delta: f64) -> f64 {
        let position = self.positions[i] as f64;
        let previous = self.positions[i - 1] as f64;
        let next = self.positions[i + 1] as f64;

        let left = (position - previous + delta)
            * ((self.markers[i + 1] - self.markers[i]) / (next - position));
        let right = (next - position - delta)
            * ((self.markers[i] - self.markers[i - 1]) / (position - previous));

        self.markers[i] + delta / (next - previous) * (left + right)
    }
}

/// Estimates several percentiles of a stream of finite values at once.
///
/// Until five samples have arrived they are kept and the percentiles are exact (linear
/// interpolation between the closest ranks). Afterwards every percentile has its own
/// [`PSquareQuantileEstimator`].
#[derive(Debug, Clone)]
pub struct PercentileEstimator {
    percentiles: Vec<u8>,
    warm_up: Vec<f64>,
    estimators: Option<Vec<PSquareQuantileEstimator>>,
}

impl PercentileEstimator {
    /// # Errors
    ///
    /// Fails if a percentile is not inside `1..=99`.
    ///
    pub fn new(percentiles: &[u8]) -> Result<Self> {
        for &percentile in percentiles {
            ensure!(
                (1..=99).contains(&percentile),
                error::InvalidPercentile { percentile }
            );
        }

        Ok(Self {
            percentiles: percentiles.to_vec(),
            warm_up: Vec::with_capacity(5),
            estimators: None,
        })
    }

    /// Non-finite values are ignored
    pub fn update(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Ok(());
        }

        if let Some(estimators) = &mut self.estimators {
            for estimator in estimators {
                estimator.update(value);
            }
            return Ok(());
        }

        self.warm_up.push(value);
        if self.warm_up.len() == 5 {
            let estimators = self
                .percentiles
                .iter()
                .map(|&percentile| {
                    PSquareQuantileEstimator::new(
                        f64::from(percentile) / 100.0,
                        self.warm_up.as_slice(),
                    )
                })
                .collect::<Result<_>>()?;
            self.estimators = Some(estimators);
        }

        Ok(())
    }

    /// The estimate per requested percentile, in request order. `NaN` without samples.
    pub fn estimates(&self) -> Vec<(u8, f64)> {
        if let Some(estimators) = &self.estimators {
            return self
                .percentiles
                .iter()
                .zip(estimators)
                .map(|(&percentile, estimator)| (percentile, estimator.quantile_estimate()))
                .collect();
        }

        let mut sorted = self.warm_up.clone();
        sorted.sort_unstable_by(f64::total_cmp);

        self.percentiles
            .iter()
            .map(|&percentile| (percentile, interpolated_percentile(&sorted, percentile)))
            .collect()
    }
}

fn interpolated_percentile(sorted: &[f64], percentile: u8) -> f64 {
    let Some(last) = sorted.len().checked_sub(1) else {
        return f64::NAN;
    };

    let rank = f64::from(percentile) / 100.0 * last as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}
