use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};

/// Running statistics of a stream of numbers.
///
/// Uses Welford's algorithm for single updates and Chan's parallel formula for merging
/// partial results, so the accumulation is numerically stable and can be split across
/// threads in any way.
///
/// Non-finite values are not part of the statistics but counted as invalid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberStatistics {
    count: usize,
    invalid_count: usize,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl Default for NumberStatistics {
    fn default() -> Self {
        Self {
            count: 0,
            invalid_count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl NumberStatistics {
    #[inline]
    pub fn update<V>(&mut self, value: V)
    where
        V: AsPrimitive<f64>,
    {
        let value = value.as_();

        if !value.is_finite() {
            self.invalid_count += 1;
            return;
        }

        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;

        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Counts a sample that has no valid value
    #[inline]
    pub fn update_invalid(&mut self) {
        self.invalid_count += 1;
    }

    /// Updates with `value` if the pixel is `included`, samples outside the mask are ignored
    #[inline]
    pub fn update_masked<V>(&mut self, value: V, included: bool)
    where
        V: AsPrimitive<f64>,
    {
        if included {
            self.update(value);
        }
    }

    /// Combines two partial results
    pub fn merge(&mut self, other: &Self) {
        if other.count == 0 {
            self.invalid_count += other.invalid_count;
            return;
        }
        if self.count == 0 {
            let invalid_count = self.invalid_count + other.invalid_count;
            *self = *other;
            self.invalid_count = invalid_count;
            return;
        }

        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let other_weight = other.count as f64 / count as f64;

        self.mean += delta * other_weight;
        self.m2 += other.m2 + delta * delta * self.count as f64 * other_weight;
        self.count = count;
        self.invalid_count += other.invalid_count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    #[must_use]
    pub fn merged(mut self, other: Self) -> Self {
        self.merge(&other);
        self
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn invalid_count(&self) -> usize {
        self.invalid_count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        self.mean
    }

    /// The population variance
    pub fn var(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        (self.m2 / self.count as f64).max(0.0)
    }

    pub fn std_dev(&self) -> f64 {
        self.var().sqrt()
    }

    pub fn min(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        self.min
    }

    pub fn max(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        self.max
    }

    /// Creates the final record. Can be called any number of times.
    pub fn finalize(&self) -> Statistics {
        Statistics {
            count: self.count,
            invalid_count: self.invalid_count,
            mean: self.mean(),
            variance: self.var(),
            std_dev: self.std_dev(),
            min: self.min(),
            max: self.max(),
            median: None,
            percentiles: Vec::new(),
        }
    }
}

impl<V> FromIterator<(V, bool)> for NumberStatistics
where
    V: AsPrimitive<f64>,
{
    fn from_iter<I: IntoIterator<Item = (V, bool)>>(iter: I) -> Self {
        let mut statistics = Self::default();
        statistics.extend(iter);
        statistics
    }
}

impl<V> Extend<(V, bool)> for NumberStatistics
where
    V: AsPrimitive<f64>,
{
    fn extend<I: IntoIterator<Item = (V, bool)>>(&mut self, iter: I) {
        for (value, included) in iter {
            self.update_masked(value, included);
        }
    }
}

/// Summary statistics of a band or region.
///
/// The moments are `NaN` if there was no valid sample. Median and percentiles are only
/// present if they were requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub count: usize,
    pub invalid_count: usize,
    pub mean: f64,
    /// population variance
    pub variance: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub percentiles: Vec<Percentile>,
}

/// An estimated percentile of a band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentile {
    /// in `1..=99`
    pub percentile: u8,
    pub value: f64,
}

impl Statistics {
    pub fn is_valid(&self) -> bool {
        self.count > 0
    }
}

impl From<NumberStatistics> for Statistics {
    fn from(statistics: NumberStatistics) -> Self {
        statistics.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use float_cmp::approx_eq;

    #[test]
    fn direct_and_merged_accumulation_agree() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];

        let mut direct = NumberStatistics::default();
        for value in values {
            direct.update(value);
        }

        let mut left = NumberStatistics::default();
        let mut right = NumberStatistics::default();
        for value in &values[..2] {
            left.update(*value);
        }
        for value in &values[2..] {
            right.update(*value);
        }
        left.merge(&right);

        for statistics in [direct, left] {
            assert_eq!(statistics.count(), 5);
            assert_abs_diff_eq!(statistics.mean(), 3.0, epsilon = 1e-9);
            assert_abs_diff_eq!(statistics.var(), 2.0, epsilon = 1e-9);
            assert!(approx_eq!(f64, statistics.min(), 1.0));
            assert!(approx_eq!(f64, statistics.max(), 5.0));
        }
    }

    #[test]
    fn merge_is_commutative() {
        let a: NumberStatistics = [(0.5, true), (7.25, true), (-3.0, true)].into_iter().collect();
        let b: NumberStatistics = [(100.0, true), (1e-3, true)].into_iter().collect();

        let ab = a.merged(b);
        let ba = b.merged(a);

        assert_eq!(ab.count(), ba.count());
        assert_abs_diff_eq!(ab.mean(), ba.mean(), epsilon = 1e-12);
        assert_abs_diff_eq!(ab.var(), ba.var(), epsilon = 1e-9);
    }

    #[test]
    fn merging_with_empty_keeps_values() {
        let a: NumberStatistics = [(2.0, true), (4.0, true)].into_iter().collect();
        let mut empty = NumberStatistics::default();
        empty.update(f64::NAN);

        let merged = empty.merged(a);
        assert_eq!(merged.count(), 2);
        assert_eq!(merged.invalid_count(), 1);
        assert_abs_diff_eq!(merged.mean(), 3.0);
        assert_abs_diff_eq!(merged.var(), 1.0);

        let merged = a.merged(empty);
        assert_eq!(merged.invalid_count(), 1);
        assert_abs_diff_eq!(merged.mean(), 3.0);
    }

    #[test]
    fn non_finite_values_are_counted_as_invalid() {
        let mut statistics = NumberStatistics::default();
        statistics.update(f64::NAN);
        statistics.update(f64::INFINITY);
        statistics.update(f64::NEG_INFINITY);
        statistics.update(1_u8);
        statistics.update_invalid();

        assert_eq!(statistics.count(), 1);
        assert_eq!(statistics.invalid_count(), 4);
        assert_abs_diff_eq!(statistics.mean(), 1.0);
        assert_abs_diff_eq!(statistics.var(), 0.0);
    }

    #[test]
    fn masked_samples_are_ignored() {
        let mut statistics: NumberStatistics =
            [(1.0, true), (1000.0, false), (f64::NAN, false), (3.0, true)]
                .into_iter()
                .collect();
        statistics.extend([(5_i32, true)]);

        assert_eq!(statistics.count(), 3);
        assert_eq!(statistics.invalid_count(), 0);
        assert_abs_diff_eq!(statistics.mean(), 3.0);
    }

    #[test]
    fn empty_statistics() {
        let statistics = NumberStatistics::default().finalize();

        assert!(!statistics.is_valid());
        assert!(statistics.mean.is_nan());
        assert!(statistics.variance.is_nan());
        assert!(statistics.min.is_nan());
    }

    #[test]
    fn finalize_is_idempotent_and_serializable() {
        let statistics: NumberStatistics = [(1.0, true), (3.0, true)].into_iter().collect();

        let first = statistics.finalize();
        let second = statistics.finalize();
        assert_eq!(first, second);
        assert_abs_diff_eq!(first.std_dev, 1.0);

        let json = serde_json::to_value(first).unwrap();
        assert!(json.get("median").is_none());
        assert_eq!(json["count"], 2);
        assert_eq!(json["invalidCount"], 0);
        assert_eq!(json["variance"], 1.0);
    }

    #[test]
    fn it_is_stable_for_large_offsets() {
        let statistics: NumberStatistics = (0..1000)
            .map(|i| (1e9 + f64::from(i % 2), true))
            .collect();

        assert_abs_diff_eq!(statistics.var(), 0.25, epsilon = 1e-6);
    }
}
