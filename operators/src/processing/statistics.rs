use itertools::Itertools;
use rastercalc_datatypes::raster::{GridSize, TileInformation};
use rayon::prelude::*;
use snafu::OptionExt;

use crate::engine::{CancellationToken, ExecutionContext};
use crate::error::{self, Error};
use crate::product::{Band, Product};
use crate::roi::RoiMask;
use crate::util::Result;
use crate::util::number_statistics::{NumberStatistics, Percentile, Statistics};
use crate::util::statistics::PercentileEstimator;

/// Percentiles that are commonly reported next to the median
pub const DEFAULT_PERCENTILES: [u8; 2] = [90, 95];

const MEDIAN: u8 = 50;

/// Computes the statistics of `band`, restricted to the pixels of `roi` if given.
///
/// Tiles are accumulated in parallel on the thread pool of `ctx` and merged afterwards.
/// No-data and non-finite pixels are counted as invalid.
///
/// # Errors
///
/// Fails if the band cannot be read, the mask does not match the product or the computation
/// was cancelled.
///
pub fn compute_statistics(
    product: &Product,
    band: &str,
    roi: Option<&RoiMask>,
    ctx: &ExecutionContext,
    cancellation: &CancellationToken,
) -> Result<Statistics> {
    compute(product, band, roi, None, ctx, cancellation)
}

/// Like [`compute_statistics`], and estimates the median and the given `percentiles` (`1..=99`).
///
/// The quantiles are P² estimates. They cannot be merged across tiles, so they are taken in a
/// second, sequential pass over full-width row strips in row-major pixel order. The estimates
/// therefore do not depend on the tiling or the number of threads.
///
/// # Errors
///
/// Like [`compute_statistics`], and fails with `InvalidPercentile` for percentiles outside `1..=99`.
///
pub fn compute_statistics_with_percentiles(
    product: &Product,
    band: &str,
    roi: Option<&RoiMask>,
    percentiles: &[u8],
    ctx: &ExecutionContext,
    cancellation: &CancellationToken,
) -> Result<Statistics> {
    compute(product, band, roi, Some(percentiles), ctx, cancellation)
}

fn compute(
    product: &Product,
    band: &str,
    roi: Option<&RoiMask>,
    percentiles: Option<&[u8]>,
    ctx: &ExecutionContext,
    cancellation: &CancellationToken,
) -> Result<Statistics> {
    let band_info = product.band(band).context(error::UnknownBand { band })?;

    if let Some(roi) = roi {
        roi.ensure_shape(product.shape())?;
    }

    let requested: Option<Vec<u8>> = percentiles.map(|percentiles| {
        std::iter::once(MEDIAN)
            .chain(percentiles.iter().copied())
            .unique()
            .collect()
    });
    let estimator = requested
        .as_deref()
        .map(PercentileEstimator::new)
        .transpose()?;

    let span = tracing::debug_span!("statistics", product = product.name(), band);
    let _enter = span.enter();

    let result = product
        .check_band_dependencies(band_info)
        .and_then(|()| accumulate(product, band_info, roi, ctx, cancellation))
        .and_then(|statistics| {
            let mut statistics = statistics.finalize();

            if let (Some(mut estimator), Some(percentiles)) = (estimator, percentiles) {
                estimate_percentiles(product, band_info, roi, &mut estimator, ctx, cancellation)?;

                let estimates = estimator.estimates();
                let value_of = |percentile: u8| {
                    estimates
                        .iter()
                        .find(|(p, _)| *p == percentile)
                        .map_or(f64::NAN, |(_, value)| *value)
                };

                statistics.median = Some(value_of(MEDIAN));
                statistics.percentiles = percentiles
                    .iter()
                    .copied()
                    .unique()
                    .map(|percentile| Percentile {
                        percentile,
                        value: value_of(percentile),
                    })
                    .collect();
            }

            Ok(statistics)
        });

    match result {
        Ok(statistics) => {
            tracing::debug!(
                count = statistics.count,
                invalid = statistics.invalid_count,
                "computed statistics"
            );
            Ok(statistics)
        }
        Err(Error::Cancelled) => {
            tracing::warn!("statistics cancelled");
            Err(Error::Cancelled)
        }
        Err(error) => Err(error.with_band(band)),
    }
}

/// Accumulates the moments of all tiles in parallel
fn accumulate(
    product: &Product,
    band: &Band,
    roi: Option<&RoiMask>,
    ctx: &ExecutionContext,
    cancellation: &CancellationToken,
) -> Result<NumberStatistics> {
    let tiles: Vec<TileInformation> = ctx
        .tiling_strategy(product.shape())
        .tile_information_iter()
        .collect();

    ctx.thread_pool().install(|| {
        tiles
            .par_iter()
            .map(|tile| {
                cancellation.check()?;

                let values = product.read_tile_prechecked(band, tile)?;
                let mut statistics = NumberStatistics::default();

                for (pixel, value) in values.global_pixels() {
                    if roi.is_some_and(|roi| !roi.is_included(pixel)) {
                        continue;
                    }

                    if band.is_no_data(value) {
                        statistics.update_invalid();
                    } else {
                        statistics.update(value);
                    }
                }

                Ok(statistics)
            })
            .try_reduce(NumberStatistics::default, |a, b| Ok(a.merged(b)))
    })
}

/// Feeds the valid pixels into `estimator`, strip by strip in row-major order
fn estimate_percentiles(
    product: &Product,
    band: &Band,
    roi: Option<&RoiMask>,
    estimator: &mut PercentileEstimator,
    ctx: &ExecutionContext,
    cancellation: &CancellationToken,
) -> Result<()> {
    let strip_height = ctx.tiling_specification().tile_size_in_pixels().axis_size_y();

    for y0 in (0..product.height()).step_by(strip_height) {
        cancellation.check()?;

        let height = strip_height.min(product.height() - y0);
        let strip = TileInformation::region(0, y0, product.width(), height);
        tracing::debug!(y0, height, "estimating percentiles");

        let values = product.read_tile_prechecked(band, &strip)?;
        for (pixel, value) in values.global_pixels() {
            if roi.is_some_and(|roi| !roi.is_included(pixel)) || band.is_no_data(value) {
                continue;
            }
            estimator.update(value)?;
        }
    }

    Ok(())
}
