use std::sync::Arc;

use rastercalc_datatypes::raster::{RasterTile2D, TileInformation};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use snafu::ensure;

use super::{
    CancellationToken, ExecutionContext, ProgressHandle, RasterOperator, TileContext,
    TypedOperator,
};
use crate::error::{self, Error};
use crate::product::{Band, BandDescriptor, Product};
use crate::util::Result;

/// The lifecycle of an [`OperatorPipeline`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum PipelineState {
    Created,
    Initialized,
    Computing,
    Completed,
    Failed,
}

/// How far the computation of a target band got
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum BandStatus {
    Pending,
    Complete,
    /// The computation stopped because of another band or a cancellation
    Aborted,
    Failed,
}

/// Drives an operator from a source product to its target product.
///
/// `Created -> Initialized -> Computing -> Completed | Failed`
///
/// The target is handed out only after a completed computation.
pub struct OperatorPipeline {
    operator: TypedOperator,
    state: PipelineState,
    source: Option<Arc<Product>>,
    target: Option<Product>,
    band_status: Vec<BandStatus>,
    cancellation: CancellationToken,
    progress: ProgressHandle,
}

impl OperatorPipeline {
    pub fn new(operator: impl Into<TypedOperator>) -> Self {
        Self {
            operator: operator.into(),
            state: PipelineState::Created,
            source: None,
            target: None,
            band_status: Vec::new(),
            cancellation: CancellationToken::new(),
            progress: ProgressHandle::new(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// A token that cancels the computation from another thread
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Counts computed tiles over all bands
    pub fn progress(&self) -> ProgressHandle {
        self.progress.clone()
    }

    /// Lets the operator check `source` and creates the target product with the declared bands.
    ///
    /// # Errors
    ///
    /// Fails if the pipeline was initialized already or the operator rejects the source.
    /// An operator error leaves the pipeline `Failed`.
    ///
    pub fn initialize(&mut self, source: Arc<Product>) -> Result<()> {
        self.ensure_state("initialize", PipelineState::Created)?;

        let result = self
            .operator
            .initialize(&source)
            .and_then(Self::create_target);

        match result {
            Ok(target) => {
                self.band_status = vec![BandStatus::Pending; target.bands().len()];
                self.target = Some(target);
                self.source = Some(source);
                self.transition(PipelineState::Initialized);
                Ok(())
            }
            Err(error) => {
                tracing::warn!(%error, "operator initialization failed");
                self.transition(PipelineState::Failed);
                Err(error)
            }
        }
    }

    fn create_target(spec: super::TargetSpec) -> Result<Product> {
        let mut target = Product::from_grid(spec.name, spec.grid);

        for descriptor in spec.bands {
            target.add_band(Self::materialized_band(&target, descriptor))?;
        }

        for pin in spec.pins {
            target.add_pin(pin)?;
        }

        Ok(target)
    }

    fn materialized_band(target: &Product, descriptor: BandDescriptor) -> Band {
        let band = Band::materialized(descriptor.name, descriptor.data_type, target.shape());
        match descriptor.no_data_value {
            Some(no_data_value) => band.with_no_data_value(no_data_value),
            None => band,
        }
    }

    /// Adds another band to the target before the computation starts
    ///
    /// # Errors
    ///
    /// Fails with `LateBandDeclaration` once the computation has started.
    ///
    pub fn declare_band(&mut self, descriptor: BandDescriptor) -> Result<()> {
        match self.state {
            PipelineState::Created => {
                return Err(Error::InvalidPipelineState {
                    operation: "declare_band",
                    state: self.state,
                });
            }
            PipelineState::Computing | PipelineState::Completed | PipelineState::Failed => {
                return Err(Error::LateBandDeclaration {
                    band: descriptor.name,
                });
            }
            PipelineState::Initialized => {}
        }

        let Some(target) = self.target.as_mut() else {
            return Err(Error::InvalidPipelineState {
                operation: "declare_band",
                state: self.state,
            });
        };

        let band = Self::materialized_band(target, descriptor);
        target.add_band(band)?;
        self.band_status.push(BandStatus::Pending);

        Ok(())
    }

    /// Computes every tile of every target band on the thread pool of `ctx`.
    ///
    /// # Errors
    ///
    /// The first error of the operator, with the name of the band attached, or `Cancelled`.
    /// In both cases the pipeline ends `Failed`.
    ///
    pub fn compute(&mut self, ctx: &ExecutionContext) -> Result<()> {
        self.ensure_state("compute", PipelineState::Initialized)?;

        let (Some(source), Some(target)) = (self.source.as_deref(), self.target.as_ref()) else {
            return Err(Error::InvalidPipelineState {
                operation: "compute",
                state: self.state,
            });
        };

        self.state = PipelineState::Computing;
        tracing::info!(product = target.name(), "pipeline computing");

        let span = tracing::debug_span!("compute", product = target.name());
        let _enter = span.enter();

        let tiles: Vec<TileInformation> = ctx
            .tiling_strategy(target.shape())
            .tile_information_iter()
            .collect();

        let work: Vec<(usize, TileInformation)> = (0..target.bands().len())
            .flat_map(|band_index| tiles.iter().map(move |tile| (band_index, *tile)))
            .collect();

        self.progress.reset(work.len());

        let tile_ctx = TileContext::new(self.cancellation.clone(), self.progress.clone());
        let operator = &self.operator;

        let result = ctx.thread_pool().install(|| {
            work.par_iter().try_for_each(|(band_index, tile)| {
                compute_band_tile(operator, source, target, *band_index, tile, &tile_ctx)
            })
        });

        match result {
            Ok(()) => {
                self.band_status.fill(BandStatus::Complete);
                self.transition(PipelineState::Completed);
                Ok(())
            }
            Err(error) => {
                let failed_band = match &error {
                    Error::BandComputation { band, .. } => Some(band.as_str()),
                    _ => None,
                };

                for (status, band) in self.band_status.iter_mut().zip(target.bands()) {
                    *status = if Some(band.name()) == failed_band {
                        BandStatus::Failed
                    } else {
                        BandStatus::Aborted
                    };
                }

                if error.is_cancelled() {
                    tracing::warn!("pipeline cancelled");
                } else {
                    tracing::warn!(%error, "pipeline failed");
                }

                self.transition(PipelineState::Failed);
                Err(error)
            }
        }
    }

    /// The status of a target band, `None` for unknown bands
    pub fn band_status(&self, band: &str) -> Option<BandStatus> {
        let target = self.target.as_ref()?;
        let index = target.bands().iter().position(|b| b.name() == band)?;
        self.band_status.get(index).copied()
    }

    /// The target product of a completed computation
    ///
    /// # Errors
    ///
    /// Fails with `TargetNotAvailable` unless the pipeline is `Completed`.
    ///
    pub fn into_target(self) -> Result<Product> {
        ensure!(
            self.state == PipelineState::Completed,
            error::TargetNotAvailable { state: self.state }
        );

        self.target.ok_or(Error::TargetNotAvailable { state: self.state })
    }

    /// Runs initialization and computation in one go
    pub fn run(
        operator: impl Into<TypedOperator>,
        source: Arc<Product>,
        ctx: &ExecutionContext,
    ) -> Result<Product> {
        let mut pipeline = Self::new(operator);
        pipeline.initialize(source)?;
        pipeline.compute(ctx)?;
        pipeline.into_target()
    }

    fn ensure_state(&self, operation: &'static str, expected: PipelineState) -> Result<()> {
        ensure!(
            self.state == expected,
            error::InvalidPipelineState {
                operation,
                state: self.state,
            }
        );
        Ok(())
    }

    fn transition(&mut self, state: PipelineState) {
        tracing::info!(from = %self.state, to = %state, "pipeline state changed");
        self.state = state;
    }
}

fn compute_band_tile(
    operator: &TypedOperator,
    source: &Product,
    target: &Product,
    band_index: usize,
    tile: &TileInformation,
    ctx: &TileContext,
) -> Result<()> {
    ctx.cancellation().check()?;

    let band = target.bands()[band_index].descriptor();

    tracing::debug!(band = %band.name, tile = tile.index, "computing tile");

    let mut buffer = RasterTile2D::new_filled(*tile, f64::NAN);

    operator
        .compute_tile(source, band, &mut buffer, ctx)
        .and_then(|()| target.write_tile(&band.name, &buffer))
        .map_err(|error| error.with_band(band.name.as_str()))?;

    ctx.progress().increment();

    Ok(())
}
