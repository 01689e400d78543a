mod context;
mod execution_context;
mod operator;
mod pipeline;

pub use context::{CancellationToken, ProgressHandle, TileContext};
pub use execution_context::ExecutionContext;
pub use operator::{CustomOperator, RasterOperator, TargetSpec, TypedOperator};
pub use pipeline::{BandStatus, OperatorPipeline, PipelineState};

pub use crate::product::BandDescriptor;
