mod band_maths;
mod statistics;
mod subset;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use band_maths::{BandMaths, BandMathsParams, TargetBand};
pub use statistics::{
    DEFAULT_PERCENTILES, compute_statistics, compute_statistics_with_percentiles,
};
pub use subset::{PixelRegion, Subset, SubsetParams};

use crate::engine::TypedOperator;
use crate::error::Error;

/// A serializable description of one of the built-in operators, e.g.
///
/// ```json
/// { "type": "bandMaths", "params": { "targetBands": [{ "name": "sum", "expression": "b1 + b2" }] } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "camelCase")]
pub enum OperatorParams {
    Subset(SubsetParams),
    BandMaths(BandMathsParams),
}

impl OperatorParams {
    pub fn into_operator(self) -> TypedOperator {
        match self {
            Self::Subset(params) => Subset::new(params).into(),
            Self::BandMaths(params) => BandMaths::new(params).into(),
        }
    }
}

impl FromStr for OperatorParams {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(s)?)
    }
}

impl From<OperatorParams> for TypedOperator {
    fn from(params: OperatorParams) -> Self {
        params.into_operator()
    }
}
