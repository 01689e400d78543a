use rastercalc_expression::error::{ExpressionEvaluationError, ExpressionParserError};
use snafu::Snafu;

use crate::engine::PipelineState;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[snafu(context(suffix(false)))] // disables default `Snafu` suffix
pub enum Error {
    #[snafu(display("DataTypeError: {}", source))]
    DataType {
        source: rastercalc_datatypes::error::Error,
    },

    #[snafu(display("FormulaSyntaxError: {}", source))]
    FormulaSyntax { source: ExpressionParserError },

    #[snafu(display("ExpressionError: {}", source))]
    Expression { source: ExpressionEvaluationError },

    #[snafu(display("UnboundVariableError: `{}` is neither a band nor a coordinate", variable))]
    UnboundVariable { variable: String },

    #[snafu(display("CyclicDependencyError: {}", cycle.join(" -> ")))]
    CyclicDependency { cycle: Vec<String> },

    #[snafu(display("ReadOnlyBandError: the virtual band `{}` cannot be written", band))]
    ReadOnlyBand { band: String },

    #[snafu(display("IncompatibleGeocodingError: {}", source))]
    IncompatibleGeocoding {
        source: rastercalc_datatypes::error::Error,
    },

    #[snafu(display(
        "LateBandDeclarationError: band `{}` was declared after the computation started",
        band
    ))]
    LateBandDeclaration { band: String },

    #[snafu(display("The computation was cancelled"))]
    Cancelled,

    #[snafu(display("Computing band `{}` failed: {}", band, source))]
    BandComputation { band: String, source: Box<Error> },

    #[snafu(display("A band named `{}` already exists", band))]
    DuplicateBandName { band: String },

    #[snafu(display("`{}` is not a valid band name", band))]
    InvalidBandName { band: String },

    #[snafu(display("There is no band named `{}`", band))]
    UnknownBand { band: String },

    #[snafu(display(
        "The tile at ({}, {}) of size {}×{} is not inside the grid",
        x0,
        y0,
        width,
        height
    ))]
    TileOutOfBounds {
        x0: usize,
        y0: usize,
        width: usize,
        height: usize,
    },

    #[snafu(display("A pin named `{}` already exists", pin))]
    DuplicatePinName { pin: String },

    #[snafu(display("The product `{}` is unknown to this session", product))]
    UnknownProduct { product: String },

    #[snafu(display("The product `{}` is shared and cannot be modified", product))]
    ProductInUse { product: String },

    #[snafu(display(
        "The data of band `{}` has the shape {:?}, expected {:?}",
        band,
        found,
        expected
    ))]
    BandShapeMismatch {
        band: String,
        expected: [usize; 2],
        found: [usize; 2],
    },

    #[snafu(display("The mask has the shape {:?}, expected {:?}", found, expected))]
    MaskShapeMismatch {
        expected: [usize; 2],
        found: [usize; 2],
    },

    #[snafu(display("The operation `{}` is not allowed in state {}", operation, state))]
    InvalidPipelineState {
        operation: &'static str,
        state: PipelineState,
    },

    #[snafu(display("The target product is only available after a completed computation, the pipeline is {}", state))]
    TargetNotAvailable { state: PipelineState },

    #[snafu(display("InvalidOperatorSpec: {}", reason))]
    InvalidOperatorSpec { reason: String },

    #[snafu(display("Percentiles must be between 1 and 99, got {}", percentile))]
    InvalidPercentile { percentile: u8 },

    #[snafu(display("Quantiles must be inside (0, 1), got {}", quantile))]
    InvalidQuantile { quantile: f64 },

    #[snafu(display("At least {} valid samples are needed", required))]
    NotEnoughSamples { required: usize },

    #[snafu(display("{}", message))]
    Custom { message: String },

    #[snafu(display("Could not build the thread pool: {}", source))]
    ThreadPoolBuild { source: rayon::ThreadPoolBuildError },

    #[snafu(display("ConfigError: {}", source))]
    Config { source: config::ConfigError },

    #[snafu(display("SerdeJsonError: {}", source))]
    SerdeJson { source: serde_json::Error },
}

impl Error {
    /// Creates an error for user-defined operators and callbacks
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }

    /// Attaches the name of the band whose computation failed
    #[must_use]
    pub fn with_band(self, band: impl Into<String>) -> Self {
        match self {
            Self::Cancelled | Self::BandComputation { .. } => self,
            source => Self::BandComputation {
                band: band.into(),
                source: Box::new(source),
            },
        }
    }

    /// The error without band attachments
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::BandComputation { source, .. } => source.root_cause(),
            error => error,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), Self::Cancelled)
    }
}

impl From<rastercalc_datatypes::error::Error> for Error {
    fn from(datatype_error: rastercalc_datatypes::error::Error) -> Self {
        use rastercalc_datatypes::error::Error as DataTypeError;

        match datatype_error {
            DataTypeError::IncompatibleGeocoding { .. }
            | DataTypeError::IncompatibleSpatialReference { .. } => Self::IncompatibleGeocoding {
                source: datatype_error,
            },
            _ => Self::DataType {
                source: datatype_error,
            },
        }
    }
}

impl From<ExpressionParserError> for Error {
    fn from(source: ExpressionParserError) -> Self {
        Self::FormulaSyntax { source }
    }
}

impl From<ExpressionEvaluationError> for Error {
    fn from(source: ExpressionEvaluationError) -> Self {
        match source {
            ExpressionEvaluationError::UnboundVariable { variable } => {
                Self::UnboundVariable { variable }
            }
            source => Self::Expression { source },
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(source: rayon::ThreadPoolBuildError) -> Self {
        Self::ThreadPoolBuild { source }
    }
}

impl From<config::ConfigError> for Error {
    fn from(source: config::ConfigError) -> Self {
        Self::Config { source }
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Self::SerdeJson { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_names_are_attached_once() {
        let error = Error::custom("boom").with_band("b1").with_band("b2");

        assert!(matches!(&error, Error::BandComputation { band, .. } if band == "b1"));
        assert!(matches!(error.root_cause(), Error::Custom { message } if message == "boom"));
        assert_eq!(error.to_string(), "Computing band `b1` failed: boom");
    }

    #[test]
    fn cancellation_stays_distinct() {
        let error = Error::Cancelled.with_band("b1");

        assert!(matches!(error, Error::Cancelled));
        assert!(error.is_cancelled());
    }

    #[test]
    fn unbound_variables_are_lifted() {
        let error: Error = ExpressionEvaluationError::UnboundVariable {
            variable: "b3".to_string(),
        }
        .into();

        assert!(matches!(error, Error::UnboundVariable { variable } if variable == "b3"));
    }
}
