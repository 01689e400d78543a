use crate::parser::PestError;
use pest::error::{InputLocation, LineColLocation};
use snafu::Snafu;

/// An expression error type that concerns the parsing of user formulas
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[snafu(context(suffix(false)))] // disables default `Snafu` suffix
pub enum ExpressionParserError {
    #[snafu(display(
        "Syntax error at position {position} (line {line}, column {column}) near `{token}`: {message}"
    ))]
    Syntax {
        token: String,
        position: usize,
        line: usize,
        column: usize,
        message: String,
    },

    #[snafu(display("The formula is empty"))]
    EmptyFormula,

    #[snafu(display("Unknown function `{function}` at position {position}"))]
    UnknownFunction { function: String, position: usize },

    #[snafu(display(
        "Invalid function arguments for function `{name}` at position {position}: expected {expected}, got {actual}"
    ))]
    InvalidFunctionArguments {
        name: String,
        expected: usize,
        actual: usize,
        position: usize,
    },

    #[snafu(display("The constant `{constant}` is not a number"))]
    ConstantIsNotAdNumber {
        source: std::num::ParseFloatError,
        constant: String,
    },

    #[snafu(display("Unexpected rule `{rule}` at position {position}"))]
    UnexpectedRule { rule: String, position: usize },

    #[snafu(display("The conditional expression at position {position} is missing a branch"))]
    MissingBranch { position: usize },
}

impl ExpressionParserError {
    pub(crate) fn from_syntactic_error(error: PestError, input: &str) -> Self {
        let position = match error.location {
            InputLocation::Pos(position) | InputLocation::Span((position, _)) => position,
        };
        let (line, column) = match error.line_col {
            LineColLocation::Pos(line_col) | LineColLocation::Span(line_col, _) => line_col,
        };

        Self::Syntax {
            token: offending_token(input, position),
            position,
            line,
            column,
            message: error.variant.message().into_owned(),
        }
    }

    /// The byte offset in the formula where the error was detected, if known
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::Syntax { position, .. }
            | Self::UnknownFunction { position, .. }
            | Self::InvalidFunctionArguments { position, .. }
            | Self::UnexpectedRule { position, .. }
            | Self::MissingBranch { position } => Some(*position),
            Self::EmptyFormula | Self::ConstantIsNotAdNumber { .. } => None,
        }
    }
}

/// An expression error type that concerns binding variables to values
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[snafu(context(suffix(false)))] // disables default `Snafu` suffix
pub enum ExpressionEvaluationError {
    #[snafu(display("The variable `{variable}` is not bound"))]
    UnboundVariable { variable: String },

    #[snafu(display("The slot `{slot}` was defined multiple times"))]
    DuplicateSlotName { slot: String },

    #[snafu(display("A slot name must not be empty"))]
    EmptySlotName,
}

/// Errors of the one-shot [`crate::evaluate`] function
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[snafu(context(suffix(false)))] // disables default `Snafu` suffix
pub enum ExpressionError {
    #[snafu(display("{source}"))]
    Parser { source: ExpressionParserError },

    #[snafu(display("{source}"))]
    Evaluation { source: ExpressionEvaluationError },
}

impl From<ExpressionParserError> for ExpressionError {
    fn from(source: ExpressionParserError) -> Self {
        Self::Parser { source }
    }
}

impl From<ExpressionEvaluationError> for ExpressionError {
    fn from(source: ExpressionEvaluationError) -> Self {
        Self::Evaluation { source }
    }
}

/// Extracts the whitespace delimited token starting at `position`
fn offending_token(input: &str, position: usize) -> String {
    let rest = input.get(position..).unwrap_or_default();
    let token: String = rest.chars().take_while(|c| !c.is_whitespace()).collect();

    if token.is_empty() {
        "end of input".to_string()
    } else {
        token
    }
}
