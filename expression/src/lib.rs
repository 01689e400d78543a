// configure default clippy lints
#![deny(clippy::correctness)]
#![warn(clippy::complexity, clippy::style, clippy::perf, clippy::pedantic)]
// disable some pedantic lints
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::similar_names,
    clippy::wildcard_imports
)]
// enable some restriction lints
#![warn(
    clippy::dbg_macro,
    clippy::print_stderr,
    clippy::print_stdout,
    clippy::unimplemented,
    clippy::unwrap_used
)]

mod ast;
pub mod error;
mod functions;
mod linked;
mod parser;
mod util;

pub use ast::{AstNode, BinaryOperator, Bindings, ExpressionAst, Identifier, UnaryOperator, is_true};
pub use functions::{Function, FunctionKernel};
pub use linked::LinkedExpression;
pub use parser::ExpressionParser;

/// Parses and evaluates `formula` in one go.
///
/// Prefer [`ExpressionParser::parse`] and [`ExpressionAst::link`] when the same formula is
/// evaluated more than once.
pub fn evaluate<B: Bindings + ?Sized>(
    formula: &str,
    bindings: &B,
) -> Result<f64, error::ExpressionError> {
    let ast = ExpressionParser::default().parse(formula)?;
    Ok(ast.evaluate(bindings)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use std::collections::HashMap;

    #[test]
    fn it_evaluates_formulas_directly() {
        let bindings: HashMap<&str, f64> = [("X", 0.5), ("Y", 1.5)].into_iter().collect();

        let value = evaluate("sqrt(sqr(X) + sqr(Y))", &bindings).unwrap();

        assert!(approx_eq!(f64, value, 2.5_f64.sqrt()));
    }

    #[test]
    fn it_distinguishes_parse_and_evaluation_errors() {
        let bindings: HashMap<&str, f64> = HashMap::new();

        assert!(matches!(
            evaluate("1 +", &bindings),
            Err(error::ExpressionError::Parser { .. })
        ));
        assert!(matches!(
            evaluate("unknown", &bindings),
            Err(error::ExpressionError::Evaluation { .. })
        ));
    }
}
