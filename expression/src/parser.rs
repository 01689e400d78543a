use crate::{
    ast::{AstNode, BinaryOperator, ExpressionAst, Identifier, UnaryOperator},
    error::{self, ExpressionParserError},
    functions::{CONSTANTS, FUNCTIONS, init_functions},
};
use pest::{
    Parser,
    iterators::{Pair, Pairs},
    pratt_parser::{Assoc, Op, PrattParser},
};
use pest_derive::Parser;
use snafu::{OptionExt, ResultExt, ensure};
use std::sync::OnceLock;

type Result<T, E = ExpressionParserError> = std::result::Result<T, E>;

pub type PestError = pest::error::Error<Rule>;

#[derive(Parser)]
#[grammar = "expression.pest"] // relative to src
struct _ExpressionParser;

/// A parser for per-pixel formulas.
///
/// Formulas are pure numeric expressions over variables, constants and a closed set of functions.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExpressionParser;

static EXPRESSION_PARSER: OnceLock<PrattParser<Rule>> = OnceLock::new();

// lowest precedence first
fn init_expression_parser() -> PrattParser<Rule> {
    PrattParser::new()
        .op(Op::infix(Rule::or, Assoc::Left))
        .op(Op::infix(Rule::and, Assoc::Left))
        .op(Op::infix(Rule::equals, Assoc::Left)
            | Op::infix(Rule::not_equals, Assoc::Left)
            | Op::infix(Rule::smaller, Assoc::Left)
            | Op::infix(Rule::smaller_equals, Assoc::Left)
            | Op::infix(Rule::larger, Assoc::Left)
            | Op::infix(Rule::larger_equals, Assoc::Left))
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::subtract, Assoc::Left))
        .op(Op::infix(Rule::multiply, Assoc::Left)
            | Op::infix(Rule::divide, Assoc::Left)
            | Op::infix(Rule::modulo, Assoc::Left))
        .op(Op::prefix(Rule::negate) | Op::prefix(Rule::not))
        .op(Op::infix(Rule::power, Assoc::Right))
}

impl ExpressionParser {
    pub fn parse(&self, input: &str) -> Result<ExpressionAst> {
        ensure!(!input.trim().is_empty(), error::EmptyFormula);

        let pairs = _ExpressionParser::parse(Rule::main, input)
            .map_err(|e| ExpressionParserError::from_syntactic_error(e, input))?;

        let expression = pairs
            .into_iter()
            .find(|pair| pair.as_rule() == Rule::expression)
            .context(error::EmptyFormula)?;

        let root = self.build_expression(expression)?;

        log::trace!("parsed formula `{input}` into {root:?}");

        Ok(ExpressionAst::new(input.to_string(), root))
    }

    /// Builds an `expression` rule, i.e. an operation with an optional `? :` conditional
    fn build_expression(&self, pair: Pair<'_, Rule>) -> Result<AstNode> {
        let position = pair.as_span().start();
        let mut pairs = pair.into_inner();

        let operation = pairs.next().context(error::MissingBranch { position })?;
        let condition = self.build_operation(operation.into_inner())?;

        let Some(then_pair) = pairs.next() else {
            return Ok(condition);
        };
        let else_pair = pairs.next().context(error::MissingBranch { position })?;

        Ok(AstNode::Branch {
            condition: Box::new(condition),
            then_branch: Box::new(self.build_expression(then_pair)?),
            else_branch: Box::new(self.build_expression(else_pair)?),
        })
    }

    fn build_operation(&self, pairs: Pairs<'_, Rule>) -> Result<AstNode> {
        EXPRESSION_PARSER
            .get_or_init(init_expression_parser)
            .map_primary(|primary| self.resolve_primary(primary))
            .map_prefix(|op, operand| Self::resolve_prefix_operation(&op, operand))
            .map_infix(|left, op, right| Self::resolve_infix_operation(left, &op, right))
            .parse(pairs)
    }

    fn resolve_primary(&self, pair: Pair<'_, Rule>) -> Result<AstNode> {
        let position = pair.as_span().start();
        match pair.as_rule() {
            Rule::expression => self.build_expression(pair),
            Rule::number => Ok(AstNode::Constant(pair.as_str().parse().context(
                error::ConstantIsNotAdNumber {
                    constant: pair.as_str(),
                },
            )?)),
            Rule::identifier => {
                let name = pair.as_str();
                if let Some((_, value)) = CONSTANTS.iter().find(|(constant, _)| *constant == name)
                {
                    return Ok(AstNode::Constant(*value));
                }
                Ok(AstNode::Variable(Identifier::from(name)))
            }
            Rule::function => self.resolve_function(pair.into_inner(), position),
            Rule::branch => self.resolve_branch(pair, position),
            rule => Err(ExpressionParserError::UnexpectedRule {
                rule: format!("{rule:?}"),
                position,
            }),
        }
    }

    fn resolve_branch(&self, pair: Pair<'_, Rule>, position: usize) -> Result<AstNode> {
        // keywords are part of the inner pairs, only the expressions are of interest
        let mut expressions = pair
            .into_inner()
            .filter(|pair| pair.as_rule() == Rule::expression);

        let mut next_branch = || -> Result<AstNode> {
            let pair = expressions
                .next()
                .context(error::MissingBranch { position })?;
            self.build_expression(pair)
        };

        let condition = next_branch()?;
        let then_branch = next_branch()?;
        let else_branch = next_branch()?;

        Ok(AstNode::Branch {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    fn resolve_function(&self, mut pairs: Pairs<'_, Rule>, position: usize) -> Result<AstNode> {
        // first one is name
        let name = pairs
            .next()
            .context(error::UnexpectedRule {
                rule: "function without name",
                position,
            })?
            .as_str();

        let args = pairs
            .map(|pair| self.build_expression(pair))
            .collect::<Result<Vec<_>>>()?;

        let function = FUNCTIONS
            .get_or_init(init_functions)
            .get(name)
            .context(error::UnknownFunction {
                function: name,
                position,
            })?;

        ensure!(
            function.arity() == args.len(),
            error::InvalidFunctionArguments {
                name,
                expected: function.arity(),
                actual: args.len(),
                position,
            }
        );

        Ok(AstNode::Function { function, args })
    }

    fn resolve_prefix_operation(op: &Pair<'_, Rule>, operand: Result<AstNode>) -> Result<AstNode> {
        let operand = operand?;

        let op = match op.as_rule() {
            Rule::negate => UnaryOperator::Negate,
            Rule::not => UnaryOperator::Not,
            rule => {
                return Err(ExpressionParserError::UnexpectedRule {
                    rule: format!("{rule:?}"),
                    position: op.as_span().start(),
                });
            }
        };

        // fold negative literals, so `-1` stays a constant
        if let (UnaryOperator::Negate, AstNode::Constant(value)) = (op, &operand) {
            return Ok(AstNode::Constant(-value));
        }

        Ok(AstNode::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn resolve_infix_operation(
        left: Result<AstNode>,
        op: &Pair<'_, Rule>,
        right: Result<AstNode>,
    ) -> Result<AstNode> {
        let (left, right) = (left?, right?);

        let op = match op.as_rule() {
            Rule::add => BinaryOperator::Add,
            Rule::subtract => BinaryOperator::Subtract,
            Rule::multiply => BinaryOperator::Multiply,
            Rule::divide => BinaryOperator::Divide,
            Rule::modulo => BinaryOperator::Modulo,
            Rule::power => BinaryOperator::Power,
            Rule::equals => BinaryOperator::Equal,
            Rule::not_equals => BinaryOperator::NotEqual,
            Rule::smaller => BinaryOperator::LessThan,
            Rule::smaller_equals => BinaryOperator::LessThanOrEqual,
            Rule::larger => BinaryOperator::GreaterThan,
            Rule::larger_equals => BinaryOperator::GreaterThanOrEqual,
            Rule::and => BinaryOperator::And,
            Rule::or => BinaryOperator::Or,
            rule => {
                return Err(ExpressionParserError::UnexpectedRule {
                    rule: format!("{rule:?}"),
                    position: op.as_span().start(),
                });
            }
        };

        Ok(AstNode::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn eval(input: &str) -> f64 {
        eval_with(input, &[])
    }

    fn eval_with(input: &str, bindings: &[(&str, f64)]) -> f64 {
        let bindings: HashMap<&str, f64> = bindings.iter().copied().collect();
        ExpressionParser::default()
            .parse(input)
            .unwrap()
            .evaluate(&bindings)
            .unwrap()
    }

    fn parse_error(input: &str) -> ExpressionParserError {
        ExpressionParser::default().parse(input).unwrap_err()
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn arithmetic() {
        assert_eq!(eval("1"), 1.);
        assert_eq!(eval("1 + 2"), 3.);
        assert_eq!(eval("-1 + 2"), 1.);
        assert_eq!(eval("1 - -2"), 3.);
        assert_eq!(eval("1 + 2 / 4"), 1.5);
        assert_eq!(eval("(1 + 2) * 3"), 9.);
        assert_eq!(eval("7 % 4"), 3.);
        assert_eq!(eval("1.5e2"), 150.);
        assert_eq!(eval(".5"), 0.5);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn power_is_right_associative_and_binds_tighter_than_negation() {
        assert_eq!(eval("2 ** 3 ** 2"), 512.);
        assert_eq!(eval("2 ^ 3"), 8.);
        assert_eq!(eval("-2 ^ 2"), -4.);
        assert_eq!(eval("2 ^ -1"), 0.5);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn comparisons_and_logic() {
        assert_eq!(eval("1 < 2"), 1.);
        assert_eq!(eval("1 >= 2"), 0.);
        assert_eq!(eval("2 == 2 && 3 != 4"), 1.);
        assert_eq!(eval("1 > 2 or 3 > 2"), 1.);
        assert_eq!(eval("not 1"), 0.);
        assert_eq!(eval("!0"), 1.);
        assert_eq!(eval("1 + 1 == 2"), 1.);
        assert_eq!(eval("NaN == NaN"), 0.);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn conditionals() {
        assert_eq!(eval_with("a > 0 ? 10 : 20", &[("a", 1.)]), 10.);
        assert_eq!(eval_with("a > 0 ? 10 : 20", &[("a", -1.)]), 20.);
        assert_eq!(eval("0 ? 1 : 0 ? 2 : 3"), 3.);
        assert_eq!(eval_with("if a then 1 else 2", &[("a", 0.)]), 2.);
        assert_eq!(eval_with("IF a > 1 THEN a ELSE 0", &[("a", 4.)]), 4.);
        assert_eq!(eval("select(1, 5, 6)"), 5.);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn variables_and_constants() {
        assert_eq!(
            eval_with("(nir - red) / (nir + red)", &[("nir", 3.), ("red", 1.)]),
            0.5
        );
        assert_eq!(eval("PI"), std::f64::consts::PI);
        assert_eq!(eval("pi()"), std::f64::consts::PI);
        assert!(eval("NaN").is_nan());
        // identifiers that start with a keyword
        assert_eq!(eval_with("iffy + order", &[("iffy", 1.), ("order", 2.)]), 3.);
        assert_eq!(eval_with("notable", &[("notable", 2.)]), 2.);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn functions() {
        assert_eq!(eval("max(1, 0)"), 1.);
        assert_eq!(eval("min(1, max(2, 3))"), 1.);
        assert_eq!(eval("sqrt(16) + abs(-2)"), 6.);
        assert_eq!(eval("round(1.3) + ceil(1.2) + floor(1.1)"), 4.);
        assert_eq!(eval("cos(0)"), 1.);
        assert_eq!(eval("sin(0)"), 0.);
    }

    #[test]
    fn syntax_errors_carry_token_and_position() {
        let error = parse_error("a + * b");
        match error {
            ExpressionParserError::Syntax {
                token,
                position,
                line,
                column,
                ..
            } => {
                assert_eq!(token, "*");
                assert_eq!(position, 4);
                assert_eq!(line, 1);
                assert_eq!(column, 5);
            }
            other => panic!("unexpected error {other:?}"),
        }

        assert!(matches!(
            parse_error("(1 + 2"),
            ExpressionParserError::Syntax { position: 6, .. }
        ));
        assert!(matches!(parse_error("   "), ExpressionParserError::EmptyFormula));
        assert!(matches!(
            parse_error("a = 1"),
            ExpressionParserError::Syntax { .. }
        ));
    }

    #[test]
    fn function_errors() {
        assert!(matches!(
            parse_error("foo(1)"),
            ExpressionParserError::UnknownFunction { function, position: 0 } if function == "foo"
        ));
        assert!(matches!(
            parse_error("1 + max(1)"),
            ExpressionParserError::InvalidFunctionArguments {
                expected: 2,
                actual: 1,
                position: 4,
                ..
            }
        ));
    }

    #[test]
    fn it_is_deterministic() {
        let ast = ExpressionParser::default()
            .parse("sin(X) * cos(Y) + sqrt(X * Y) / 3")
            .unwrap();
        let bindings: HashMap<&str, f64> = [("X", 12.5), ("Y", 3.5)].into_iter().collect();

        let first = ast.evaluate(&bindings).unwrap();
        let second = ast.evaluate(&bindings).unwrap();

        assert_eq!(first.to_bits(), second.to_bits());
    }
}
