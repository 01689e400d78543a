use crate::{
    error::{self, ExpressionEvaluationError},
    functions::Function,
    linked::LinkedExpression,
};
use snafu::OptionExt;
use std::{
    collections::{BTreeSet, HashMap},
    hash::BuildHasher,
};

type Result<T, E = ExpressionEvaluationError> = std::result::Result<T, E>;

/// A parsed formula as an abstract syntax tree.
///
/// The tree is immutable and free of side effects, so evaluating it twice with the same
/// bindings yields bit-identical results.
#[derive(Debug, Clone)]
pub struct ExpressionAst {
    formula: String,
    root: AstNode,
    variables: BTreeSet<Identifier>,
}

impl ExpressionAst {
    pub(crate) fn new(formula: String, root: AstNode) -> Self {
        let mut variables = BTreeSet::new();
        root.collect_variables(&mut variables);

        Self {
            formula,
            root,
            variables,
        }
    }

    /// The source text this tree was parsed from
    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn root(&self) -> &AstNode {
        &self.root
    }

    /// All variable names the formula refers to, sorted and without duplicates
    pub fn referenced_variables(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(AsRef::as_ref)
    }

    pub fn references(&self, variable: &str) -> bool {
        self.variables.iter().any(|v| v.as_ref() == variable)
    }

    /// Resolves every variable to its position in `slot_names`.
    ///
    /// The resulting [`LinkedExpression`] is evaluated with a slice of values in the same order.
    pub fn link<S: AsRef<str>>(&self, slot_names: &[S]) -> Result<LinkedExpression> {
        LinkedExpression::new(self, slot_names)
    }

    /// Evaluates the formula by looking up each variable in `bindings`
    pub fn evaluate<B: Bindings + ?Sized>(&self, bindings: &B) -> Result<f64> {
        let names: Vec<&str> = self.referenced_variables().collect();

        let values = names
            .iter()
            .map(|&name| {
                bindings.value(name).context(error::UnboundVariable {
                    variable: name.to_string(),
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        Ok(self.link(&names)?.evaluate(&values))
    }
}

#[derive(Debug, Clone)]
pub enum AstNode {
    Constant(f64),
    Variable(Identifier),
    Function {
        function: &'static Function,
        args: Vec<AstNode>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<AstNode>,
    },
    Binary {
        left: Box<AstNode>,
        op: BinaryOperator,
        right: Box<AstNode>,
    },
    Branch {
        condition: Box<AstNode>,
        then_branch: Box<AstNode>,
        else_branch: Box<AstNode>,
    },
}

impl AstNode {
    fn collect_variables(&self, variables: &mut BTreeSet<Identifier>) {
        match self {
            Self::Constant(_) => {}
            Self::Variable(identifier) => {
                variables.insert(identifier.clone());
            }
            Self::Function { args, .. } => {
                for arg in args {
                    arg.collect_variables(variables);
                }
            }
            Self::Unary { operand, .. } => operand.collect_variables(variables),
            Self::Binary { left, right, .. } => {
                left.collect_variables(variables);
                right.collect_variables(variables);
            }
            Self::Branch {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.collect_variables(variables);
                then_branch.collect_variables(variables);
                else_branch.collect_variables(variables);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Identifier(String);

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        std::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Not,
}

impl UnaryOperator {
    #[inline]
    pub fn apply(self, a: f64) -> f64 {
        match self {
            Self::Negate => -a,
            Self::Not => from_bool(!is_true(a)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
}

impl BinaryOperator {
    /// Applies the operator to already evaluated operands.
    ///
    /// `And` and `Or` are short-circuited by the evaluator and only reach this
    /// method with both sides known.
    #[inline]
    #[allow(clippy::float_cmp)]
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Add => a + b,
            Self::Subtract => a - b,
            Self::Multiply => a * b,
            Self::Divide => a / b,
            Self::Modulo => a % b,
            Self::Power => a.powf(b),
            Self::Equal => from_bool(a == b),
            Self::NotEqual => from_bool(a != b),
            Self::LessThan => from_bool(a < b),
            Self::LessThanOrEqual => from_bool(a <= b),
            Self::GreaterThan => from_bool(a > b),
            Self::GreaterThanOrEqual => from_bool(a >= b),
            Self::And => from_bool(is_true(a) && is_true(b)),
            Self::Or => from_bool(is_true(a) || is_true(b)),
        }
    }
}

/// Numbers are true if they are neither zero nor NaN
#[inline]
pub fn is_true(value: f64) -> bool {
    value != 0.0 && !value.is_nan()
}

#[inline]
pub(crate) fn from_bool(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

/// A lookup of variable values for a single evaluation
pub trait Bindings {
    fn value(&self, variable: &str) -> Option<f64>;
}

impl<S: BuildHasher> Bindings for HashMap<String, f64, S> {
    fn value(&self, variable: &str) -> Option<f64> {
        self.get(variable).copied()
    }
}

impl<S: BuildHasher> Bindings for HashMap<&str, f64, S> {
    fn value(&self, variable: &str) -> Option<f64> {
        self.get(variable).copied()
    }
}

impl Bindings for [(&str, f64)] {
    fn value(&self, variable: &str) -> Option<f64> {
        self.iter()
            .find_map(|(name, value)| (*name == variable).then_some(*value))
    }
}
