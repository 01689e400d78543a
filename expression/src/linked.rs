use crate::{
    ast::{AstNode, BinaryOperator, ExpressionAst, UnaryOperator, is_true},
    error::{self, ExpressionEvaluationError},
    functions::{Function, FunctionKernel},
    util::{DuplicateOrEmpty, duplicate_or_empty_str_slice},
};
use snafu::OptionExt;

type Result<T, E = ExpressionEvaluationError> = std::result::Result<T, E>;

/// An expression whose variables are resolved to slot indices.
///
/// Linking happens once per band or operator, evaluation once per pixel.
#[derive(Debug, Clone)]
pub struct LinkedExpression {
    root: LinkedNode,
    number_of_slots: usize,
}

#[derive(Debug, Clone)]
enum LinkedNode {
    Constant(f64),
    Slot(usize),
    Function {
        function: &'static Function,
        args: Vec<LinkedNode>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<LinkedNode>,
    },
    Binary {
        left: Box<LinkedNode>,
        op: BinaryOperator,
        right: Box<LinkedNode>,
    },
    Branch {
        condition: Box<LinkedNode>,
        then_branch: Box<LinkedNode>,
        else_branch: Box<LinkedNode>,
    },
}

impl LinkedExpression {
    pub(crate) fn new<S: AsRef<str>>(ast: &ExpressionAst, slot_names: &[S]) -> Result<Self> {
        match duplicate_or_empty_str_slice(slot_names) {
            DuplicateOrEmpty::Ok => (),
            DuplicateOrEmpty::Duplicate(slot) => {
                return Err(ExpressionEvaluationError::DuplicateSlotName { slot });
            }
            DuplicateOrEmpty::Empty => return Err(ExpressionEvaluationError::EmptySlotName),
        }

        let root = link_node(ast.root(), slot_names)?;

        log::debug!(
            "linked formula `{}` to {} slots",
            ast.formula(),
            slot_names.len()
        );

        Ok(Self {
            root,
            number_of_slots: slot_names.len(),
        })
    }

    pub fn number_of_slots(&self) -> usize {
        self.number_of_slots
    }

    /// Evaluates the expression for one set of slot values.
    ///
    /// Missing slots evaluate to NaN.
    #[inline]
    pub fn evaluate(&self, slots: &[f64]) -> f64 {
        self.root.evaluate(slots)
    }
}

fn link_node<S: AsRef<str>>(node: &AstNode, slot_names: &[S]) -> Result<LinkedNode> {
    Ok(match node {
        AstNode::Constant(value) => LinkedNode::Constant(*value),
        AstNode::Variable(identifier) => {
            let index = slot_names
                .iter()
                .position(|name| name.as_ref() == identifier.as_ref())
                .context(error::UnboundVariable {
                    variable: identifier.to_string(),
                })?;
            LinkedNode::Slot(index)
        }
        AstNode::Function { function, args } => LinkedNode::Function {
            function: *function,
            args: args
                .iter()
                .map(|arg| link_node(arg, slot_names))
                .collect::<Result<_>>()?,
        },
        AstNode::Unary { op, operand } => LinkedNode::Unary {
            op: *op,
            operand: Box::new(link_node(operand, slot_names)?),
        },
        AstNode::Binary { left, op, right } => LinkedNode::Binary {
            left: Box::new(link_node(left, slot_names)?),
            op: *op,
            right: Box::new(link_node(right, slot_names)?),
        },
        AstNode::Branch {
            condition,
            then_branch,
            else_branch,
        } => LinkedNode::Branch {
            condition: Box::new(link_node(condition, slot_names)?),
            then_branch: Box::new(link_node(then_branch, slot_names)?),
            else_branch: Box::new(link_node(else_branch, slot_names)?),
        },
    })
}

impl LinkedNode {
    fn evaluate(&self, slots: &[f64]) -> f64 {
        match self {
            Self::Constant(value) => *value,
            Self::Slot(index) => slots.get(*index).copied().unwrap_or(f64::NAN),
            Self::Function { function, args } => match (function.kernel(), args.as_slice()) {
                (FunctionKernel::Nullary(f), []) => f(),
                (FunctionKernel::Unary(f), [a]) => f(a.evaluate(slots)),
                (FunctionKernel::Binary(f), [a, b]) => f(a.evaluate(slots), b.evaluate(slots)),
                (FunctionKernel::Ternary(f), [a, b, c]) => {
                    f(a.evaluate(slots), b.evaluate(slots), c.evaluate(slots))
                }
                // arity is checked while parsing
                _ => f64::NAN,
            },
            Self::Unary { op, operand } => op.apply(operand.evaluate(slots)),
            Self::Binary {
                left,
                op: BinaryOperator::And,
                right,
            } => {
                if is_true(left.evaluate(slots)) {
                    BinaryOperator::And.apply(1.0, right.evaluate(slots))
                } else {
                    0.0
                }
            }
            Self::Binary {
                left,
                op: BinaryOperator::Or,
                right,
            } => {
                if is_true(left.evaluate(slots)) {
                    1.0
                } else {
                    BinaryOperator::Or.apply(0.0, right.evaluate(slots))
                }
            }
            Self::Binary { left, op, right } => op.apply(left.evaluate(slots), right.evaluate(slots)),
            Self::Branch {
                condition,
                then_branch,
                else_branch,
            } => {
                if is_true(condition.evaluate(slots)) {
                    then_branch.evaluate(slots)
                } else {
                    else_branch.evaluate(slots)
                }
            }
        }
    }
}
