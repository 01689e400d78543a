use crate::ast::{from_bool, is_true};
use std::{collections::HashMap, sync::OnceLock};

/// A function that can be called in a formula.
///
/// The set of functions is closed; formulas cannot define their own.
#[derive(Debug)]
pub struct Function {
    /// User-facing name of the function
    name: &'static str,

    kernel: FunctionKernel,
}

/// The implementation of a [`Function`] by number of arguments
#[derive(Debug, Clone, Copy)]
pub enum FunctionKernel {
    Nullary(fn() -> f64),
    Unary(fn(f64) -> f64),
    Binary(fn(f64, f64) -> f64),
    Ternary(fn(f64, f64, f64) -> f64),
}

impl Function {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn arity(&self) -> usize {
        match self.kernel {
            FunctionKernel::Nullary(_) => 0,
            FunctionKernel::Unary(_) => 1,
            FunctionKernel::Binary(_) => 2,
            FunctionKernel::Ternary(_) => 3,
        }
    }

    pub fn kernel(&self) -> FunctionKernel {
        self.kernel
    }
}

pub static FUNCTIONS: OnceLock<HashMap<&'static str, Function>> = OnceLock::new();

/// Constants that are replaced while parsing
pub const CONSTANTS: [(&str, f64); 3] = [
    ("PI", std::f64::consts::PI),
    ("E", std::f64::consts::E),
    ("NaN", f64::NAN),
];

/// Tolerance of `feq`
const FEQ_EPSILON: f64 = 1e-6;

/// Add a function that returns a constant.
macro_rules! add_const_num {
    ( $name:literal, $functions:expr, $fn:expr ) => {{
        $functions.insert(
            $name,
            Function {
                name: $name,
                kernel: FunctionKernel::Nullary($fn),
            },
        );
    }};
}

/// Add a function with 1 number argument.
macro_rules! add_1_num {
    ( $name:literal, $functions:expr, $fn:expr ) => {{
        $functions.insert(
            $name,
            Function {
                name: $name,
                kernel: FunctionKernel::Unary($fn),
            },
        );
    }};
}

/// Add a function with 2 number arguments.
macro_rules! add_2_num {
    ( $name:literal, $functions:expr, $fn:expr ) => {{
        $functions.insert(
            $name,
            Function {
                name: $name,
                kernel: FunctionKernel::Binary($fn),
            },
        );
    }};
}

/// Add a function with 3 number arguments.
macro_rules! add_3_num {
    ( $name:literal, $functions:expr, $fn:expr ) => {{
        $functions.insert(
            $name,
            Function {
                name: $name,
                kernel: FunctionKernel::Ternary($fn),
            },
        );
    }};
}

pub fn init_functions() -> HashMap<&'static str, Function> {
    let mut functions = HashMap::new();

    add_const_num!("pi", functions, || std::f64::consts::PI);
    add_const_num!("e", functions, || std::f64::consts::E);

    add_1_num!("sin", functions, f64::sin);
    add_1_num!("cos", functions, f64::cos);
    add_1_num!("tan", functions, f64::tan);
    add_1_num!("asin", functions, f64::asin);
    add_1_num!("acos", functions, f64::acos);
    add_1_num!("atan", functions, f64::atan);
    add_1_num!("sqrt", functions, f64::sqrt);
    add_1_num!("sqr", functions, |a| a * a);
    add_1_num!("abs", functions, f64::abs);
    add_1_num!("exp", functions, f64::exp);
    add_1_num!("exp10", functions, |a| 10_f64.powf(a));
    add_1_num!("ln", functions, f64::ln);
    add_1_num!("log", functions, f64::ln);
    add_1_num!("log10", functions, f64::log10);
    add_1_num!("floor", functions, f64::floor);
    add_1_num!("ceil", functions, f64::ceil);
    add_1_num!("round", functions, f64::round);
    add_1_num!("sign", functions, sign);
    add_1_num!("deg", functions, f64::to_degrees);
    add_1_num!("rad", functions, f64::to_radians);
    add_1_num!("nan", functions, |a| from_bool(a.is_nan()));
    add_1_num!("inf", functions, |a| from_bool(a.is_infinite()));

    add_2_num!("atan2", functions, f64::atan2);
    add_2_num!("pow", functions, f64::powf);
    add_2_num!("min", functions, f64::min);
    add_2_num!("max", functions, f64::max);
    add_2_num!("feq", functions, |a, b| from_bool((a - b).abs() < FEQ_EPSILON));

    add_3_num!("select", functions, |condition, a, b| if is_true(condition) {
        a
    } else {
        b
    });

    functions
}

/// Like [`f64::signum`], but zero maps to zero
fn sign(a: f64) -> f64 {
    if a > 0.0 {
        1.0
    } else if a < 0.0 {
        -1.0
    } else {
        a
    }
}
