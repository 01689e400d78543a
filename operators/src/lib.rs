pub mod engine;
pub mod error;
pub mod processing;
pub mod product;
pub mod roi;
pub mod session;
pub mod util;

pub use error::Error;
