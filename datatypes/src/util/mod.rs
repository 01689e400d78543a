mod identifiers;
mod result;

pub use self::identifiers::Identifier;
pub use result::Result;
