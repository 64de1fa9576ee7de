pub mod options;
pub mod plan;

pub use options::*;
pub use plan::*;
