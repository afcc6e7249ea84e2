pub mod distribution;
pub mod errors;
pub mod objective;

pub use distribution::*;
pub use errors::*;
pub use objective::*;
