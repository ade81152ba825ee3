pub mod attempt;
pub mod error;
pub mod id;
pub mod money;
