pub mod model;
pub mod weather;

pub use model::{Model, StateId, Symbol, ROW_SUM_TOLERANCE};
