//! Data models for BudgetWatch

mod alert;
mod budget;
mod template;

pub use alert::*;
pub use budget::*;
pub use template::*;
