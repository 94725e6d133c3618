//! Repository implementations for database operations

pub mod deposits;
pub mod trades;
pub mod users;

pub use deposits::*;
pub use trades::*;
pub use users::*;
