pub mod error;
pub mod memory;
pub mod operator;
pub mod patch;
pub mod rest;

pub use error::OperatorError;
pub use memory::InMemoryOperator;
pub use operator::HostOperator;
pub use patch::{PatchOp, PatchTarget};
pub use rest::RestOperator;
