pub mod entity;
pub mod error;
pub mod extractor;
pub mod port;
pub mod token;

pub use entity::*;
pub use error::{DomainError, FailureKind};
pub use extractor::extract;
pub use port::*;
pub use token::unique_token;
