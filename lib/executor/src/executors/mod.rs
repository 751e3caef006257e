pub mod common;
pub mod error;
pub mod map;
pub mod timeout;
