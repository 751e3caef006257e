pub mod error;
pub mod listener;
pub mod plan;
pub mod representations;
pub mod state;
