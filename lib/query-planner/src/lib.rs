pub mod ast;
pub mod ownership;
pub mod planner;
pub mod utils;

#[cfg(test)]
mod tests;
