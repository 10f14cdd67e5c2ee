pub mod allocator;
pub mod execution;
pub mod graph;
pub mod probability;
pub mod tab;
pub mod tree;
pub mod types;

#[cfg(test)]
mod tests;

pub use allocator::*;
pub use execution::*;
pub use graph::*;
pub use probability::*;
pub use tab::*;
pub use tree::*;
pub use types::*;
