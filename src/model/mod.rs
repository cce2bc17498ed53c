pub mod edge;
pub mod node;
pub mod raw;
pub mod strategy;

pub use edge::*;
pub use node::*;
pub use raw::*;
pub use strategy::*;
