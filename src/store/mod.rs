pub mod graph;
pub mod observer;

pub use graph::{Graph, GraphStats, Neighbors};
pub use observer::{ChannelObserver, GraphEvent, GraphObserver, TracingObserver};
