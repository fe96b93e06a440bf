mod bridge_cluster;

pub use bridge_cluster::*;
