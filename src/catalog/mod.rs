pub mod enricher;
pub mod filter;
pub mod mirror;
pub mod workflow;
