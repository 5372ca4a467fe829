pub mod config;
pub mod driver;
pub mod k8047;
pub mod sampler;
pub mod session;
