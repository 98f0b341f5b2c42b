//! Provider layer for Voxgate.
//!
//! # Architecture
//!
//! - [`registry`] — static descriptors for all supported backends +
//!   keyword matching and candidate-chain construction
//! - [`adapters::ProviderClient`] — HTTP client speaking each backend's
//!   wire dialect (managed, deployment, local)
//! - [`router::Router`] — fallback-chain routing with per-provider
//!   retries and response caching

pub mod adapters;
pub mod registry;
pub mod router;

pub use adapters::ProviderClient;
pub use registry::{ProviderDescriptor, AuthKind, WireShape, PROVIDERS};
pub use router::Router;
