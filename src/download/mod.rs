//! Download management: providers, ingest and the delivery cache

pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod ingest;
pub mod provider;
pub mod source;
pub mod transcode;
pub mod ytdlp_errors;

// Re-exports for convenience
pub use delivery::{DeliveryCache, DeliveryConfig, DeliveryOutcome, DeliveryPath, DeliveryRequest};
pub use dispatch::{GateConfig, ProviderGate, ProviderRegistry};
pub use error::DeliveryError;
pub use ingest::{ingest, IngestOutcome};
pub use provider::{MediaProvider, MediaSnapshot, ProbeResult, ProviderError};
