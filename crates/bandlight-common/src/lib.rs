//! Common types and traits shared by Bandlight nodes, bridges and the
//! simulator.
//!
//! - Collaborator traits: [`Clock`], [`RadioTransport`], [`Renderer`],
//!   [`ConfigStore`]
//! - [`DeviceConfig`], the persisted per-node configuration
//! - Stock implementations: [`ManualClock`], [`SystemClock`],
//!   [`MemoryConfigStore`], [`JsonFileConfigStore`]

mod clock;
mod config;
mod error;
mod store;
mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use store::*;
pub use traits::*;
