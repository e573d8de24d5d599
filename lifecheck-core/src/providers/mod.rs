//! Verification adapters for the two external registries.

pub mod civil_registry;
pub mod error;
pub mod population;
pub mod traits;

pub use civil_registry::{CivilRegistryEndpoints, HttpCivilRegistry};
pub use error::ProviderError;
pub use population::HttpPopulationRegistry;
pub use traits::{CivilRecord, CivilRegistry, PopulationRegistry};
