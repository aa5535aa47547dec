//! Portal core: which regions host a portal, how the structure is built and
//! detected, when region loads trigger placement, and how actors transit.

pub mod classifier;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod logging;
pub mod models;
pub mod placer;
pub mod prober;
pub mod transit;

pub use classifier::{is_portal_block, is_portal_region, portal_regions, PortalAxisSet};
pub use config::{Config, Overrides, TransitStrategy};
pub use coordinator::{LoadOutcome, RegionLoadCoordinator};
pub use placer::{create_exit_gateway, place_portal, PlaceOutcome};
pub use prober::portal_exists;
pub use transit::{cap_velocity, ActorTransitTracker, TickReport, Transit};
