//! Core module - Profile store, rotation queue, and the activation sequence

pub mod error;
mod heartbeat;
mod monitor;
mod process;
pub mod profile;
pub mod queue;
mod rotator;
pub mod settings;

pub use error::RotatorError;
pub use heartbeat::{Heartbeat, HttpHeartbeat};
pub use process::{HostController, SystemHost};
pub use profile::{Discovery, Profile, ProfileStore};
pub use queue::{ActiveMarker, ProfileQueue, QueueFile};
pub use rotator::{Phase, Rotator, StatusReport};
pub use settings::Settings;
