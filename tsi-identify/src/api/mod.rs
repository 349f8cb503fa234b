//! HTTP API handlers for tsi-identify

pub mod health;
pub mod identify;
pub mod root;

pub use health::health_check;
pub use identify::identify_sound;
pub use root::root;
