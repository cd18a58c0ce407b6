//! coffre-recovery: onboarding and device recovery
//!
//! Onboarding draws 16 bytes of entropy, turns them into a 12-word phrase
//! for the user to write down, and installs a master key. Recovery
//! validates a transcribed phrase and, when the key is phrase-derived,
//! reinstalls the same key.

pub mod link;
pub mod service;

pub use link::DeviceLink;
pub use service::{OnboardingBundle, RecoveryService, RestoreOutcome};
