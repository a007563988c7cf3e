//! Mind Common - learner state machine shared by mindd and mindctl.
//!
//! Energy, coins, per-course progress and badges for the MIND DEVS learning
//! platform. All learner mutations go through [`db::mutate_learner`].

pub mod accounts;
pub mod catalog;
pub mod clock;
pub mod db;
pub mod energy;
pub mod error;
pub mod lessons;
pub mod notify;
pub mod progress;
pub mod service;
pub mod store;
pub mod types;

pub use error::{MindError, MindResult};
pub use service::{ProgressService, ServiceSettings};
pub use types::*;
