//! Secret Santa draw core.
//!
//! - `derangement`: fixed-point-free random assignment by rejection sampling
//! - `store`: the persistence boundary the draw runs against
//! - `dispatcher`: one notification per pair, failures isolated and recorded
//! - `orchestrator`: validate, generate, persist, read back, notify, summarize

pub mod derangement;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod orchestrator;
pub mod store;

pub use derangement::{Derangement, MAX_ATTEMPTS, MIN_PARTICIPANTS, derange};
pub use dispatcher::{DispatchReport, NotificationDispatcher, Notifier};
pub use error::{DeliveryError, DrawError};
pub use orchestrator::{DrawConfig, DrawOrchestrator};
pub use store::{AssignmentStore, DeliveryLedger, DrawStore, ParticipantSource};
