//! Cluster lifecycle controllers.
//!
//! Each cluster record is driven by its own [`ClusterController`]: a
//! sequential loop that wakes on notification, takes one step of the
//! [`state machine`](state_machine) and persists the resulting status. The
//! [`ControllerManager`] starts and stops controllers as records come and go.

mod manager;
mod reconciler;
pub mod state_machine;
mod transition;

pub use manager::{ControllerManager, SyncReport};
pub use reconciler::{ClusterController, ControllerExit};
pub use state_machine::Step;
