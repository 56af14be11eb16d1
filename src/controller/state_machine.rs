//! Lifecycle state machine.
//!
//! [`ClusterState::next_step`] is the pure decision half of a transition: it
//! names the single step to take from the current state towards the desired
//! state. Executing the step is the controller's job.

use crate::store::{ClusterState, DesiredState};

/// The single step to take from a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The desired state is reached.
    Noop,
    /// Move to another state without side effects.
    Advance(ClusterState),
    /// Build the install plan.
    Plan,
    /// Provision infrastructure.
    Provision,
    /// Run the install pipeline.
    Install,
    /// Destroy infrastructure.
    Destroy,
    /// No transition is defined; wait for manual intervention.
    Stall,
}

impl ClusterState {
    /// Returns the step to take from this state towards `desired`.
    #[must_use]
    pub const fn next_step(&self, desired: DesiredState) -> Step {
        let destroy = matches!(desired, DesiredState::Destroyed);

        match (self, desired) {
            (Self::Installed, DesiredState::Installed) | (Self::Destroyed, DesiredState::Destroyed) => {
                Step::Noop
            }
            (Self::Initial, _) => Step::Advance(Self::Planning),
            (Self::Planning, _) => Step::Plan,
            (Self::Planned, _) => Step::Advance(Self::Provisioning),
            (Self::PlanningFailed, _) => {
                if destroy {
                    Step::Advance(Self::Destroying)
                } else {
                    Step::Advance(Self::Planning)
                }
            }
            (Self::Provisioning, _) => Step::Provision,
            (Self::Provisioned, _) => {
                if destroy {
                    Step::Advance(Self::Destroying)
                } else {
                    Step::Advance(Self::Installing)
                }
            }
            (Self::ProvisionFailed, _) => {
                if destroy {
                    Step::Advance(Self::Destroying)
                } else {
                    Step::Advance(Self::Provisioning)
                }
            }
            (Self::Installing, _) => Step::Install,
            (Self::InstallFailed, _) => {
                if destroy {
                    Step::Advance(Self::Destroying)
                } else {
                    Step::Advance(Self::Installing)
                }
            }
            (Self::Installed, DesiredState::Destroyed)
            | (Self::DestroyFailed, DesiredState::Destroyed) => Step::Advance(Self::Destroying),
            (Self::Destroying, _) => Step::Destroy,
            // A destroyed cluster cannot come back, and a failed destroy is
            // never resumed towards installation.
            (Self::Destroyed | Self::DestroyFailed, DesiredState::Installed)
            | (Self::Modifying | Self::ModifyFailed | Self::Unknown(_), _) => Step::Stall,
        }
    }
}
