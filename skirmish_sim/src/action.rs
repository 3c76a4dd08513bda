//! The action contract: one polymorphic unit of work per agent per step.
//!
//! The engine special-cases a closed set of action kinds (reward scoring
//! pattern-matches on them); everything else plugs in through the
//! [`SimAction`] trait object variant and stays opaque to scoring.

use crate::access_service::AccessService;
use crate::impact::Impact;
use crate::local_work::LocalWork;
use crate::phishing::PhishingEmail;
use skirmish_core::{Observation, RandomSource, SimState};

/// Executable behavior of an action.
///
/// Implementations read and mutate the shared state, draw randomness only
/// from the passed stream, and report their outcome as an observation.
/// Outcomes that are merely unfavorable are `success=false` observations,
/// never panics or errors.
pub trait SimAction: std::fmt::Debug {
    /// Runs the action to completion against the shared state.
    fn execute(&self, state: &mut SimState, rng: &mut RandomSource) -> Observation;

    /// Short kind name for logs and traces.
    fn name(&self) -> &str;
}

/// The closed action set plus the open extension point.
#[derive(Debug)]
pub enum Action {
    /// Do nothing this step.
    Sleep(Sleep),

    /// Background work against a service on the agent's own host.
    LocalWork(LocalWork),

    /// Background access of a remote server.
    AccessService(AccessService),

    /// Phishing lure; scheduled only as a sub-action of local work.
    Phishing(PhishingEmail),

    /// Attacker impact against a target host.
    Impact(Impact),

    /// Externally supplied action kind; executes polymorphically and is
    /// ignored by reward scoring.
    Custom(Box<dyn SimAction>),
}

impl Action {
    /// Executes whichever variant this is.
    pub fn execute(&self, state: &mut SimState, rng: &mut RandomSource) -> Observation {
        match self {
            Action::Sleep(action) => action.execute(state, rng),
            Action::LocalWork(action) => action.execute(state, rng),
            Action::AccessService(action) => action.execute(state, rng),
            Action::Phishing(action) => action.execute(state, rng),
            Action::Impact(action) => action.execute(state, rng),
            Action::Custom(action) => action.execute(state, rng),
        }
    }

    /// Kind name for logs and traces.
    pub fn name(&self) -> &str {
        match self {
            Action::Sleep(action) => action.name(),
            Action::LocalWork(action) => action.name(),
            Action::AccessService(action) => action.name(),
            Action::Phishing(action) => action.name(),
            Action::Impact(action) => action.name(),
            Action::Custom(action) => action.name(),
        }
    }
}

/// The no-op action: trivially successful, mutates nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sleep;

impl SimAction for Sleep {
    fn execute(&self, _state: &mut SimState, _rng: &mut RandomSource) -> Observation {
        Observation::succeeded()
    }

    fn name(&self) -> &str {
        "sleep"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_sleep_succeeds_without_mutation() {
        let mut state = fixtures::state();
        let mut rng = RandomSource::new(1);
        let before = state.hostnames().len();

        let observation = Action::Sleep(Sleep).execute(&mut state, &mut rng);

        assert!(observation.is_success());
        assert_eq!(state.hostnames().len(), before);
        assert!(state.session_invariant_violations().is_empty());
    }

    #[test]
    fn test_custom_actions_execute_through_the_trait() {
        #[derive(Debug)]
        struct Recon;
        impl SimAction for Recon {
            fn execute(&self, _state: &mut SimState, _rng: &mut RandomSource) -> Observation {
                Observation::failed()
            }
            fn name(&self) -> &str {
                "recon"
            }
        }

        let mut state = fixtures::state();
        let mut rng = RandomSource::new(1);
        let action = Action::Custom(Box::new(Recon));

        assert_eq!(action.name(), "recon");
        assert_eq!(action.execute(&mut state, &mut rng).success, Some(false));
    }
}
