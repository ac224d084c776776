use conflux_types::{Conflict, Resolution};

use crate::strategy::{CapturedStates, ResolutionStrategy, StrategyKind};

/// Leaves every conflict for an operator to decide out of band.
#[derive(Clone, Copy, Debug, Default)]
pub struct Manual;

impl ResolutionStrategy for Manual {
    fn name(&self) -> &str {
        StrategyKind::Manual.as_str()
    }

    fn resolve(&self, conflict: &Conflict, _states: &CapturedStates) -> Resolution {
        Resolution::unresolved(
            conflict,
            self.name(),
            format!("{} deferred to manual resolution", conflict.path()),
        )
    }
}
