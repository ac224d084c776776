use conflux_types::{Conflict, Platform, Resolution};

use crate::strategy::{award, CapturedStates, ResolutionStrategy, StrategyKind};

/// The mirror node's value wins regardless of conflict kind.
#[derive(Clone, Copy, Debug, Default)]
pub struct MirrorAuthority;

impl ResolutionStrategy for MirrorAuthority {
    fn name(&self) -> &str {
        StrategyKind::MirrorAuthority.as_str()
    }

    fn resolve(&self, conflict: &Conflict, states: &CapturedStates) -> Resolution {
        award(conflict, states, self.name(), Platform::Mirror, "mirror is authoritative")
    }
}
