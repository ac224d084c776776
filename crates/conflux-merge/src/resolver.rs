use tracing::{debug, warn};

use conflux_types::{Conflict, Resolution};

use crate::config::MergeRules;
use crate::error::{MergeError, MergeResult};
use crate::strategy::{CapturedStates, ResolutionStrategy, StrategyTable};

/// Applies one named strategy to conflicts.
///
/// Strategy lookup is the only fallible step. Once a strategy is found,
/// every conflict gets exactly one resolution, successful or not.
#[derive(Clone, Debug)]
pub struct ConflictResolver {
    table: StrategyTable,
}

impl ConflictResolver {
    pub fn new(table: StrategyTable) -> Self {
        Self { table }
    }

    /// A resolver over the four built-in strategies.
    pub fn with_builtin_strategies(rules: &MergeRules) -> Self {
        Self::new(StrategyTable::builtin(rules))
    }

    pub fn table(&self) -> &StrategyTable {
        &self.table
    }

    /// Register an additional strategy.
    pub fn register<S: ResolutionStrategy + 'static>(&mut self, strategy: S) {
        self.table.register(strategy);
    }

    /// Resolve a single conflict with the named strategy.
    pub fn resolve(&self, conflict: &Conflict, states: &CapturedStates, strategy: &str) -> MergeResult<Resolution> {
        let strategy = self
            .table
            .get(strategy)
            .ok_or_else(|| MergeError::UnknownStrategy(strategy.to_string()))?;
        Ok(strategy.resolve(conflict, states))
    }

    /// Resolve every conflict with the named strategy, in conflict order.
    pub fn resolve_all(
        &self,
        conflicts: &[Conflict],
        states: &CapturedStates,
        strategy: &str,
    ) -> MergeResult<Vec<Resolution>> {
        let strategy = self
            .table
            .get(strategy)
            .ok_or_else(|| MergeError::UnknownStrategy(strategy.to_string()))?;

        let resolutions: Vec<Resolution> = conflicts
            .iter()
            .map(|conflict| {
                let resolution = strategy.resolve(conflict, states);
                if resolution.success {
                    debug!(
                        conflict = %conflict.id,
                        path = %resolution.path,
                        winner = ?resolution.winner,
                        "conflict resolved"
                    );
                } else {
                    warn!(
                        conflict = %conflict.id,
                        path = %resolution.path,
                        reason = %resolution.explanation,
                        "conflict left for manual resolution"
                    );
                }
                resolution
            })
            .collect();

        debug!(
            strategy = strategy.name(),
            resolved = resolutions.iter().filter(|r| r.success).count(),
            total = resolutions.len(),
            "resolution complete"
        );
        Ok(resolutions)
    }
}
