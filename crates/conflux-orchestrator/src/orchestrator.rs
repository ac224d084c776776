use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Mutex;

use futures::FutureExt;
use tracing::{error, info, warn};

use conflux_merge::{ConflictDetector, ConflictResolver, ResolutionStrategy, StateUnifier};
use conflux_node::NodeGroup;
use conflux_sync::{RecoveryManager, StateCapturer, SyncCoordinator};
use conflux_types::{NodeStatus, Phase, SessionId, UnifiedSnapshot};

use crate::config::OrchestratorConfig;
use crate::error::{SessionError, SessionResult, StageError};
use crate::metrics::MergeMetrics;
use crate::repository::SessionRepository;
use crate::session::MergeSession;

/// Drives one merge session at a time per call, end to end.
///
/// ```text
/// checkpoint -> capture -> detect + resolve -> unify -> resume
/// ```
///
/// Node-level failures are absorbed into the session record. Anything
/// that aborts a phase, the session timeout, or a panic in detection,
/// resolution or unification moves the session to `failed`, runs
/// emergency recovery on every node, and only then returns the error.
pub struct MergeOrchestrator {
    config: OrchestratorConfig,
    coordinator: SyncCoordinator,
    capturer: StateCapturer,
    recovery: RecoveryManager,
    detector: ConflictDetector,
    resolver: ConflictResolver,
    unifier: StateUnifier,
    repository: Mutex<SessionRepository>,
}

impl MergeOrchestrator {
    /// Build an orchestrator with the built-in strategies.
    pub fn new(config: OrchestratorConfig) -> SessionResult<Self> {
        let resolver = ConflictResolver::with_builtin_strategies(&config.rules);
        Self::with_resolver(config, resolver)
    }

    /// Build an orchestrator over a custom resolver. Fails if the
    /// configured strategy is not registered with it.
    pub fn with_resolver(config: OrchestratorConfig, resolver: ConflictResolver) -> SessionResult<Self> {
        if !resolver.table().contains(&config.strategy) {
            return Err(SessionError::Config(format!(
                "unknown resolution strategy '{}' (registered: {})",
                config.strategy,
                resolver.table().names().join(", ")
            )));
        }

        Ok(Self {
            coordinator: SyncCoordinator::new(config.sync.clone()),
            capturer: StateCapturer::new(config.sync.clone()),
            recovery: RecoveryManager::new(config.sync.clone()),
            detector: ConflictDetector::with_default_rules(&config.rules),
            unifier: StateUnifier::new(config.rules.clone()),
            repository: Mutex::new(SessionRepository::new(config.history_capacity)),
            resolver,
            config,
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Register an additional strategy with the resolver.
    pub fn register_strategy<S: ResolutionStrategy + 'static>(&mut self, strategy: S) {
        self.resolver.register(strategy);
    }

    /// Run a full merge over `group`.
    pub async fn merge_active_platforms(&self, group: &NodeGroup) -> SessionResult<UnifiedSnapshot> {
        let session = MergeSession::new(group, self.config.strategy.clone());
        self.run(session, group).await
    }

    /// Run a fresh merge recorded as a retry of `previous`.
    pub async fn retry(&self, previous: &MergeSession, group: &NodeGroup) -> SessionResult<UnifiedSnapshot> {
        let session = MergeSession::new(group, self.config.strategy.clone()).retrying(previous);
        info!(
            session = %session.id,
            retry_of = %previous.id,
            retry_count = session.retry_count,
            "retrying merge"
        );
        self.run(session, group).await
    }

    /// A session by id, running or retained in history.
    pub fn session(&self, id: &SessionId) -> Option<MergeSession> {
        self.repository().get(id).cloned()
    }

    /// Retained finished sessions, oldest first.
    pub fn history(&self) -> Vec<MergeSession> {
        self.repository().history().cloned().collect()
    }

    pub fn active_sessions(&self) -> Vec<MergeSession> {
        self.repository().active().into_iter().cloned().collect()
    }

    pub fn active_metrics(&self) -> MergeMetrics {
        MergeMetrics::collect(&self.repository())
    }

    fn repository(&self) -> std::sync::MutexGuard<'_, SessionRepository> {
        self.repository.lock().expect("session repository mutex poisoned")
    }

    async fn run(&self, mut session: MergeSession, group: &NodeGroup) -> SessionResult<UnifiedSnapshot> {
        info!(
            session = %session.id,
            group = %session.group,
            strategy = %session.strategy,
            nodes = group.len(),
            "merge session started"
        );
        self.repository().upsert(&session);

        let timeout = self.config.session_timeout();
        let pipeline = AssertUnwindSafe(self.pipeline(&mut session, group)).catch_unwind();
        let outcome = tokio::time::timeout(timeout, pipeline).await;

        match outcome {
            Ok(Ok(Ok(snapshot))) => {
                info!(
                    session = %session.id,
                    conflicts = session.conflicts.len(),
                    unresolved = session.unresolved_count(),
                    digest = %snapshot.digest(),
                    "merge session completed"
                );
                self.repository().finish(session);
                Ok(snapshot)
            }
            Ok(Ok(Err(e))) => {
                let phase = session.phase;
                let reason = e.to_string();
                error!(session = %session.id, %phase, error = %reason, "merge session failed");
                self.recover(&mut session, group, reason.clone()).await;
                Err(SessionError::Failed {
                    phase,
                    reason,
                    session: Box::new(session),
                })
            }
            Ok(Err(payload)) => {
                let phase = session.phase;
                let reason = format!("panicked: {}", panic_message(payload.as_ref()));
                error!(session = %session.id, %phase, error = %reason, "merge session panicked");
                self.recover(&mut session, group, reason.clone()).await;
                Err(SessionError::Failed {
                    phase,
                    reason,
                    session: Box::new(session),
                })
            }
            Err(_) => {
                let phase = session.phase;
                let timeout_ms = self.config.session_timeout_ms;
                error!(session = %session.id, %phase, timeout_ms, "merge session timed out");
                self.recover(&mut session, group, format!("session timed out after {timeout_ms} ms"))
                    .await;
                Err(SessionError::Timeout {
                    phase,
                    timeout_ms,
                    session: Box::new(session),
                })
            }
        }
    }

    async fn pipeline(&self, session: &mut MergeSession, group: &NodeGroup) -> Result<UnifiedSnapshot, StageError> {
        self.enter(session, Phase::SyncCheckpoint)?;
        let checkpoint = self.coordinator.checkpoint(session.id, group).await?;
        session.sync_instant = Some(checkpoint.sync_instant);
        for platform in &checkpoint.acknowledged {
            session.set_status(*platform, NodeStatus::Synchronized);
        }
        for failure in checkpoint.failures {
            session.set_status(failure.platform, NodeStatus::SyncFailed);
            session.node_failures.push(failure);
        }

        self.enter(session, Phase::Capturing)?;
        let capture = self.capturer.capture_all(session.id, group).await;
        for platform in capture.states.keys() {
            session.set_status(*platform, NodeStatus::Captured);
        }
        for failure in &capture.failed {
            session.set_status(failure.platform, NodeStatus::CaptureFailed);
            session.node_failures.push(failure.clone());
        }
        let states = capture.require_any()?.states;

        self.enter(session, Phase::Resolving)?;
        let conflicts = self.detector.detect(&states);
        let resolutions = self
            .resolver
            .resolve_all(&conflicts, &states, &session.strategy)?;
        session.conflicts = conflicts;
        session.resolutions = resolutions;

        self.enter(session, Phase::Unifying)?;
        let snapshot = self
            .unifier
            .unify(&states, &session.conflicts, &session.resolutions)?;
        session.digest = Some(snapshot.digest().to_string());

        self.enter(session, Phase::Resuming)?;
        let resume = self.recovery.resume_all(session.id, group).await;
        if !resume.all_resumed() {
            warn!(
                session = %session.id,
                failed = resume.failed.len(),
                "some nodes did not resume after merge"
            );
        }
        session.resume = Some(resume);

        self.enter(session, Phase::Completed)?;
        Ok(snapshot)
    }

    fn enter(&self, session: &mut MergeSession, phase: Phase) -> Result<(), StageError> {
        session.transition(phase)?;
        info!(session = %session.id, %phase, "phase entered");
        self.repository().upsert(session);
        Ok(())
    }

    async fn recover(&self, session: &mut MergeSession, group: &NodeGroup, reason: String) {
        session.fail(reason);
        if let Err(e) = session.transition(Phase::EmergencyRecovery) {
            warn!(session = %session.id, error = %e, "cannot enter emergency recovery");
        }
        let report = self.recovery.emergency_resume(group).await;
        session.recovery = Some(report);
        self.repository().finish(session.clone());
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use conflux_merge::CapturedStates;
    use conflux_node::{FaultPlan, InMemoryNode};
    use conflux_types::{Conflict, Platform, Resolution};
    use serde_json::{json, Value};

    fn config(strategy: &str) -> OrchestratorConfig {
        let mut c = OrchestratorConfig {
            strategy: strategy.to_string(),
            ..Default::default()
        };
        c.sync.sync_window_ms = 50;
        c
    }

    fn node(platform: Platform, state: Value) -> Arc<InMemoryNode> {
        Arc::new(InMemoryNode::with_state(platform, state))
    }

    fn scenario() -> Vec<Arc<InMemoryNode>> {
        vec![
            node(Platform::Runtime, json!({"agents": {"A1": {"trust": 80}}, "timeline": [{"id": "e1"}]})),
            node(Platform::Surface, json!({"agents": {"A1": {"trust": 60}}, "mood": 0.5})),
            node(Platform::Mirror, json!({"timeline": [{"id": "e1"}], "mood": 0.5, "validations": {"kyc": false}})),
            node(Platform::Protocol, json!({"validations": {"kyc": true}})),
        ]
    }

    fn group(nodes: &[Arc<InMemoryNode>]) -> NodeGroup {
        let mut g = NodeGroup::new("test");
        for n in nodes {
            g.add(n.clone()).unwrap();
        }
        g
    }

    #[tokio::test(start_paused = true)]
    async fn full_merge_completes_and_resumes_everyone() {
        let nodes = scenario();
        let orch = MergeOrchestrator::new(config("authority-priority")).unwrap();
        let snap = orch.merge_active_platforms(&group(&nodes)).await.unwrap();

        assert_eq!(snap.document()["agents"]["A1"]["trust"], json!(80));
        assert_eq!(snap.document()["validations"]["kyc"], json!(true));
        assert_eq!(
            snap.provenance_of("agents.A1").unwrap().to_string(),
            "runtime (resolved over surface)"
        );
        assert!(nodes.iter().all(|n| !n.is_paused()));

        let history = orch.history();
        assert_eq!(history.len(), 1);
        let session = &history[0];
        assert_eq!(
            session.phases(),
            vec![
                Phase::Initializing,
                Phase::SyncCheckpoint,
                Phase::Capturing,
                Phase::Resolving,
                Phase::Unifying,
                Phase::Resuming,
                Phase::Completed,
            ]
        );
        assert_eq!(session.conflicts.len(), 2);
        assert_eq!(session.digest.as_deref(), Some(snap.digest()));
        assert!(session.node_status.values().all(|s| *s == NodeStatus::Captured));
        assert!(orch.session(&session.id).is_some());
        assert!(orch.active_sessions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn capture_failure_is_absorbed() {
        let mut nodes = scenario();
        nodes[2] = Arc::new(
            InMemoryNode::with_state(Platform::Mirror, json!({"timeline": [{"id": "e9"}]})).with_faults(FaultPlan {
                fail_export: true,
                ..Default::default()
            }),
        );
        let orch = MergeOrchestrator::new(config("authority-priority")).unwrap();
        let snap = orch.merge_active_platforms(&group(&nodes)).await.unwrap();

        let timeline = snap.provenance_of("timeline").unwrap();
        assert_eq!(timeline.source, Some(Platform::Runtime));
        assert_eq!(timeline.contributors, vec![Platform::Runtime]);

        let session = &orch.history()[0];
        assert!(session.succeeded());
        assert_eq!(session.status_of(Platform::Mirror), Some(NodeStatus::CaptureFailed));
        assert_eq!(session.node_failures.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn late_ack_marks_node_unsynchronized_but_merge_completes() {
        let mut nodes = scenario();
        nodes[1] = Arc::new(
            InMemoryNode::with_state(Platform::Surface, json!({"mood": 0.5})).with_faults(FaultPlan {
                ack_delay: Some(Duration::from_millis(500)),
                ..Default::default()
            }),
        );
        let orch = MergeOrchestrator::new(config("manual")).unwrap();
        orch.merge_active_platforms(&group(&nodes)).await.unwrap();

        let session = &orch.history()[0];
        assert!(session.succeeded());
        assert_eq!(session.status_of(Platform::Surface), Some(NodeStatus::Captured));
        assert!(session
            .node_failures
            .iter()
            .any(|f| f.platform == Platform::Surface && f.reason == "no acknowledgement before sync instant"));
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_captured_fails_and_recovers_every_node() {
        let faulty = FaultPlan {
            fail_export: true,
            ..Default::default()
        };
        let nodes: Vec<_> = Platform::ALL
            .into_iter()
            .map(|p| Arc::new(InMemoryNode::new(p).with_faults(faulty.clone())))
            .collect();
        let orch = MergeOrchestrator::new(config("manual")).unwrap();
        let err = orch.merge_active_platforms(&group(&nodes)).await.unwrap_err();

        assert_eq!(err.phase(), Some(Phase::Capturing));
        let session = err.session().unwrap();
        assert_eq!(session.phase, Phase::EmergencyRecovery);
        assert_eq!(session.failure.as_ref().unwrap().phase, Phase::Capturing);
        assert_eq!(session.recovery.as_ref().unwrap().resumed.len(), 4);
        assert!(nodes.iter().all(|n| n.emergency_resumes() == 1 && !n.is_paused()));

        let metrics = orch.active_metrics();
        assert_eq!(metrics.failed, 1);
        assert_eq!(metrics.active, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn session_timeout_triggers_recovery() {
        let nodes = vec![Arc::new(
            InMemoryNode::with_state(Platform::Runtime, json!({"agents": {}})).with_faults(FaultPlan {
                export_delay: Some(Duration::from_secs(10)),
                ..Default::default()
            }),
        )];
        let mut cfg = config("manual");
        cfg.session_timeout_ms = 1_000;
        let orch = MergeOrchestrator::new(cfg).unwrap();
        let err = orch.merge_active_platforms(&group(&nodes)).await.unwrap_err();

        assert!(matches!(err, SessionError::Timeout { phase: Phase::Capturing, .. }));
        assert_eq!(nodes[0].emergency_resumes(), 1);
        assert!(!nodes[0].is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn emergency_resume_errors_are_swallowed() {
        let nodes: Vec<_> = Platform::ALL
            .into_iter()
            .map(|p| {
                Arc::new(InMemoryNode::new(p).with_faults(FaultPlan {
                    fail_export: true,
                    fail_emergency_resume: p == Platform::Mirror,
                    ..Default::default()
                }))
            })
            .collect();
        let orch = MergeOrchestrator::new(config("manual")).unwrap();
        let err = orch.merge_active_platforms(&group(&nodes)).await.unwrap_err();

        let recovery = err.session().unwrap().recovery.clone().unwrap();
        assert_eq!(recovery.resumed.len(), 3);
        assert_eq!(recovery.failed[0].platform, Platform::Mirror);
        assert!(nodes.iter().all(|n| n.emergency_resumes() == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_resume_does_not_fail_completed_merge() {
        let mut nodes = scenario();
        nodes[3] = Arc::new(
            InMemoryNode::with_state(Platform::Protocol, json!({"validations": {"kyc": true}})).with_faults(
                FaultPlan {
                    fail_resume: true,
                    ..Default::default()
                },
            ),
        );
        let orch = MergeOrchestrator::new(config("authority-priority")).unwrap();
        orch.merge_active_platforms(&group(&nodes)).await.unwrap();

        let session = &orch.history()[0];
        assert!(session.succeeded());
        let resume = session.resume.as_ref().unwrap();
        assert_eq!(resume.failed.len(), 1);
        assert_eq!(resume.failed[0].platform, Platform::Protocol);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_strategy_keeps_baselines() {
        let nodes = scenario();
        let orch = MergeOrchestrator::new(config("manual")).unwrap();
        let snap = orch.merge_active_platforms(&group(&nodes)).await.unwrap();
        assert_eq!(snap.document()["agents"]["A1"]["trust"], json!(80));
        assert_eq!(snap.unresolved().len(), 2);
        assert_eq!(orch.history()[0].unresolved_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_links_sessions() {
        let nodes = scenario();
        let orch = MergeOrchestrator::new(config("authority-priority")).unwrap();
        let g = group(&nodes);
        orch.merge_active_platforms(&g).await.unwrap();
        let first = orch.history()[0].clone();

        orch.retry(&first, &g).await.unwrap();
        let second = &orch.history()[1];
        assert_eq!(second.retry_of, Some(first.id));
        assert_eq!(second.retry_count, 1);

        let metrics = orch.active_metrics();
        assert_eq!(metrics.total, 2);
        assert!((metrics.success_rate - 1.0).abs() < f64::EPSILON);
        assert_eq!(metrics.conflicts_by_kind.values().sum::<u64>(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_merges_are_deterministic() {
        let nodes = scenario();
        let orch = MergeOrchestrator::new(config("mirror-authority")).unwrap();
        let g = group(&nodes);
        let a = orch.merge_active_platforms(&g).await.unwrap();
        let b = orch.merge_active_platforms(&g).await.unwrap();
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.document()["validations"]["kyc"], json!(false));
    }

    #[test]
    fn unknown_strategy_rejected_at_construction() {
        assert!(matches!(
            MergeOrchestrator::new(config("coin-flip")),
            Err(SessionError::Config(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_strategy_can_be_registered() {
        struct SurfaceWins;
        impl ResolutionStrategy for SurfaceWins {
            fn name(&self) -> &str {
                "surface-wins"
            }
            fn resolve(&self, conflict: &Conflict, _states: &CapturedStates) -> Resolution {
                match conflict.fragment_for(Platform::Surface) {
                    Some(f) => Resolution::resolved(conflict, self.name(), Platform::Surface, f.value.clone(), "surface"),
                    None => Resolution::unresolved(conflict, self.name(), "surface not involved"),
                }
            }
        }

        let rules = OrchestratorConfig::default().rules;
        let mut resolver = ConflictResolver::with_builtin_strategies(&rules);
        resolver.register(SurfaceWins);
        let orch = MergeOrchestrator::with_resolver(config("surface-wins"), resolver).unwrap();
        let snap = orch.merge_active_platforms(&group(&scenario())).await.unwrap();
        assert_eq!(snap.document()["agents"]["A1"]["trust"], json!(60));
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_strategy_still_recovers_every_node() {
        struct Explodes;
        impl ResolutionStrategy for Explodes {
            fn name(&self) -> &str {
                "explodes"
            }
            fn resolve(&self, _conflict: &Conflict, _states: &CapturedStates) -> Resolution {
                panic!("strategy bug");
            }
        }

        let nodes = scenario();
        let rules = OrchestratorConfig::default().rules;
        let mut resolver = ConflictResolver::with_builtin_strategies(&rules);
        resolver.register(Explodes);
        let orch = MergeOrchestrator::with_resolver(config("explodes"), resolver).unwrap();
        let err = orch.merge_active_platforms(&group(&nodes)).await.unwrap_err();

        match &err {
            SessionError::Failed { phase, reason, .. } => {
                assert_eq!(*phase, Phase::Resolving);
                assert_eq!(reason, "panicked: strategy bug");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(nodes.iter().all(|n| n.emergency_resumes() == 1 && !n.is_paused()));
        assert_eq!(err.session().unwrap().phase, Phase::EmergencyRecovery);
        assert!(orch.active_sessions().is_empty());
        assert_eq!(orch.active_metrics().failed, 1);
    }

    #[test]
    fn panic_payloads_render() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "unknown panic");
    }
}
