//! Cancel-on-retrigger runner for a shared agent.

use crate::agent::Agent;
use parley_core::{ActionContext, ActionResult, ParleyResult};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::{AbortHandle, JoinHandle};

pub type RunHandle = JoinHandle<ParleyResult<(ActionResult, ActionContext)>>;

/// Runs an agent's deliberations so that a new trigger cancels the one in
/// flight instead of interleaving with it on the same workspace.
///
/// A cancelled run leaves a partial history behind; the next run resets it.
pub struct Deliberator {
    agent: Arc<tokio::sync::Mutex<Agent>>,
    in_flight: Mutex<Option<AbortHandle>>,
}

impl Deliberator {
    pub fn new(agent: Agent) -> Self {
        Self::from_shared(Arc::new(tokio::sync::Mutex::new(agent)))
    }

    pub fn from_shared(agent: Arc<tokio::sync::Mutex<Agent>>) -> Self {
        Self {
            agent,
            in_flight: Mutex::new(None),
        }
    }

    pub fn agent(&self) -> Arc<tokio::sync::Mutex<Agent>> {
        Arc::clone(&self.agent)
    }

    /// Abort the in-flight run, if any, and start a new one with `ctx`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn trigger(&self, ctx: ActionContext) -> RunHandle {
        let agent = Arc::clone(&self.agent);
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.take() {
            if !previous.is_finished() {
                tracing::info!("Cancelling in-flight deliberation");
            }
            previous.abort();
        }

        let handle = tokio::spawn(async move {
            let mut agent = agent.lock().await;
            agent.run(ctx).await
        });
        *slot = Some(handle.abort_handle());
        handle
    }

    /// Abort the in-flight run without starting another.
    pub fn cancel(&self) {
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.take() {
            previous.abort();
        }
    }
}

impl std::fmt::Debug for Deliberator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let running = self
            .in_flight
            .lock()
            .map(|slot| slot.as_ref().map(|h| !h.is_finished()).unwrap_or(false))
            .unwrap_or(false);
        f.debug_struct("Deliberator").field("running", &running).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Finish;
    use crate::narrower::GraphNarrower;
    use crate::selector::RandomSelector;
    use crate::test_support::{profile, returning, slow};
    use parley_core::ActionSpace;
    use serde_json::json;
    use std::time::Duration;

    fn agent() -> Agent {
        let space: ActionSpace = vec![
            slow("think", Duration::from_millis(200)),
            returning("answer", json!({"answer": 42})),
            Finish::action(),
        ]
        .into_iter()
        .collect();
        let narrower = GraphNarrower::new(["think"])
            .with_edge("think", ["answer"])
            .with_edge("answer", ["finish"]);
        Agent::new(profile("alice"), space, narrower, RandomSelector::seeded(1), Finish::KEY)
    }

    #[tokio::test]
    async fn test_trigger_runs_to_completion() {
        let deliberator = Deliberator::new(agent());
        let ctx = ActionContext::new(profile("alice"));
        let (result, _) = deliberator.trigger(ctx).await.unwrap().unwrap();
        assert_eq!(result.get("answer"), Some(&json!(42)));
    }

    #[tokio::test]
    async fn test_retrigger_cancels_in_flight_run() {
        let deliberator = Deliberator::new(agent());
        let first = deliberator.trigger(ActionContext::new(profile("alice")));
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = deliberator.trigger(ActionContext::new(profile("alice")));

        let first = first.await;
        assert!(first.unwrap_err().is_cancelled());
        let (result, _) = second.await.unwrap().unwrap();
        assert_eq!(result.get("answer"), Some(&json!(42)));

        let shared = deliberator.agent();
        let agent = shared.lock().await;
        assert_eq!(agent.history().len(), 3);
    }

    #[tokio::test]
    async fn test_cancel_stops_run() {
        let deliberator = Deliberator::new(agent());
        let handle = deliberator.trigger(ActionContext::new(profile("alice")));
        deliberator.cancel();
        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
