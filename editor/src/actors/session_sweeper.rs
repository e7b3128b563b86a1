//! SessionSweeperActor - idle-session timeout trigger.
//!
//! Sessions have no timers of their own. This actor ticks on an interval,
//! asks the store for sessions idle past the warning threshold (forwarding
//! one notice per idle stretch to the host) and expires sessions idle past
//! the timeout.

use async_trait::async_trait;
use chrono::Utc;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use shared_types::SessionId;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::session_store::{IdleWarning, SessionStore};

/// Notices the sweeper sends to the host so it can tell session owners
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepNotice {
    Warning(IdleWarning),
    Expired(SessionId),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub warned: Vec<IdleWarning>,
    pub expired: Vec<SessionId>,
}

pub struct SweeperArguments {
    pub store: SessionStore,
    pub interval: Duration,
    pub notices: Option<mpsc::UnboundedSender<SweepNotice>>,
}

pub struct SweeperState {
    store: SessionStore,
    notices: Option<mpsc::UnboundedSender<SweepNotice>>,
    sweeps: u64,
}

#[derive(Debug)]
pub enum SweeperMsg {
    /// Internal trigger from the ticker
    SweepNow,
    /// Sweep immediately and return what happened
    SweepAndReport { reply: RpcReplyPort<SweepReport> },
    GetSweepCount { reply: RpcReplyPort<u64> },
}

#[derive(Debug, Default)]
pub struct SessionSweeperActor;

#[async_trait]
impl Actor for SessionSweeperActor {
    type Msg = SweeperMsg;
    type State = SweeperState;
    type Arguments = SweeperArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let interval = args.interval.max(Duration::from_millis(10));
        let tick_ref = myself.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick is immediate; skip it
            loop {
                ticker.tick().await;
                if tick_ref.cast(SweeperMsg::SweepNow).is_err() {
                    break;
                }
            }
        });

        tracing::info!(interval_ms = interval.as_millis() as u64, "Session sweeper started");

        Ok(SweeperState {
            store: args.store,
            notices: args.notices,
            sweeps: 0,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SweeperMsg::SweepNow => {
                self.sweep(state).await;
            }
            SweeperMsg::SweepAndReport { reply } => {
                let report = self.sweep(state).await;
                let _ = reply.send(report);
            }
            SweeperMsg::GetSweepCount { reply } => {
                let _ = reply.send(state.sweeps);
            }
        }
        Ok(())
    }
}

impl SessionSweeperActor {
    async fn sweep(&self, state: &mut SweeperState) -> SweepReport {
        let now = Utc::now();
        let warned = state.store.sessions_needing_warning(now).await;
        let expired = state.store.expire_idle(now).await;
        state.sweeps += 1;

        if !warned.is_empty() || !expired.is_empty() {
            tracing::info!(
                warned = warned.len(),
                expired = expired.len(),
                "Session sweep"
            );
        }

        if let Some(notices) = &state.notices {
            let sent = warned
                .iter()
                .cloned()
                .map(SweepNotice::Warning)
                .chain(expired.iter().cloned().map(SweepNotice::Expired))
                .try_for_each(|notice| notices.send(notice));
            if sent.is_err() {
                tracing::warn!("Sweep notice receiver dropped");
                state.notices = None;
            }
        }

        SweepReport { warned, expired }
    }
}
