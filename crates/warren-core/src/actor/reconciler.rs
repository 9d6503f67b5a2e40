//! `ReconcilerActor`: one mailbox per managed instance
//!
//! Events sent concurrently are queued by the mailbox and each is fully
//! reconciled before the next one is handled.

use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::ActorStopReason;
use kameo::message::{Context, Message};
use kameo::prelude::*;
use tracing::info;

use crate::error::CoreError;
use crate::message::{GetDurableState, HandleHook, PassReport};
use crate::reconcile::Reconciler;
use crate::state::DurableState;

/// Arguments for spawning a `ReconcilerActor`
pub struct ReconcilerActorArgs {
    pub reconciler: Reconciler,
}

pub struct ReconcilerActor {
    reconciler: Reconciler,
    /// Passes handled since the actor started
    passes: u64,
}

impl ReconcilerActor {
    /// Name of the managed system service
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.reconciler.layout().service_name
    }
}

impl Actor for ReconcilerActor {
    type Args = ReconcilerActorArgs;
    type Error = CoreError;

    async fn on_start(args: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        info!(
            service = %args.reconciler.layout().service_name,
            id = %actor_ref.id(),
            "ReconcilerActor starting"
        );

        Ok(Self {
            reconciler: args.reconciler,
            passes: 0,
        })
    }

    async fn on_stop(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        reason: ActorStopReason,
    ) -> Result<(), Self::Error> {
        info!(
            service = %self.service_name(),
            passes = self.passes,
            reason = ?reason,
            "ReconcilerActor stopping"
        );
        Ok(())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<HandleHook> for ReconcilerActor {
    type Reply = Result<PassReport, CoreError>;

    async fn handle(
        &mut self,
        msg: HandleHook,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.passes += 1;
        info!(event = %msg.event, pass = self.passes, "handling hook");
        self.reconciler.handle(msg.event).await
    }
}

impl Message<GetDurableState> for ReconcilerActor {
    type Reply = Result<DurableState, CoreError>;

    async fn handle(
        &mut self,
        _msg: GetDurableState,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.reconciler.durable_state().await
    }
}
