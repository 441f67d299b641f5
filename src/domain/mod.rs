// src/domain/mod.rs
//
// Domain base - the contract every stateful object implements.
//
// CRITICAL RULES:
// - Each object embeds exactly one EventBus and exposes it through bus()
// - state() is a plain snapshot, safe to hand to a rendering layer
// - Tips and teardown come for free from the bus

use crate::error::{ServiceError, ServiceResult};
use crate::events::{DomainEvent, EventBus, Listener, Tip};

pub trait Domain {
    type Event: DomainEvent;
    type State: Clone + Send + Sync + 'static;

    fn bus(&self) -> &EventBus<Self::Event>;

    fn state(&self) -> Self::State;

    fn on_state_change<F>(&self, handler: F) -> Listener
    where
        F: Fn(&Self::State) + Send + Sync + 'static;

    fn on_tip<F>(&self, handler: F) -> Listener
    where
        F: Fn(&Tip) + Send + Sync + 'static,
    {
        self.bus().on_tip(handler)
    }

    fn tip(&self, tip: impl Into<Tip>) {
        self.bus().tip(tip)
    }

    /// Reports a caller-side precondition failure through the tip channel.
    /// The error never reaches a request.
    fn validation_failed<T>(&self, message: impl Into<String>) -> ServiceResult<T> {
        let error = ServiceError::validation(message);
        self.tip(Tip::from_error(&error));
        Err(error)
    }

    /// Tears down every listener this object owns. Idempotent.
    fn destroy(&self) {
        self.bus().destroy()
    }

    fn is_destroyed(&self) -> bool {
        self.bus().is_destroyed()
    }
}
