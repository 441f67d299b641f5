// src/events/mod.rs
//
// Internal Event System - Public API
//
// Every domain object embeds an EventBus over its own closed event enum.
// Handler storage stays private to the bus module.

pub mod bus;
pub mod listener;
pub mod types;

pub use bus::EventBus;
pub use listener::{Listener, ListenerId};
pub use types::{DomainEvent, Tip, TipLevel};
