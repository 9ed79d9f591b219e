//! Vigil Events - Event bus for ledger-state changes.
//!
//! The reconciliation engine publishes a [`VigilEvent`] every time the
//! ledger changes in a way a frontend cares about: a request was ingested,
//! resolved, or expired, or a project's oversight settings were replaced
//! by an authoritative payload.
//!
//! Frontends subscribe with [`EventBus::subscribe`] and render whatever
//! the ledger currently believes; they never mutate ledger state through
//! this channel.
//!
//! # Example
//!
//! ```rust
//! use vigil_events::{EventBus, VigilEvent};
//! use vigil_core::LocalId;
//!
//! # async fn example() {
//! let bus = EventBus::new();
//! let mut receiver = bus.subscribe();
//!
//! bus.publish(VigilEvent::ApprovalExpired {
//!     local_id: LocalId::new(),
//!     approval_id: None,
//! });
//!
//! let event = receiver.recv().await.unwrap();
//! assert_eq!(event.event_type(), "approval_expired");
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod bus;
mod event;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventReceiver, RecvError};
pub use event::VigilEvent;
