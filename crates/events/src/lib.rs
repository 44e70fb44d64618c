//! Codimir status delivery.
//!
//! Pushes dispatcher status changes to parties outside the process:
//!
//! - [`CallbackDelivery`] -- HTTP POST of a [`CallbackPayload`] with
//!   exponential-backoff retry.
//! - [`CallbackRelay`] -- background service that follows the dispatcher's
//!   status feed and forwards worker reports to each job's callback URL.

pub mod delivery;
pub mod relay;

pub use delivery::callback::{CallbackDelivery, CallbackPayload, DeliveryError};
pub use relay::CallbackRelay;
