//! Channel boundary and the self-healing connection that owns it.
//!
//! A [`RetryableConnection`] keeps at most one [`Channel`] alive, replaces it
//! whenever its session ends, and replays the latest operand onto every new
//! channel before announcing it.

mod channel;
mod retry;
mod retryable;

pub use channel::{Channel, ChannelFactory, InterestChannel};
pub use retry::{ConnectionState, RetryPolicy};
pub use retryable::{Binding, RetryableConnection};
