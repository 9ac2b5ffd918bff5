//! Core interest handling types.

mod builder;
mod config;
mod handler;
mod stream;
mod tracker;

pub use builder::InterestHandlerBuilder;
pub use config::HandlerConfig;
pub use handler::InterestHandler;
pub use stream::InterestStream;
pub use tracker::InterestTracker;
