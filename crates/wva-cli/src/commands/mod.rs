//! Command implementations for wva-cli

pub mod configure;
pub mod raw;
pub mod sample;
pub mod stream;
pub mod subscriptions;

pub use configure::configure;
pub use raw::{delete, get, post, put};
pub use sample::sample;
pub use stream::stream;
pub use subscriptions::{subscribe, subscriptions, unsubscribe};
