//! Event stream support for WVA devices
//!
//! The device pushes JSON event documents over a plain TCP socket once
//! `config/ws_events` is switched on. [`EventStream`] owns a background
//! task that keeps that socket connected, frames the byte stream into
//! [`StreamEvent`]s and hands each one to the registered listeners.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wva_client::stream::{Listener, StreamEvent};
//! use wva_client::{ClientConfig, Wva};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let wva = Wva::new(ClientConfig::new("192.168.100.1").with_credentials("user", "pass"))?;
//! let stream = wva.event_stream();
//!
//! let printer: Listener = Arc::new(|event: &StreamEvent| -> anyhow::Result<()> {
//!     println!("{:?}", event.short_name());
//!     Ok(())
//! });
//! stream.add_event_listener(printer);
//! stream.enable();
//!
//! // ...
//!
//! stream.disable().await;
//! # Ok(())
//! # }
//! ```

pub(crate) mod bus;
pub(crate) mod framer;
mod handle;
pub(crate) mod supervisor;
mod transport;
pub(crate) mod types;

pub use bus::{EventBus, EventListener, Listener};
pub use framer::{next_event, Framed};
pub use handle::EventStream;
pub use supervisor::{Supervisor, SupervisorTask};
pub use transport::{StreamConnection, StreamTransport, TcpTransport};
pub use types::{ConnectionState, StreamError, StreamEvent, StreamSettings, TransportError};
