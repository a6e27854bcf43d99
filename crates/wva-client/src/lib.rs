//! WVA Client Library
//!
//! Typed access to the web services of a WVA telematics device and to its
//! TCP event stream.
//!
//! # Example
//!
//! ```rust,no_run
//! use wva_client::{ClientConfig, Wva};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::new("192.168.100.1").with_credentials("user", "pass");
//!     let wva = Wva::new(config)?;
//!
//!     // Read a single data element
//!     let speed = wva.vehicle_data_element("VehicleSpeed").sample().await?;
//!     println!("{} at {}", speed.value, speed.timestamp);
//!
//!     // Have the device push it every 3 seconds
//!     wva.subscription("speed~sub")
//!         .create("vehicle/data/VehicleSpeed", "queue", 3)
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! Pushed data arrives on the [`stream::EventStream`] returned by
//! [`Wva::event_stream`].
//!
//! # Testing
//!
//! The `testing` module provides a fake device for integration tests:
//!
//! ```rust,ignore
//! use wva_client::testing::FakeDevice;
//!
//! let device = FakeDevice::start().await?;
//! let wva = wva_client::Wva::from_client(device.client()?);
//! ```

mod client;
mod control;
mod device;
mod error;
pub mod stream;
pub mod subscription;
pub mod testing;
mod types;
pub mod vehicle;

pub use client::{ClientConfig, WvaClient};
pub use control::{ControlPlane, HttpControlPlane, StreamConfig};
pub use device::Wva;
pub use error::{HttpErrorKind, Result, WvaError};
pub use types::*;

// Re-export streaming types for convenience
pub use stream::{ConnectionState, EventStream, Listener, StreamEvent, StreamSettings};
pub use subscription::SubscriptionHandle;
pub use vehicle::{VehicleDataElement, VehicleDataSample};
