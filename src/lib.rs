//! A non-blocking, single-threaded, multi-connection TCP selector.
//!
//! Drives many TCP connections through one `poll()` call: initiates
//! outbound connects, accepts registration of already-connected sockets,
//! frames size-delimited requests and responses per connection, batches
//! completed sends/receives for the caller, tracks and reaps idle
//! connections, and exposes aggregate and per-connection metrics.
//!
//! ```no_run
//! use std::time::Duration;
//! use net_selector::{PlaintextChannelBuilder, Selector, SelectorConfig, SystemClock};
//!
//! let mut selector = Selector::new(
//!     SelectorConfig::default(),
//!     Box::new(PlaintextChannelBuilder),
//!     Box::new(SystemClock),
//! ).unwrap();
//!
//! selector.connect("broker-0", "127.0.0.1:9092".parse().unwrap(), None, None).unwrap();
//!
//! loop {
//!     selector.poll(Duration::from_millis(500)).unwrap();
//!     for id in selector.connected() {
//!         println!("connected: {id}");
//!     }
//!     for (id, reason) in selector.disconnected() {
//!         println!("disconnected: {id} ({reason:?})");
//!         break;
//!     }
//! }
//! ```

pub mod channel;
pub mod clock;
pub mod config;
pub mod epoll;
pub mod error;
pub mod framing;
pub mod idle;
pub mod metrics;
pub mod net;
pub mod registry;
pub mod selector;
mod sys;
pub mod transport;
mod waker;

pub use channel::{Channel, ChannelBuilder, PlaintextChannelBuilder};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SelectorConfig;
pub use epoll::{Epoll, EpollOpt, Evented, Event, Events, Ready, Source, Token};
pub use error::{Result, SelectorError};
pub use framing::{Receive, Send};
pub use net::tcp;
pub use registry::ConnectionId;
pub use selector::{DisconnectReason, Selector};
pub use transport::{PlaintextTransport, Transport};
