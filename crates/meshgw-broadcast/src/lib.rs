//! Periodic broadcast services (§4.10): two independent background tasks
//! pushing TLV-encoded RTC time and keep-alive messages to every sink.
//! Neither task owns any transport state of its own — they only call into
//! [`meshgw_switch::SinkManager`] and [`meshgw_switch::Sink::send`].

pub mod clock;
pub mod error;
pub mod keepalive;
pub mod rtc;
pub mod tlv;

pub use clock::{ClockError, RtcClockSource};
pub use error::BroadcastError;
pub use keepalive::{KeepAliveBroadcaster, KeepAliveBroadcasterConfig};
pub use rtc::{RtcBroadcaster, RtcBroadcasterConfig};
