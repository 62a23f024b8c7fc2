//! Wire codec for the mesh gateway's MQTT surface (§4.1, §6).
//!
//! Parses request payloads into typed [`request::GatewayRequest`] values,
//! serializes [`response::GatewayResponse`], event, and status values back
//! onto the wire, and derives every topic string from
//! `(kind, gateway_id, sink_id?, network_address?, src_ep?, dst_ep?)`.

pub mod error;
pub mod event;
pub mod json;
pub mod request;
pub mod response;
pub mod topic;

pub use error::ParseError;
pub use event::{received_data_topic, status_topic, ReceivedDataWire};
pub use json::{Codec, JsonCodec};
pub use request::{GatewayRequest, TargetScratchpadRequest};
pub use response::GatewayResponse;
pub use topic::{build_topic, parse_topic, ParsedTopic, TopicKind};
