//! Request dispatch (§4.7): the glue between the MQTT transport's inbound
//! callback and the sink registry. Owns no I/O of its own — it only decodes,
//! calls into [`meshgw_switch`], and enqueues one response per request onto
//! the transport's outbound queue.

pub mod dispatcher;

pub use dispatcher::{Dispatcher, GatewayIdentity, StatusNudge};
