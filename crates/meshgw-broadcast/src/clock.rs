//! Time sourcing for the RTC broadcaster (§4.10).
//!
//! `Local` reads the system clock directly. `Ntp` queries a server each
//! cycle rather than caching an offset: a query failure surfaces as an
//! error (the retry-period fallback lives in [`crate::rtc`]) rather than
//! silently falling back to the local clock, since that would make the
//! published timestamp source ambiguous to downstream consumers.

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

#[derive(Clone, Debug)]
pub enum RtcClockSource {
    Local,
    Ntp { server: String },
}

#[derive(Debug, Error)]
pub enum ClockError {
    #[error("system clock is before the unix epoch")]
    ClockBeforeEpoch,
    #[error("ntp query to {server} failed: {source}")]
    NtpQuery {
        server: String,
        #[source]
        source: sntpc::Error,
    },
    #[error("ntp server address {server} did not resolve")]
    NtpResolve { server: String },
}

pub async fn now_ms(source: &RtcClockSource) -> Result<u64, ClockError> {
    match source {
        RtcClockSource::Local => local_now_ms(),
        RtcClockSource::Ntp { server } => ntp_now_ms(server).await,
    }
}

fn local_now_ms() -> Result<u64, ClockError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .map_err(|_| ClockError::ClockBeforeEpoch)
}

async fn ntp_now_ms(server: &str) -> Result<u64, ClockError> {
    use std::net::ToSocketAddrs;

    let addr = format!("{server}:123")
        .to_socket_addrs()
        .ok()
        .and_then(|mut it| it.next())
        .ok_or_else(|| ClockError::NtpResolve { server: server.to_string() })?;

    let socket = tokio::net::UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(|_| ClockError::NtpResolve { server: server.to_string() })?;
    let ntp_context = sntpc::NtpContext::new(sntpc::StdTimestampGen::default());
    let result = sntpc::get_time(addr, &socket, ntp_context)
        .await
        .map_err(|source| ClockError::NtpQuery { server: server.to_string(), source })?;

    let seconds = result.sec() as u64;
    let micros = (result.sec_fraction() as u64 * 1_000_000) >> 32;
    Ok(seconds * 1000 + micros / 1000)
}
