//! On-demand ICMP reachability checks.
//!
//! A probe never fails: socket errors, timeouts and unanswered requests all
//! collapse into [`CheckStatus::Down`]. Persisting the outcome is left to the
//! caller.

use crate::models::{Asset, CheckStatus};
use async_trait::async_trait;
use serde::Serialize;
use std::{
    net::{IpAddr, Ipv4Addr},
    time::Duration,
};
use surge_ping::{Client, Config, PingIdentifier, PingSequence};
use tracing::{debug, warn};

const ECHO_PAYLOAD: [u8; 56] = [0; 56];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProbeOutcome {
    pub status: CheckStatus,
    /// Round-trip time in milliseconds, present only when the host answered.
    pub response_time_ms: Option<f64>,
}

impl ProbeOutcome {
    pub fn up(rtt: Duration) -> Self {
        Self {
            status: CheckStatus::Up,
            response_time_ms: Some(round_millis(rtt)),
        }
    }

    pub fn down() -> Self {
        Self {
            status: CheckStatus::Down,
            response_time_ms: None,
        }
    }
}

/// What a check against an asset produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CheckOutcome {
    /// The asset has no address; nothing was sent and nothing is logged.
    NoAddress,
    Checked(ProbeOutcome),
}

impl CheckOutcome {
    pub fn message(&self) -> String {
        match self {
            CheckOutcome::NoAddress => "Asset has no IP address".to_string(),
            CheckOutcome::Checked(ProbeOutcome {
                status,
                response_time_ms: Some(rtt),
            }) => format!(
                "Ping check: {} (Response: {rtt} ms)",
                status.as_str().to_uppercase()
            ),
            CheckOutcome::Checked(ProbeOutcome { status, .. }) => {
                format!("Ping check: {}", status.as_str().to_uppercase())
            }
        }
    }
}

#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, addr: Ipv4Addr) -> ProbeOutcome;
}

/// Sends a single ICMP echo request per probe.
#[derive(Debug, Clone)]
pub struct IcmpProber {
    timeout: Duration,
}

impl IcmpProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Prober for IcmpProber {
    async fn probe(&self, addr: Ipv4Addr) -> ProbeOutcome {
        let client = match Client::new(&Config::default()) {
            Ok(client) => client,
            Err(err) => {
                warn!(%addr, error = %err, "failed to open ICMP socket");
                return ProbeOutcome::down();
            }
        };

        let mut pinger = client
            .pinger(IpAddr::V4(addr), PingIdentifier(rand::random()))
            .await;
        pinger.timeout(self.timeout);

        match pinger.ping(PingSequence(0), &ECHO_PAYLOAD).await {
            Ok((_, rtt)) => {
                debug!(%addr, ?rtt, "echo reply received");
                ProbeOutcome::up(rtt)
            }
            Err(err) => {
                debug!(%addr, error = %err, "no echo reply");
                ProbeOutcome::down()
            }
        }
    }
}

/// Probes the asset's address, or reports that it has none.
pub async fn check_asset(prober: &dyn Prober, asset: &Asset) -> CheckOutcome {
    let Some(raw) = asset.ip_address.as_deref() else {
        return CheckOutcome::NoAddress;
    };

    match raw.parse::<Ipv4Addr>() {
        Ok(addr) => CheckOutcome::Checked(prober.probe(addr).await),
        Err(_) => {
            warn!(asset_id = asset.id, ip = raw, "stored address is not IPv4");
            CheckOutcome::Checked(ProbeOutcome::down())
        }
    }
}

fn round_millis(rtt: Duration) -> f64 {
    (rtt.as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AssetType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProber {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Prober for CountingProber {
        async fn probe(&self, _: Ipv4Addr) -> ProbeOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ProbeOutcome::up(Duration::from_micros(1500))
        }
    }

    fn asset(ip: Option<&str>) -> Asset {
        Asset {
            id: 1,
            name: "nas".into(),
            asset_type: AssetType::Server,
            ip_address: ip.map(str::to_string),
            location: None,
            purchase_date: None,
            notes: None,
        }
    }

    #[test]
    fn rtt_is_rounded_to_two_decimals() {
        assert_eq!(round_millis(Duration::from_micros(12_346)), 12.35);
        assert_eq!(round_millis(Duration::from_nanos(4_999)), 0.0);
        assert_eq!(round_millis(Duration::from_millis(2)), 2.0);
    }

    #[test]
    fn messages_match_outcome() {
        let up = CheckOutcome::Checked(ProbeOutcome::up(Duration::from_micros(1230)));
        assert_eq!(up.message(), "Ping check: UP (Response: 1.23 ms)");
        assert_eq!(
            CheckOutcome::Checked(ProbeOutcome::down()).message(),
            "Ping check: DOWN"
        );
        assert_eq!(CheckOutcome::NoAddress.message(), "Asset has no IP address");
    }

    #[test]
    fn outcome_serializes_with_result_tag() {
        let value = serde_json::to_value(CheckOutcome::Checked(ProbeOutcome::down())).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "result": "checked", "status": "down", "response_time_ms": null })
        );
        assert_eq!(
            serde_json::to_value(CheckOutcome::NoAddress).unwrap(),
            serde_json::json!({ "result": "no_address" })
        );
    }

    #[tokio::test]
    async fn asset_without_address_is_not_probed() {
        let prober = CountingProber {
            calls: AtomicUsize::new(0),
        };

        let outcome = check_asset(&prober, &asset(None)).await;

        assert_eq!(outcome, CheckOutcome::NoAddress);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn asset_with_address_is_probed_once() {
        let prober = CountingProber {
            calls: AtomicUsize::new(0),
        };

        let outcome = check_asset(&prober, &asset(Some("10.1.2.3"))).await;

        assert_eq!(
            outcome,
            CheckOutcome::Checked(ProbeOutcome {
                status: CheckStatus::Up,
                response_time_ms: Some(1.5),
            })
        );
        assert_eq!(prober.calls.load(Ordering::SeqCst), 1);
    }
}
