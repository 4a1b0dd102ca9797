//! Address resolution order (§4.2): USB static IP, then mDNS, then the
//! team-number-derived fallback.
//!
//! Grounded on `raje2v-DriveStation::discovery.rs`'s `discover_roborio`
//! (same `mdns-sd` browse-with-timeout shape, ported from a channel-result
//! callback into a plain `async fn` returning the resolved address).

use std::net::IpAddr;
use std::time::Duration;

use mdns_sd::{ServiceDaemon, ServiceEvent};

use crate::util::{ip_from_team_number, mdns_hostname};

/// USB-emulated network link's fixed controller address.
pub const USB_ADDRESS: &str = "172.22.11.2";

const MDNS_SERVICE_TYPE: &str = "_ni._tcp.local.";
const MDNS_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolves the controller's address for `team`, trying USB, then mDNS, then
/// the static fallback in that order. Never fails: the static fallback is
/// always a valid candidate address, even if unreachable.
pub async fn resolve(team: u16, use_usb: bool) -> String {
    if use_usb {
        tracing::debug!("using usb address {USB_ADDRESS}");
        return USB_ADDRESS.to_string();
    }

    if let Some(addr) = resolve_mdns(team).await {
        tracing::info!(%addr, "resolved controller via mdns");
        return addr.to_string();
    }

    let fallback = ip_from_team_number(team);
    tracing::info!(%fallback, "mdns resolution failed, using static fallback");
    fallback
}

async fn resolve_mdns(team: u16) -> Option<IpAddr> {
    let hostname = mdns_hostname(team).to_lowercase();

    let daemon = match ServiceDaemon::new() {
        Ok(daemon) => daemon,
        Err(err) => {
            tracing::warn!(%err, "mdns daemon init failed");
            return None;
        }
    };

    let receiver = match daemon.browse(MDNS_SERVICE_TYPE) {
        Ok(receiver) => receiver,
        Err(err) => {
            tracing::warn!(%err, "mdns browse failed");
            let _ = daemon.shutdown();
            return None;
        }
    };

    let timeout = tokio::time::sleep(MDNS_TIMEOUT);
    tokio::pin!(timeout);

    let found = loop {
        tokio::select! {
            _ = &mut timeout => break None,
            event = tokio::task::spawn_blocking({
                let receiver = receiver.clone();
                move || receiver.recv_timeout(Duration::from_secs(1))
            }) => {
                match event {
                    Ok(Ok(ServiceEvent::ServiceResolved(info))) => {
                        let name = info.get_fullname().to_lowercase();
                        if name.contains(&hostname) {
                            if let Some(addr) = info.get_addresses().iter().next() {
                                break Some(*addr);
                            }
                        }
                    }
                    Ok(Ok(_)) => continue,
                    _ => break None,
                }
            }
        }
    };

    let _ = daemon.shutdown();
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn usb_mode_short_circuits_to_fixed_address() {
        assert_eq!(resolve(100, true).await, USB_ADDRESS);
    }

    #[test]
    fn mdns_service_type_matches_ni_convention() {
        assert_eq!(MDNS_SERVICE_TYPE, "_ni._tcp.local.");
    }
}
