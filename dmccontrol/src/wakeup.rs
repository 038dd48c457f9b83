//! Reachability probe and Wake-on-LAN recovery.

use std::thread::sleep;
use std::time::Duration;

use dmcupnp::wol::send_magic_packet;
use tracing::{debug, warn};
use ureq::Agent;

use crate::renderer::RendererHandle;

pub const MAX_RETRIES: u32 = 10;

/// Short probe: a renderer on the LAN answers within this or not at all.
const PROBE_TIMEOUT: Duration = Duration::from_millis(200);

/// Wake-on-LAN needs a moment before the NIC brings the host up.
const WAKE_DELAY: Duration = Duration::from_secs(2);

/// Probes a control URL. Any HTTP response, error status included, means
/// someone is listening; only a transport-level failure counts as offline.
pub fn check_online(url: &str) -> bool {
    let config = Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(PROBE_TIMEOUT))
        .build();
    let agent: Agent = config.into();

    match agent.get(url).call() {
        Ok(_) => true,
        Err(e) => {
            debug!(url = %url, error = %e, "probe got no response");
            false
        }
    }
}

/// Makes sure a renderer is reachable, waking it over the network when it
/// has a MAC configured.
///
/// Returns `true` as soon as a probe succeeds; `false` when the device has
/// no MAC or stays silent through [`MAX_RETRIES`] wake attempts.
pub fn ensure_online(handle: &RendererHandle) -> bool {
    let Some(url) = handle.url() else {
        return false;
    };
    let mac = handle.mac();

    ensure_online_with(
        &url,
        mac.as_deref(),
        &check_online,
        &|mac| {
            if let Err(e) = send_magic_packet(mac) {
                warn!(mac = %mac, error = %e, "failed to send magic packet");
            }
        },
        WAKE_DELAY,
    )
}

fn ensure_online_with(
    url: &str,
    mac: Option<&str>,
    probe: &dyn Fn(&str) -> bool,
    wake: &dyn Fn(&str),
    delay: Duration,
) -> bool {
    if probe(url) {
        return true;
    }

    let Some(mac) = mac else {
        debug!(url = %url, "cannot wake device without a mac");
        return false;
    };

    for attempt in 0..MAX_RETRIES {
        if probe(url) {
            debug!(url = %url, "device online after {} wakeup(s)", attempt);
            return true;
        }
        wake(mac);
        sleep(delay);
    }

    debug!(url = %url, "could not wake device after {} attempts", MAX_RETRIES);
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// Runs ensure_online_with against a canned probe sequence (missing
    /// entries count as offline) and returns (result, wake_count).
    fn run(probes: &[bool], mac: Option<&str>) -> (bool, u32) {
        let sequence = RefCell::new(probes.to_vec());
        let wakes = Cell::new(0u32);

        let probe = |_: &str| -> bool {
            let mut sequence = sequence.borrow_mut();
            if sequence.is_empty() {
                false
            } else {
                sequence.remove(0)
            }
        };
        let wake = |_: &str| {
            wakes.set(wakes.get() + 1);
        };

        let result = ensure_online_with("http://device/ctl", mac, &probe, &wake, Duration::ZERO);
        (result, wakes.get())
    }

    #[test]
    fn test_online_immediately_sends_no_packet() {
        let (online, wakes) = run(&[true], Some("00:11:22:33:44:55"));
        assert!(online);
        assert_eq!(wakes, 0);
    }

    #[test]
    fn test_offline_without_mac() {
        let (online, wakes) = run(&[false], None);
        assert!(!online);
        assert_eq!(wakes, 0);
    }

    #[test]
    fn test_online_after_one_wakeup() {
        // first probe offline, loop probe offline once, then online
        let (online, wakes) = run(&[false, false, true], Some("00:11:22:33:44:55"));
        assert!(online);
        assert_eq!(wakes, 1);
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let (online, wakes) = run(&[], Some("00:11:22:33:44:55"));
        assert!(!online);
        assert_eq!(wakes, MAX_RETRIES);
    }
}
