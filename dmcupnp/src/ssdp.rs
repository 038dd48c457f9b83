/*!
One-shot SSDP search client.

The controller is a pure *control point*: it sends M-SEARCH datagrams and
collects the unicast HTTP/200 replies that arrive within the MX window. It
never binds UDP port 1900 — that port belongs to devices answering
discovery, and sharing it would make the kernel load-balance replies away
from us.
*/

use socket2::{Domain, Protocol, Socket, Type};
use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

pub const SSDP_MULTICAST_ADDR: &str = "239.255.255.250";
pub const SSDP_PORT: u16 = 1900;

/// Default max-age when a reply has no usable CACHE-CONTROL header.
pub const MAX_AGE: u32 = 1800;

/// A single M-SEARCH reply.
#[derive(Debug, Clone)]
pub struct SsdpResponse {
    pub usn: String,
    pub st: String,
    pub location: String,
    pub server: String,
    pub max_age: u32,
    pub from: SocketAddr,
}

/// Sends an M-SEARCH for `st` and collects replies for `mx` seconds.
///
/// Replies are deduplicated by LOCATION: devices answer once per advertised
/// service, and one description URL is enough for the caller.
pub fn ssdp_search(st: &str, mx: u32) -> std::io::Result<Vec<SsdpResponse>> {
    let mx = mx.max(1); // MX must be >= 1

    let socket2 = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket2.set_reuse_address(true)?;

    let bind_addr: SocketAddr = "0.0.0.0:0".parse().unwrap();
    socket2.bind(&bind_addr.into())?;

    let socket: UdpSocket = socket2.into();
    socket.set_read_timeout(Some(Duration::from_millis(500)))?;

    let msg = format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}:{}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\
         USER-AGENT: dmcontrol SSDP Client\r\n\
         \r\n",
        SSDP_MULTICAST_ADDR, SSDP_PORT, mx, st
    );

    let addr: SocketAddr = format!("{}:{}", SSDP_MULTICAST_ADDR, SSDP_PORT)
        .parse()
        .unwrap();
    socket.send_to(msg.as_bytes(), addr)?;
    debug!("M-SEARCH sent (ST={}, MX={})", st, mx);

    let deadline = Instant::now() + Duration::from_secs(mx as u64);
    let mut responses: Vec<SsdpResponse> = Vec::new();
    let mut buf = [0u8; 8192];

    while Instant::now() < deadline {
        match socket.recv_from(&mut buf) {
            Ok((n, from)) => {
                let data = String::from_utf8_lossy(&buf[..n]);
                if let Some(response) = parse_search_response(&data, from) {
                    trace!("SSDP reply from {}: {}", from, response.location);
                    if !responses.iter().any(|r| r.location == response.location) {
                        responses.push(response);
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => {
                warn!("SSDP read error: {}", e);
                break;
            }
        }
    }

    debug!("M-SEARCH collected {} device(s)", responses.len());
    Ok(responses)
}

/// Parses one datagram as an M-SEARCH reply. NOTIFY and foreign M-SEARCH
/// traffic is ignored.
pub fn parse_search_response(data: &str, from: SocketAddr) -> Option<SsdpResponse> {
    let mut lines = data.lines();
    let first_line = lines.next()?.trim();
    let upper = first_line.to_ascii_uppercase();

    if !(upper.starts_with("HTTP/") && upper.contains(" 200 ")) {
        trace!("Ignoring non-reply SSDP message from {}: {}", from, first_line);
        return None;
    }

    let headers = parse_headers(lines);

    // ST, USN and LOCATION are required by the UPnP spec
    let st = headers.get("ST")?.to_string();
    let usn = headers.get("USN")?.to_string();
    let location = headers.get("LOCATION")?.to_string();

    let server = headers
        .get("SERVER")
        .map(|s| s.to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    let max_age = parse_max_age(headers.get("CACHE-CONTROL"));

    Some(SsdpResponse {
        usn,
        st,
        location,
        server,
        max_age,
        from,
    })
}

fn parse_headers<'a, I>(lines: I) -> HashMap<String, String>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers = HashMap::new();
    for line in lines {
        let line = line.trim();

        // Empty line marks end of headers
        if line.is_empty() {
            break;
        }

        // Split on first ':' only (values may contain ':')
        if let Some(colon_pos) = line.find(':') {
            let (name, value_with_colon) = line.split_at(colon_pos);
            let value = &value_with_colon[1..];

            let name = name.trim().to_ascii_uppercase();
            let value = value.trim().to_string();

            if !name.is_empty() && !value.is_empty() {
                headers.insert(name, value);
            }
        } else {
            trace!("Skipping header line without colon: '{}'", line);
        }
    }
    headers
}

fn parse_max_age(value: Option<&String>) -> u32 {
    if let Some(v) = value {
        let lower = v.to_ascii_lowercase();
        if let Some(idx) = lower.find("max-age") {
            let after_key = &v[idx + 7..];
            let after_eq = after_key.trim_start().trim_start_matches('=').trim_start();
            let digits: String = after_eq
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if let Ok(age) = digits.parse::<u32>() {
                return age;
            }
        }
        trace!("Could not parse max-age from CACHE-CONTROL: '{}'", v);
    }
    MAX_AGE
}
