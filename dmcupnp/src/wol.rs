//! Wake-on-LAN magic packets.
//!
//! A magic packet is 6 bytes of 0xFF followed by the target MAC repeated 16
//! times, sent to the UDP broadcast address. Port 9 (discard) is the
//! conventional choice.

use std::net::UdpSocket;
use tracing::debug;

const WOL_PORT: u16 = 9;

#[derive(Debug, thiserror::Error)]
pub enum WolError {
    #[error("Invalid MAC address '{0}'")]
    InvalidMac(String),

    #[error("Failed to send magic packet: {0}")]
    Io(#[from] std::io::Error),
}

/// Parses a MAC address of the form `AA:BB:CC:DD:EE:FF` (also accepts `-`
/// as separator).
pub fn parse_mac(mac: &str) -> Result<[u8; 6], WolError> {
    let parts: Vec<&str> = mac.split([':', '-']).collect();
    if parts.len() != 6 {
        return Err(WolError::InvalidMac(mac.to_string()));
    }

    let mut bytes = [0u8; 6];
    for (i, part) in parts.iter().enumerate() {
        bytes[i] =
            u8::from_str_radix(part, 16).map_err(|_| WolError::InvalidMac(mac.to_string()))?;
    }
    Ok(bytes)
}

/// Assembles the 102-byte magic packet for a MAC.
pub fn magic_packet(mac: [u8; 6]) -> [u8; 102] {
    let mut packet = [0xFFu8; 102];
    for repetition in 0..16 {
        let offset = 6 + repetition * 6;
        packet[offset..offset + 6].copy_from_slice(&mac);
    }
    packet
}

/// Sends a magic packet for `mac` to the local broadcast address.
pub fn send_magic_packet(mac: &str) -> Result<(), WolError> {
    let bytes = parse_mac(mac)?;
    let packet = magic_packet(bytes);

    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.set_broadcast(true)?;
    socket.send_to(&packet, ("255.255.255.255", WOL_PORT))?;

    debug!("magic packet sent for {}", mac);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mac_colon_separated() {
        let mac = parse_mac("00:11:22:aa:bb:cc").unwrap();
        assert_eq!(mac, [0x00, 0x11, 0x22, 0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_parse_mac_dash_separated() {
        let mac = parse_mac("00-11-22-AA-BB-CC").unwrap();
        assert_eq!(mac, [0x00, 0x11, 0x22, 0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_parse_mac_rejects_garbage() {
        assert!(parse_mac("not a mac").is_err());
        assert!(parse_mac("00:11:22:aa:bb").is_err());
        assert!(parse_mac("00:11:22:aa:bb:zz").is_err());
    }

    #[test]
    fn test_magic_packet_layout() {
        let mac = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        let packet = magic_packet(mac);

        assert_eq!(packet.len(), 102);
        assert!(packet[..6].iter().all(|&b| b == 0xFF));
        for repetition in 0..16 {
            let offset = 6 + repetition * 6;
            assert_eq!(&packet[offset..offset + 6], &mac);
        }
    }
}
