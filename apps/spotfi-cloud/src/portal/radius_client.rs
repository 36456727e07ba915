//! Hand-rolled RFC 2865 RADIUS client (spec.md §4.3 step 3: "delegate
//! credential verification to the RADIUS service via Access-Request").
//! No off-the-shelf RADIUS crate is available; this follows the corpus's
//! existing texture of hand-rolling small wire protocols over UDP where
//! the ecosystem doesn't offer one (see the RPC envelope in
//! `spotfi_shared::rpc`).

use std::net::SocketAddr;
use std::time::Duration;

use rand::RngCore;
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::warn;

const CODE_ACCESS_REQUEST: u8 = 1;
const CODE_ACCESS_ACCEPT: u8 = 2;
const CODE_ACCESS_REJECT: u8 = 3;

const ATTR_USER_NAME: u8 = 1;
const ATTR_USER_PASSWORD: u8 = 2;
const ATTR_NAS_IP_ADDRESS: u8 = 4;
const ATTR_CALLED_STATION_ID: u8 = 30;
const ATTR_CALLING_STATION_ID: u8 = 31;

const RADIUS_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum RadiusError {
    #[error("radius request timed out")]
    Timeout,
    #[error("radius socket error: {0}")]
    Socket(#[from] std::io::Error),
    #[error("radius server rejected the credentials")]
    Rejected,
    #[error("malformed radius response: {0}")]
    Malformed(String),
}

pub struct AccessRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub nas_ip_address: Option<std::net::Ipv4Addr>,
    pub called_station_id: Option<&'a str>,
    pub calling_station_id: Option<&'a str>,
}

/// Sends one Access-Request and blocks for the Access-Accept/Reject.
/// `secret` is the shared secret configured on the RADIUS server for
/// this NAS (spec.md §3 "Router.radiusSecret" plays this role).
pub async fn authenticate(
    radius_host: &str,
    secret: &str,
    request: AccessRequest<'_>,
) -> Result<bool, RadiusError> {
    let addr: SocketAddr = tokio::net::lookup_host(radius_host)
        .await?
        .next()
        .ok_or_else(|| RadiusError::Malformed(format!("could not resolve {radius_host}")))?;

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(addr).await?;

    let mut authenticator = [0u8; 16];
    rand::rng().fill_bytes(&mut authenticator);

    let packet = build_access_request(&request, secret, &authenticator);

    socket.send(&packet).await?;

    let mut buf = [0u8; 4096];
    let len = tokio::time::timeout(RADIUS_TIMEOUT, socket.recv(&mut buf))
        .await
        .map_err(|_| RadiusError::Timeout)??;

    parse_response(&buf[..len])
}

fn build_access_request(request: &AccessRequest<'_>, secret: &str, authenticator: &[u8; 16]) -> Vec<u8> {
    let mut attrs = Vec::new();
    push_attr(&mut attrs, ATTR_USER_NAME, request.username.as_bytes());
    push_attr(&mut attrs, ATTR_USER_PASSWORD, &encrypt_password(request.password, secret, authenticator));
    if let Some(ip) = request.nas_ip_address {
        push_attr(&mut attrs, ATTR_NAS_IP_ADDRESS, &ip.octets());
    }
    if let Some(called) = request.called_station_id {
        push_attr(&mut attrs, ATTR_CALLED_STATION_ID, called.as_bytes());
    }
    if let Some(calling) = request.calling_station_id {
        push_attr(&mut attrs, ATTR_CALLING_STATION_ID, calling.as_bytes());
    }

    let total_len = 20 + attrs.len();
    let mut packet = Vec::with_capacity(total_len);
    packet.push(CODE_ACCESS_REQUEST);
    packet.push(next_identifier());
    packet.extend_from_slice(&(total_len as u16).to_be_bytes());
    packet.extend_from_slice(authenticator);
    packet.extend_from_slice(&attrs);
    packet
}

fn push_attr(buf: &mut Vec<u8>, attr_type: u8, value: &[u8]) {
    buf.push(attr_type);
    buf.push((value.len() + 2) as u8);
    buf.extend_from_slice(value);
}

/// RFC 2865 §5.2 User-Password encryption: XOR the (zero-padded)
/// password against successive MD5(secret ‖ previous-ciphertext-block)
/// keystreams, chained from the request authenticator.
fn encrypt_password(password: &str, secret: &str, authenticator: &[u8; 16]) -> Vec<u8> {
    let mut padded = password.as_bytes().to_vec();
    let pad = (16 - padded.len() % 16) % 16;
    padded.extend(std::iter::repeat(0u8).take(pad));
    if padded.is_empty() {
        padded.extend_from_slice(&[0u8; 16]);
    }

    let mut result = Vec::with_capacity(padded.len());
    let mut prev_block: &[u8] = authenticator;
    let mut hash_input = Vec::with_capacity(secret.len() + 16);

    for chunk in padded.chunks(16) {
        hash_input.clear();
        hash_input.extend_from_slice(secret.as_bytes());
        hash_input.extend_from_slice(prev_block);
        let b = md5::compute(&hash_input).0;

        let mut cipher_block = [0u8; 16];
        for i in 0..16 {
            cipher_block[i] = chunk[i] ^ b[i];
        }
        result.extend_from_slice(&cipher_block);
        prev_block = &result[result.len() - 16..];
    }
    result
}

fn next_identifier() -> u8 {
    (rand::rng().next_u32() & 0xFF) as u8
}

fn parse_response(bytes: &[u8]) -> Result<bool, RadiusError> {
    if bytes.len() < 20 {
        return Err(RadiusError::Malformed("response shorter than header".to_string()));
    }
    match bytes[0] {
        CODE_ACCESS_ACCEPT => Ok(true),
        CODE_ACCESS_REJECT => Ok(false),
        other => {
            warn!(code = other, "unexpected radius response code");
            Err(RadiusError::Malformed(format!("unexpected response code {other}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_encryption_pads_to_16_bytes() {
        let authenticator = [0u8; 16];
        let encrypted = encrypt_password("short", "secret", &authenticator);
        assert_eq!(encrypted.len(), 16);
    }

    #[test]
    fn password_encryption_chains_across_blocks() {
        let authenticator = [7u8; 16];
        let encrypted = encrypt_password(&"x".repeat(20), "secret", &authenticator);
        assert_eq!(encrypted.len(), 32);
    }

    #[test]
    fn access_request_packet_has_radius_header_shape() {
        let authenticator = [1u8; 16];
        let request = AccessRequest {
            username: "alice",
            password: "hunter2",
            nas_ip_address: Some(std::net::Ipv4Addr::new(10, 0, 0, 1)),
            called_station_id: Some("80-AF-CA-C6-70-55"),
            calling_station_id: Some("AA-BB-CC-DD-EE-FF"),
        };
        let packet = build_access_request(&request, "secret", &authenticator);
        assert_eq!(packet[0], CODE_ACCESS_REQUEST);
        let declared_len = u16::from_be_bytes([packet[2], packet[3]]) as usize;
        assert_eq!(declared_len, packet.len());
    }

    #[test]
    fn parses_accept_and_reject_codes() {
        let mut accept = vec![CODE_ACCESS_ACCEPT, 1, 0, 20];
        accept.extend_from_slice(&[0u8; 16]);
        assert_eq!(parse_response(&accept).unwrap(), true);

        let mut reject = vec![CODE_ACCESS_REJECT, 1, 0, 20];
        reject.extend_from_slice(&[0u8; 16]);
        assert_eq!(parse_response(&reject).unwrap(), false);
    }
}
