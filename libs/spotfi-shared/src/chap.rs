//! UAM CHAP response computation (spec.md §4.3, §8): the WISPr-style
//! `MD5(CHAP-Identifier ‖ secret ‖ challenge)` handshake used to admit a
//! captive-portal client after a RADIUS Access-Accept.

use crate::error::SharedError;

/// Computes the UAM CHAP response as a lowercase hex string.
///
/// `identifier` is the single CHAP-Identifier byte (conventionally `0x00`
/// for UAM), `secret` is the router's UAM secret (taken as raw ASCII
/// bytes, not hex-decoded), and `challenge_hex` is the hex-encoded nonce
/// the router supplied.
pub fn response_hex(identifier: u8, secret: &str, challenge_hex: &str) -> Result<String, SharedError> {
    let challenge = hex::decode(challenge_hex)
        .map_err(|e| SharedError::MalformedEnvelope(format!("invalid challenge hex: {e}")))?;

    let mut buf = Vec::with_capacity(1 + secret.len() + challenge.len());
    buf.push(identifier);
    buf.extend_from_slice(secret.as_bytes());
    buf.extend_from_slice(&challenge);

    let digest = md5::compute(&buf);
    Ok(hex::encode(digest.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_the_spec_test_vector() {
        // spec.md §8 scenario 2.
        let secret = "391487087f0adffeffbe44aa399ef811";
        let challenge = "deadbeefcafebabe";
        let got = response_hex(0x00, secret, challenge).unwrap();

        let mut expected_input = vec![0x00u8];
        expected_input.extend_from_slice(secret.as_bytes());
        expected_input.extend_from_slice(&hex::decode(challenge).unwrap());
        let expected = hex::encode(md5::compute(&expected_input).0);

        assert_eq!(got, expected);
    }

    #[test]
    fn rejects_non_hex_challenge() {
        assert!(response_hex(0x00, "secret", "not-hex!!").is_err());
    }

    #[test]
    fn verifier_and_issuer_agree() {
        let secret = "s3cr3t";
        let challenge = hex::encode(b"some-nonce-bytes");
        let issued = response_hex(0x00, secret, &challenge).unwrap();
        let verified = response_hex(0x00, secret, &challenge).unwrap();
        assert_eq!(issued, verified);
    }
}
