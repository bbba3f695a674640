//! COSE_Key parsing and assertion signature verification.
//!
//! Registered credentials store the authenticator's public key as the raw
//! COSE_Key CBOR structure. At authentication time the key is parsed and the
//! assertion signature over `authenticatorData || SHA-256(clientDataJSON)`
//! is verified with ring.

use ciborium::value::{Integer, Value as CborValue};
use ring::signature::UnparsedPublicKey;

use crate::passkey::errors::PasskeyError;

/// COSE algorithm identifier for ECDSA w/ SHA-256 (ES256)
pub(super) const COSE_ALG_ES256: i64 = -7;
/// COSE algorithm identifier for RSASSA-PKCS1-v1_5 w/ SHA-256 (RS256)
pub(super) const COSE_ALG_RS256: i64 = -257;

const COSE_KTY_EC2: i64 = 2;
const COSE_KTY_RSA: i64 = 3;
const COSE_CRV_P256: i64 = 1;

/// Public key material extracted from a COSE_Key map
#[derive(Debug)]
pub(super) enum CosePublicKey {
    Ec2 { x: Vec<u8>, y: Vec<u8> },
    Rsa { n: Vec<u8>, e: Vec<u8> },
}

impl CosePublicKey {
    /// Parse a COSE_Key CBOR structure (EC2/P-256 or RSA).
    pub(super) fn parse(cose_bytes: &[u8]) -> Result<Self, PasskeyError> {
        let value: CborValue = ciborium::de::from_reader(cose_bytes)
            .map_err(|e| PasskeyError::Attestation(format!("Invalid public key CBOR: {e}")))?;

        let CborValue::Map(map) = value else {
            return Err(PasskeyError::Attestation(
                "Public key is not a CBOR map".into(),
            ));
        };

        let mut kty = None;
        let mut alg = None;
        let mut crv = None;
        let mut x = None;
        let mut y = None;

        for (key, value) in map {
            let CborValue::Integer(label) = key else {
                continue;
            };
            match i128::from(label) {
                1 => kty = as_int(&value),
                3 => alg = as_int(&value),
                // -1 is crv for EC2 keys and n for RSA keys; -2 is x or e.
                // Disambiguated below once kty is known.
                -1 => crv = Some(value),
                -2 => x = Some(value),
                -3 => y = Some(value),
                _ => {}
            }
        }

        let kty = kty.ok_or_else(|| PasskeyError::Attestation("Missing key type".into()))?;

        match kty {
            COSE_KTY_EC2 => {
                if let Some(alg) = alg
                    && alg != COSE_ALG_ES256
                {
                    return Err(PasskeyError::Attestation(format!(
                        "Unsupported EC2 algorithm: {alg}"
                    )));
                }
                let curve = crv
                    .as_ref()
                    .and_then(as_int)
                    .ok_or_else(|| PasskeyError::Attestation("Missing curve".into()))?;
                if curve != COSE_CRV_P256 {
                    return Err(PasskeyError::Attestation(format!(
                        "Unsupported curve: {curve}"
                    )));
                }

                let x = as_bytes(x).ok_or_else(|| {
                    PasskeyError::Attestation("Missing or invalid x coordinate".into())
                })?;
                let y = as_bytes(y).ok_or_else(|| {
                    PasskeyError::Attestation("Missing or invalid y coordinate".into())
                })?;

                if x.len() != 32 || y.len() != 32 {
                    return Err(PasskeyError::Attestation(
                        "P-256 coordinates must be 32 bytes".into(),
                    ));
                }

                Ok(Self::Ec2 { x, y })
            }
            COSE_KTY_RSA => {
                if let Some(alg) = alg
                    && alg != COSE_ALG_RS256
                {
                    return Err(PasskeyError::Attestation(format!(
                        "Unsupported RSA algorithm: {alg}"
                    )));
                }

                // For RSA keys label -1 is the modulus and -2 the exponent
                let n = crv
                    .and_then(|v| as_bytes(Some(v)))
                    .ok_or_else(|| PasskeyError::Attestation("Missing RSA modulus".into()))?;
                let e = as_bytes(x)
                    .ok_or_else(|| PasskeyError::Attestation("Missing RSA exponent".into()))?;

                Ok(Self::Rsa { n, e })
            }
            other => Err(PasskeyError::Attestation(format!(
                "Unsupported key type: {other}"
            ))),
        }
    }

    /// Verify `signature` over `message` with this key.
    pub(super) fn verify_signature(
        &self,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), PasskeyError> {
        match self {
            Self::Ec2 { x, y } => {
                // Uncompressed point format expected by ring
                let mut point = Vec::with_capacity(65);
                point.push(0x04);
                point.extend_from_slice(x);
                point.extend_from_slice(y);

                UnparsedPublicKey::new(&ring::signature::ECDSA_P256_SHA256_ASN1, &point)
                    .verify(message, signature)
                    .map_err(|_| PasskeyError::SignatureInvalid)
            }
            Self::Rsa { n, e } => {
                let der = rsa_public_key_der(n, e);
                UnparsedPublicKey::new(&ring::signature::RSA_PKCS1_2048_8192_SHA256, &der)
                    .verify(message, signature)
                    .map_err(|_| PasskeyError::SignatureInvalid)
            }
        }
    }
}

fn as_int(value: &CborValue) -> Option<i64> {
    match value {
        CborValue::Integer(i) => i64::try_from(i128::from(*i)).ok(),
        _ => None,
    }
}

fn as_bytes(value: Option<CborValue>) -> Option<Vec<u8>> {
    match value {
        Some(CborValue::Bytes(b)) => Some(b),
        _ => None,
    }
}

/// Encode `RSAPublicKey ::= SEQUENCE { modulus INTEGER, publicExponent INTEGER }`
/// as DER, which is the format ring expects for RSA verification keys.
fn rsa_public_key_der(n: &[u8], e: &[u8]) -> Vec<u8> {
    let n = der_integer(n);
    let e = der_integer(e);

    let mut body = Vec::with_capacity(n.len() + e.len());
    body.extend_from_slice(&n);
    body.extend_from_slice(&e);

    let mut der = Vec::with_capacity(body.len() + 4);
    der.push(0x30); // SEQUENCE
    der.extend_from_slice(&der_length(body.len()));
    der.extend_from_slice(&body);
    der
}

fn der_integer(bytes: &[u8]) -> Vec<u8> {
    if bytes.is_empty() {
        return vec![0x02, 0x01, 0x00];
    }

    // Strip leading zeros, then restore a single zero if the high bit is set
    // so the value stays non-negative
    let mut start = 0;
    while start < bytes.len() - 1 && bytes[start] == 0 {
        start += 1;
    }
    let trimmed = &bytes[start..];
    let needs_pad = trimmed[0] & 0x80 != 0;

    let content_len = trimmed.len() + usize::from(needs_pad);
    let mut out = Vec::with_capacity(content_len + 3);
    out.push(0x02); // INTEGER
    out.extend_from_slice(&der_length(content_len));
    if needs_pad {
        out.push(0x00);
    }
    out.extend_from_slice(trimmed);
    out
}

fn der_length(len: usize) -> Vec<u8> {
    if len < 0x80 {
        vec![len as u8]
    } else if len <= 0xff {
        vec![0x81, len as u8]
    } else {
        vec![0x82, (len >> 8) as u8, len as u8]
    }
}
