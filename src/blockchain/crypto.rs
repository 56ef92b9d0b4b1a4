use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::debug;
#[cfg(test)]
use p256::ecdsa::signature::Signer;
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use p256::PublicKey;
use rand::rngs::OsRng;
use thiserror::Error;

const PEM_HEADER: &str = "-----BEGIN PUBLIC KEY-----";
const PEM_FOOTER: &str = "-----END PUBLIC KEY-----";
const PEM_LINE_WIDTH: usize = 64;

/// Length of a raw `r || s` P-256 signature
pub const RAW_SIGNATURE_LEN: usize = 64;

/// Errors that can occur during key handling
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Encoding error: {0}")]
    EncodingError(String),
}

/// Normalizes a public key into a well-formed SPKI PEM document
///
/// Accepts a full PEM with any line endings, a PEM squashed onto one line,
/// or a bare base64 blob. The base64 body is re-wrapped at 64 columns
/// between the standard header and footer.
pub fn normalize_public_key_pem(raw: &str) -> String {
    let body = match (raw.find(PEM_HEADER), raw.find(PEM_FOOTER)) {
        (Some(h), Some(f)) if f >= h + PEM_HEADER.len() => &raw[h + PEM_HEADER.len()..f],
        _ => raw,
    };

    let b64: String = body.chars().filter(|c| !c.is_whitespace()).collect();

    let mut pem = String::with_capacity(b64.len() + 64);
    pem.push_str(PEM_HEADER);
    pem.push('\n');
    for chunk in b64.as_bytes().chunks(PEM_LINE_WIDTH) {
        // base64 is ASCII so byte chunks never split a character
        pem.push_str(&String::from_utf8_lossy(chunk));
        pem.push('\n');
    }
    pem.push_str(PEM_FOOTER);
    pem.push('\n');
    pem
}

/// Converts a decoded signature into its ASN.1 DER form
///
/// Browser crypto APIs emit the fixed-length raw `r || s` encoding;
/// anything that is not exactly 64 bytes is assumed to already be DER.
pub fn normalize_signature(bytes: &[u8]) -> Option<Vec<u8>> {
    if bytes.len() == RAW_SIGNATURE_LEN {
        let signature = Signature::from_slice(bytes).ok()?;
        return Some(signature.to_der().as_bytes().to_vec());
    }

    Some(bytes.to_vec())
}

fn parse_public_key(pem: &str) -> Option<VerifyingKey> {
    let normalized = normalize_public_key_pem(pem);
    let public_key = PublicKey::from_public_key_pem(&normalized).ok()?;
    Some(VerifyingKey::from(public_key))
}

/// Verifies an ECDSA P-256 / SHA-256 signature over a message
///
/// Every failure (bad base64, bad key, bad encoding, mismatch) is `false`.
pub fn verify_signature(public_key_pem: &str, message: &str, signature_base64: &str) -> bool {
    let compact: String = signature_base64.chars().filter(|c| !c.is_whitespace()).collect();
    let decoded = match STANDARD.decode(compact) {
        Ok(bytes) if !bytes.is_empty() => bytes,
        _ => {
            debug!("Signature is not valid base64");
            return false;
        }
    };

    let signature = match normalize_signature(&decoded).and_then(|der| Signature::from_der(&der).ok()) {
        Some(signature) => signature,
        None => {
            debug!("Signature of {} bytes could not be decoded", decoded.len());
            return false;
        }
    };

    let verifying_key = match parse_public_key(public_key_pem) {
        Some(key) => key,
        None => {
            debug!("Public key could not be parsed");
            return false;
        }
    };

    verifying_key.verify(message.as_bytes(), &signature).is_ok()
}

/// A P-256 keypair able to authorize transfers
#[derive(Debug, Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Creates a new random keypair
    pub fn generate() -> Self {
        KeyPair {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Exports the public key as an SPKI PEM document
    pub fn public_key_pem(&self) -> Result<String, CryptoError> {
        PublicKey::from(self.signing_key.verifying_key())
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::EncodingError(e.to_string()))
    }

    /// Exports the secret scalar
    pub fn export_secret_key(&self) -> Vec<u8> {
        self.signing_key.to_bytes().to_vec()
    }
}

// Clients sign in the browser; the node only signs in tests
#[cfg(test)]
impl KeyPair {
    /// Signs a message and returns the base64 DER signature
    pub fn sign(&self, message: &str) -> String {
        let signature: Signature = self.signing_key.sign(message.as_bytes());
        STANDARD.encode(signature.to_der().as_bytes())
    }

    /// Signs a message and returns the base64 raw `r || s` signature
    pub fn sign_raw(&self, message: &str) -> String {
        let signature: Signature = self.signing_key.sign(message.as_bytes());
        STANDARD.encode(signature.to_bytes())
    }
}
