//! PKCE (RFC 7636) verifier/challenge pairs and CSRF state

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Random bytes behind a verifier; 48 bytes encode to 64 characters
const VERIFIER_ENTROPY_BYTES: usize = 48;

const STATE_ENTROPY_BYTES: usize = 24;

/// S256 verifier and the challenge derived from it
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    pub fn generate() -> Self {
        let verifier = random_urlsafe(VERIFIER_ENTROPY_BYTES);
        let challenge = challenge_for(&verifier);
        Self { verifier, challenge }
    }

    pub fn method(&self) -> &'static str {
        "S256"
    }
}

/// BASE64URL(SHA256(verifier)) without padding
pub fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Opaque value round-tripped through the redirect to detect forged callbacks
pub fn generate_state() -> String {
    random_urlsafe(STATE_ENTROPY_BYTES)
}

fn random_urlsafe(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
