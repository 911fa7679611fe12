//! HMAC-SHA256 request signing.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signs private requests with the API secret.
///
/// The signing string is `domain + path + body` (body left out when there is
/// none). The HMAC key is the base64 encoding of the secret, and the digest is
/// returned base64 encoded.
#[derive(Clone)]
pub struct RequestSigner {
    key: SecretString,
}

impl RequestSigner {
    pub fn new(api_secret: &SecretString) -> Self {
        let key = STANDARD.encode(api_secret.expose_secret().as_bytes());
        Self {
            key: SecretString::from(key),
        }
    }

    pub fn sign(&self, domain: &str, path: &str, body: Option<&str>) -> String {
        // HMAC accepts keys of any length.
        let mut mac = HmacSha256::new_from_slice(self.key.expose_secret().as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(domain.as_bytes());
        mac.update(path.as_bytes());
        if let Some(body) = body {
            mac.update(body.as_bytes());
        }
        STANDARD.encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner").finish_non_exhaustive()
    }
}
