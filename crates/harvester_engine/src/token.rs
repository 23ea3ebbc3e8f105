use std::fmt;

use sha2::{Digest, Sha256};

/// Opaque bearer credential for the listings API.
///
/// `Debug` prints only a fingerprint so tokens never reach the logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 hex chars of the SHA-256 of the token.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        let mut hex = String::with_capacity(8);
        for byte in digest.iter().take(4) {
            use std::fmt::Write;
            let _ = write!(&mut hex, "{byte:02x}");
        }
        hex
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.fingerprint())
    }
}

/// Source of fresh tokens. Every call is an independent attempt and must not
/// leak whatever resource it used to obtain the token.
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    async fn acquire(&self) -> Option<Token>;
}
