//! Fixed-length opaque share tokens.

use rand::Rng;

use crate::errors::{Result, ShareError};

/// Number of characters in every token handed out by the registry.
pub const TOKEN_LENGTH: usize = 12;

/// Symbols a token is drawn from.
pub const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Upper bound on candidates tried before giving up on a free token.
pub const MAX_TOKEN_ATTEMPTS: usize = 32;

/// Produces random tokens and checks them against the tokens already in use.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenGenerator;

impl TokenGenerator {
    /// Draws a single token, uniformly over [`TOKEN_ALPHABET`].
    pub fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..TOKEN_LENGTH)
            .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
            .collect()
    }

    /// Draws tokens until `is_taken` reports one as free.
    pub fn generate_unique<F>(&self, mut is_taken: F) -> Result<String>
    where
        F: FnMut(&str) -> Result<bool>,
    {
        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let candidate = self.generate();
            if !is_taken(&candidate)? {
                return Ok(candidate);
            }
            tracing::debug!(token = %candidate, "token collision, drawing again");
        }
        Err(ShareError::TokenSpaceExhausted(MAX_TOKEN_ATTEMPTS))
    }

    /// Returns `true` if `token` has the shape this generator produces.
    pub fn is_well_formed(token: &str) -> bool {
        token.len() == TOKEN_LENGTH && token.bytes().all(|b| TOKEN_ALPHABET.contains(&b))
    }
}
