// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::error::{RegistrationError, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Characters safe to embed in a URL path segment without escaping
const ALPHABET: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";
const TOKEN_LENGTH: usize = 54;

/// Source of registration tokens
pub trait TokenIssuer: Send + Sync {
    fn issue(&self) -> Result<String>;
}

/// Issues tokens from an OS-seeded CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomTokenIssuer;

impl TokenIssuer for RandomTokenIssuer {
    fn issue(&self) -> Result<String> {
        let mut rng =
            StdRng::try_from_os_rng().map_err(|e| RegistrationError::Randomness(e.to_string()))?;

        Ok((0..TOKEN_LENGTH)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect())
    }
}
