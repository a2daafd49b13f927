use crate::error::SyncError;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

pub const IDENTITY_WIDTH: usize = 14;
pub const MAX_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Photo,
    Album,
}

impl Namespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Photo => "photo",
            Namespace::Album => "album",
        }
    }
}

fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Time-based 14 digit identities: epoch seconds followed by random digits.
pub struct IdentityEngine {
    rng: StdRng,
    clock: fn() -> u64,
    issued: HashMap<Namespace, HashSet<String>>,
}

impl Default for IdentityEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityEngine {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            clock: epoch_seconds,
            issued: HashMap::new(),
        }
    }

    pub fn with_seed(seed: u64, clock: fn() -> u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            clock,
            issued: HashMap::new(),
        }
    }

    /// Raw token, not checked against anything. Tokens look the same in every
    /// namespace; uniqueness per namespace is enforced by `get_unique`.
    pub fn generate(&mut self) -> String {
        let mut token = (self.clock)().to_string();
        if token.len() >= IDENTITY_WIDTH {
            token.truncate(IDENTITY_WIDTH);
            return token;
        }
        let missing = IDENTITY_WIDTH - token.len();
        token.push_str(&self.filler(missing));
        token
    }

    /// Trailing digits of random fractions, `width` characters long.
    fn filler(&mut self, width: usize) -> String {
        let mut digits = String::new();
        while digits.len() < width {
            let r: f64 = self.rng.gen();
            let formatted = format!("{:.16}", r);
            digits.push_str(formatted.split('.').nth(1).unwrap_or("0"));
        }
        digits.split_off(digits.len() - width)
    }

    /// Draws tokens until one is neither issued earlier in this run nor
    /// reported by `exists`. Gives up after `MAX_ATTEMPTS` collisions.
    pub fn get_unique<F>(&mut self, namespace: Namespace, mut exists: F) -> Result<String, SyncError>
    where
        F: FnMut(&str) -> Result<bool, SyncError>,
    {
        for attempt in 1..=MAX_ATTEMPTS {
            let token = self.generate();
            let seen = self
                .issued
                .get(&namespace)
                .map(|set| set.contains(&token))
                .unwrap_or(false);
            if !seen && !exists(&token)? {
                self.issued
                    .entry(namespace)
                    .or_default()
                    .insert(token.clone());
                return Ok(token);
            }
            debug!(
                "{} identity {} collided (attempt {}/{})",
                namespace.as_str(),
                token,
                attempt,
                MAX_ATTEMPTS
            );
        }
        Err(SyncError::IdentityExhausted {
            namespace: namespace.as_str(),
            attempts: MAX_ATTEMPTS,
        })
    }

    pub fn is_issued(&self, namespace: Namespace, token: &str) -> bool {
        self.issued
            .get(&namespace)
            .map(|set| set.contains(token))
            .unwrap_or(false)
    }
}
