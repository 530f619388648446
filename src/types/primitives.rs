//! Validated primitive types for domain entities.
//!
//! These newtypes provide:
//! - Type safety (can't accidentally pass a commitment as a block hash)
//! - Validation at construction time
//! - Domain semantics in function signatures

use std::fmt;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK HASH (64 hex chars)
// ═══════════════════════════════════════════════════════════════════════════════

/// A 32-byte block hash, rendered as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlockHash([u8; 32]);

impl BlockHash {
    /// Create from a fixed-size array (infallible).
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse from a hex string (with or without `0x` prefix).
    ///
    /// # Errors
    /// Returns [`InvalidHash`] if the string is not 64 hex characters.
    pub fn from_hex(s: &str) -> Result<Self, InvalidHash> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 64 {
            return Err(InvalidHash::WrongLength {
                expected: 64,
                got: s.len(),
            });
        }
        let bytes = hex::decode(s).map_err(|_| InvalidHash::InvalidHex)?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| InvalidHash::WrongLength { expected: 32, got: 0 })?;
        Ok(Self(array))
    }

    /// Render as lowercase hex, no prefix (the wire/storage form).
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Get the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", self.to_hex())
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<BlockHash> for String {
    fn from(hash: BlockHash) -> Self {
        hash.to_hex()
    }
}

impl TryFrom<String> for BlockHash {
    type Error = InvalidHash;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl TryFrom<&str> for BlockHash {
    type Error = InvalidHash;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::from_hex(s)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMITMENT / EXCESS (33-byte Pedersen commitment, 66 hex chars)
// ═══════════════════════════════════════════════════════════════════════════════

/// A 33-byte Pedersen commitment, rendered as 66 lowercase hex characters.
///
/// Used for output commitments, input commitments, and kernel excesses.
/// Unlike [`BlockHash`], a commitment is not globally unique — the same
/// commitment may appear in two rows when one is on the main chain and the
/// other is on a demoted branch.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Commitment(String);

impl Commitment {
    /// Parse from a hex string (with or without `0x` prefix), validating length.
    ///
    /// # Errors
    /// Returns [`InvalidHash`] if the string is not 66 hex characters.
    pub fn from_hex(s: &str) -> Result<Self, InvalidHash> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        if stripped.len() != 66 {
            return Err(InvalidHash::WrongLength {
                expected: 66,
                got: stripped.len(),
            });
        }
        hex::decode(stripped).map_err(|_| InvalidHash::InvalidHex)?;
        Ok(Self(stripped.to_lowercase()))
    }

    /// Render as lowercase hex, no prefix.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", self.0)
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Commitment> for String {
    fn from(c: Commitment) -> Self {
        c.0
    }
}

impl TryFrom<String> for Commitment {
    type Error = InvalidHash;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl TryFrom<&str> for Commitment {
    type Error = InvalidHash;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::from_hex(s)
    }
}

/// Error returned when a hash/commitment string fails validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidHash {
    /// String had the wrong number of hex characters.
    #[error("expected {expected} hex characters, got {got}")]
    WrongLength {
        /// The expected character count.
        expected: usize,
        /// The actual character count.
        got: usize,
    },
    /// String was not valid hex.
    #[error("invalid hex encoding")]
    InvalidHex,
}

// ═══════════════════════════════════════════════════════════════════════════════
// HEIGHT
// ═══════════════════════════════════════════════════════════════════════════════

/// A block height within a blockchain, genesis at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Height(pub u64);

impl Height {
    /// Create a new height.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The height one below this one, or `None` at genesis.
    #[must_use]
    pub const fn checked_prev(self) -> Option<Self> {
        if self.0 == 0 { None } else { Some(Self(self.0 - 1)) }
    }

    /// The height one above this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Height {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCKCHAIN SLUG
// ═══════════════════════════════════════════════════════════════════════════════

/// A short, URL-safe identifier for a [`crate::types::entities::Blockchain`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Wrap a raw string as a slug without validation.
    ///
    /// Callers that need validation should go through the HTTP layer's
    /// deserialization instead; this constructor exists for internal
    /// plumbing and tests.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CUCKOO SOLUTION
// ═══════════════════════════════════════════════════════════════════════════════

/// A cuckoo-cycle proof-of-work solution: exactly 42 integers.
///
/// Stored and compared as the comma-joined textual form, matching the wire
/// representation used by the node and the natural-key column in the store.
/// This system never validates the solution (see Non-goals); it is opaque
/// data used only for header deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CuckooSolution(Vec<u64>);

impl CuckooSolution {
    /// Wrap a list of nonces.
    ///
    /// # Errors
    /// Returns [`InvalidCuckooSolution`] unless there are exactly 42 entries.
    pub fn new(nonces: Vec<u64>) -> Result<Self, InvalidCuckooSolution> {
        if nonces.len() == 42 {
            Ok(Self(nonces))
        } else {
            Err(InvalidCuckooSolution(nonces.len()))
        }
    }

    /// Render as the comma-joined textual form used for storage/comparison.
    #[must_use]
    pub fn to_text(&self) -> String {
        self.0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parse the comma-joined textual form back into nonces.
    ///
    /// # Errors
    /// Returns [`InvalidCuckooSolution`] if the text does not decode to
    /// exactly 42 integers.
    pub fn from_text(text: &str) -> Result<Self, InvalidCuckooSolution> {
        let nonces: Vec<u64> = text
            .split(',')
            .map(|s| s.trim().parse::<u64>())
            .collect::<Result<_, _>>()
            .map_err(|_| InvalidCuckooSolution(0))?;
        Self::new(nonces)
    }
}

/// Error returned when a cuckoo solution does not have exactly 42 entries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cuckoo solution must have exactly 42 entries, got {0}")]
pub struct InvalidCuckooSolution(pub usize);

// ═══════════════════════════════════════════════════════════════════════════════
// LOAD PROGRESS (exact decimal, never binary float)
// ═══════════════════════════════════════════════════════════════════════════════

/// A bootstrap load-progress percentage, 0–100, stored as an exact decimal.
///
/// Archive blockchains quantize to 2 decimal places, non-archive to 0, both
/// using `ROUND_DOWN` — matching a reporting convention that must never show
/// a higher percentage than has actually been processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadProgress(BigDecimal);

impl LoadProgress {
    /// The zero-progress value.
    #[must_use]
    pub fn zero() -> Self {
        Self(BigDecimal::from(0))
    }

    /// The fully-complete value, quantized per `archive`.
    #[must_use]
    pub fn complete(archive: bool) -> Self {
        Self::from_ratio(1, 1, archive)
    }

    /// Compute `processed / total * 100`, rounded down to the appropriate
    /// number of decimal places for the node kind.
    ///
    /// # Panics
    /// Never panics; `total == 0` is treated as already complete.
    #[must_use]
    pub fn from_ratio(processed: u64, total: u64, archive: bool) -> Self {
        use bigdecimal::RoundingMode;

        if total == 0 {
            return Self::zero();
        }
        let scale = if archive { 2 } else { 0 };
        let ratio = BigDecimal::from(processed) * BigDecimal::from(100) / BigDecimal::from(total);
        Self(ratio.with_scale_round(scale, RoundingMode::Down))
    }

    /// Wrap a raw decimal value, e.g. one just read back from the store.
    #[must_use]
    pub const fn from_bigdecimal(value: BigDecimal) -> Self {
        Self(value)
    }

    /// The underlying exact decimal value.
    #[must_use]
    pub const fn as_bigdecimal(&self) -> &BigDecimal {
        &self.0
    }
}

impl fmt::Display for LoadProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_hash_round_trip() {
        let hex = "a".repeat(64);
        let hash = BlockHash::from_hex(&hex).expect("valid hash");
        assert_eq!(hash.to_hex(), hex);
    }

    #[test]
    fn block_hash_rejects_wrong_length() {
        assert!(BlockHash::from_hex("abcd").is_err());
    }

    #[test]
    fn commitment_round_trip() {
        let hex = "08".to_string() + &"b".repeat(64);
        let c = Commitment::from_hex(&hex).expect("valid commitment");
        assert_eq!(c.as_str(), hex);
    }

    #[test]
    fn cuckoo_solution_requires_42_entries() {
        assert!(CuckooSolution::new(vec![1; 41]).is_err());
        assert!(CuckooSolution::new(vec![1; 42]).is_ok());
    }

    #[test]
    fn cuckoo_solution_text_round_trip() {
        let sol = CuckooSolution::new((0..42).collect()).expect("42 entries");
        let text = sol.to_text();
        let parsed = CuckooSolution::from_text(&text).expect("round trips");
        assert_eq!(sol, parsed);
    }

    #[test]
    fn load_progress_archive_quantizes_to_two_places() {
        let p = LoadProgress::from_ratio(1, 3, true);
        assert_eq!(p.to_string(), "33.33");
    }

    #[test]
    fn load_progress_non_archive_quantizes_to_zero_places() {
        let p = LoadProgress::from_ratio(2, 3, false);
        assert_eq!(p.to_string(), "66");
    }

    #[test]
    fn load_progress_rounds_down_never_up() {
        // 99.999...% must never report as 100% while not literally complete.
        let p = LoadProgress::from_ratio(999, 1000, true);
        assert_eq!(p.to_string(), "99.90");
    }

    #[test]
    fn load_progress_zero_total_is_zero() {
        let p = LoadProgress::from_ratio(0, 0, true);
        assert_eq!(p, LoadProgress::zero());
    }
}
