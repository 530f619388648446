//! Chain-data enumerations.
//!
//! These enums provide:
//! - Safe conversion from/to numeric values
//! - Database serialization via `sqlx::Type`
//! - JSON serialization via `serde`

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT TYPE
// ═══════════════════════════════════════════════════════════════════════════════

/// Whether an output is an ordinary transaction output or a coinbase reward.
///
/// A coinbase output never carries a `merkle_proof` (see
/// [`crate::types::entities::Output`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[repr(i16)]
#[sqlx(type_name = "smallint")]
#[non_exhaustive]
pub enum OutputType {
    /// An ordinary transaction output.
    Transaction = 0,
    /// A coinbase reward output.
    Coinbase = 1,
}

impl OutputType {
    /// Human-readable name for display/logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Transaction => "Transaction",
            Self::Coinbase => "Coinbase",
        }
    }
}

impl TryFrom<i16> for OutputType {
    type Error = InvalidOutputType;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Transaction),
            1 => Ok(Self::Coinbase),
            other => Err(InvalidOutputType(other)),
        }
    }
}

/// Error returned when an output-type value is outside the known range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid output type value: {0}")]
pub struct InvalidOutputType(pub i16);

// ═══════════════════════════════════════════════════════════════════════════════
// KERNEL FEATURES
// ═══════════════════════════════════════════════════════════════════════════════

/// Kernel feature flags, mirroring the node's own kernel-features tag.
///
/// Carried opaquely: this system never validates signatures or economics
/// (see Non-goals), so the only requirement is round-tripping the node's
/// reported value faithfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[repr(i16)]
#[sqlx(type_name = "smallint")]
#[non_exhaustive]
pub enum KernelFeatures {
    /// Plain transaction kernel, no lock height or fee shift.
    Plain = 0,
    /// Coinbase kernel.
    Coinbase = 1,
    /// Height-locked kernel (NRD / relative time-lock family).
    HeightLocked = 2,
    /// No-recent-duplicate kernel.
    NoRecentDuplicate = 3,
}

impl TryFrom<i16> for KernelFeatures {
    type Error = InvalidKernelFeatures;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Plain),
            1 => Ok(Self::Coinbase),
            2 => Ok(Self::HeightLocked),
            3 => Ok(Self::NoRecentDuplicate),
            other => Err(InvalidKernelFeatures(other)),
        }
    }
}

/// Error returned when a kernel-features value is outside the known range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid kernel features value: {0}")]
pub struct InvalidKernelFeatures(pub i16);

// ═══════════════════════════════════════════════════════════════════════════════
// INGESTION TASK KIND / STATUS
// ═══════════════════════════════════════════════════════════════════════════════

/// What an [`crate::types::entities::IngestionTask`] is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[repr(i16)]
#[sqlx(type_name = "smallint")]
#[non_exhaustive]
pub enum TaskKind {
    /// Backfilling a blockchain's missing height range.
    Bootstrap = 0,
    /// Tearing down a blockchain and all its descendants.
    BlockchainDelete = 1,
}

/// Lifecycle status of an [`crate::types::entities::IngestionTask`].
///
/// `InProgress` is the only non-terminal state; every terminal state is
/// reached at most once. See the module-level docs on
/// [`crate::indexer::supervisor`] for the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[repr(i16)]
#[sqlx(type_name = "smallint")]
#[non_exhaustive]
pub enum TaskStatus {
    /// Currently running.
    InProgress = 0,
    /// Completed successfully.
    Success = 1,
    /// Completed unsuccessfully; see the task's `failure_reason`.
    Failure = 2,
    /// Skipped without running (e.g., nothing to do).
    Skipped = 3,
}

impl TaskStatus {
    /// Whether this status is terminal (the task will not transition again).
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}
