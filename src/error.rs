//! Error type shared by every pipeline step.
//!
//! Recording misuse ([`Error::DuplicateTag`], [`Error::UnclosedSeed`],
//! [`Error::ForeignActive`]) is a
//! programmer error; callers are expected to propagate it and abort.
//! [`Error::TraceMismatch`] marks a stale or wrongly reused trace.
//! [`Error::CoverInfeasible`] may be retried by the caller with another
//! ordering or policy. Nothing in the crate retries on its own.

use std::fmt;

use thiserror::Error;

use crate::store::Tag;

/// Which arity of a trace a [`Error::TraceMismatch`] refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    /// Number of seeded inputs.
    Inputs,
    /// Number of extracted outputs.
    Outputs,
    /// Length of an output-seed (adjoint) vector.
    Seeds,
    /// Length of a tangent direction.
    Direction,
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Arity::Inputs => "inputs",
            Arity::Outputs => "outputs",
            Arity::Seeds => "seed entries",
            Arity::Direction => "direction entries",
        };
        f.write_str(s)
    }
}

/// Errors produced while recording, sweeping, assembling or compressing.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// `begin_recording` was called on a tag whose recording is still open.
    #[error("tag {tag} is already being recorded")]
    DuplicateTag { tag: Tag },

    /// An active value of another open recording was combined with or
    /// extracted into this one. The trace is discarded on `end`.
    #[error("recording {tag} used an active value from another recording")]
    ForeignActive { tag: Tag },

    /// A recording was ended with seeded inputs but no extracted output.
    #[error("recording {tag} closed with {seeded} seeded inputs and no extracted output")]
    UnclosedSeed { tag: Tag, seeded: usize },

    /// Replay arity differs from what was recorded.
    #[error("trace {tag} expects {expected} {what}, got {found}")]
    TraceMismatch {
        tag: Tag,
        what: Arity,
        expected: usize,
        found: usize,
    },

    /// Nothing is recorded under the tag.
    #[error("no trace recorded under tag {tag}")]
    UnknownTag { tag: Tag },

    /// No vertex cover satisfies the requested ordering or color budget.
    #[error("no valid vertex cover: {reason}")]
    CoverInfeasible { reason: String },

    /// A row was pushed into a compressed-row builder out of sequence.
    #[error("row {row} inserted out of order, next row is {expected}")]
    RowOutOfOrder { row: usize, expected: usize },

    /// Problem arrays disagree with the declared layout.
    #[error("invalid layout: {0}")]
    Layout(String),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
