//! Entry curation state machine.
//!
//! ```text
//!   GRAY ──confirm──▶ WHITE ──undo──▶ (destroyed)
//!     │  ▲
//! reject cancel_black / undo
//!     ▼  │
//!   BLACK
//! ```
//!
//! Every transition marks the entry dirty so index staleness is always
//! traceable to a recorded mode change. The index itself only changes on
//! the next compile.

use super::entry::{Entry, EntryMode};
use crate::error::{MatchError, Result};

/// What `undo` did to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoOutcome {
    /// A WHITE entry; the caller removes it
    Destroy,
    /// A BLACK entry moved back to GRAY
    Restored,
}

fn require(entry: &Entry, expected: EntryMode, action: &'static str) -> Result<()> {
    if entry.mode != expected {
        return Err(MatchError::InvalidTransition {
            from: entry.mode.to_string(),
            action,
        });
    }
    Ok(())
}

fn set_mode(entry: &mut Entry, mode: EntryMode, revision: u64) {
    entry.mode = mode;
    entry.dirty = true;
    entry.revision = revision;
}

/// GRAY → WHITE. Confirming an already WHITE entry is a no-op.
pub fn confirm(entry: &mut Entry, revision: u64) -> Result<()> {
    if entry.mode == EntryMode::White {
        return Ok(());
    }
    require(entry, EntryMode::Gray, "confirm")?;
    set_mode(entry, EntryMode::White, revision);
    Ok(())
}

/// GRAY → BLACK.
pub fn reject(entry: &mut Entry, revision: u64) -> Result<()> {
    require(entry, EntryMode::Gray, "reject")?;
    set_mode(entry, EntryMode::Black, revision);
    Ok(())
}

/// BLACK → GRAY.
pub fn cancel_black(entry: &mut Entry, revision: u64) -> Result<()> {
    require(entry, EntryMode::Black, "cancel_black")?;
    set_mode(entry, EntryMode::Gray, revision);
    Ok(())
}

/// Revert a curator decision: WHITE entries are destroyed, BLACK entries
/// return to GRAY.
pub fn undo(entry: &mut Entry, revision: u64) -> Result<UndoOutcome> {
    match entry.mode {
        EntryMode::White => Ok(UndoOutcome::Destroy),
        EntryMode::Black => {
            set_mode(entry, EntryMode::Gray, revision);
            Ok(UndoOutcome::Restored)
        }
        other => Err(MatchError::InvalidTransition {
            from: other.to_string(),
            action: "undo",
        }),
    }
}

/// Clear `dirty` on a WHITE entry after a compile that observed it.
///
/// Other modes keep their flag. Entries mutated after the compile captured
/// its generation stay dirty.
pub fn mark_compiled(entry: &mut Entry, compiled_generation: u64) {
    if entry.mode == EntryMode::White && entry.revision <= compiled_generation {
        entry.dirty = false;
    }
}
