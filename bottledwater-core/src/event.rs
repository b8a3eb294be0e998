//! Change events delivered by the change-capture subsystem.

use crate::{Relation, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// WAL POSITION
// ============================================================================

/// Position of a change in the source's write-ahead log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalPosition(pub u64);

impl WalPosition {
    pub fn high(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn low(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }
}

impl fmt::Display for WalPosition {
    /// Two uppercase hexadecimal 32-bit halves joined by `/`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}/{:X}", self.high(), self.low())
    }
}

// ============================================================================
// CHANGE KIND
// ============================================================================

/// The action a change event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Begin,
    Commit,
    Insert,
    Update,
    Delete,
    /// An action code the encoders do not know.
    Unknown(i32),
}

impl ChangeKind {
    /// Map a raw decoder action code. Codes follow the reorder-buffer numbering
    /// for row changes; transaction framing uses dedicated codes.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ChangeKind::Insert,
            1 => ChangeKind::Update,
            2 => ChangeKind::Delete,
            -1 => ChangeKind::Begin,
            -2 => ChangeKind::Commit,
            other => ChangeKind::Unknown(other),
        }
    }

    /// The `command` field value, when the kind is known.
    pub fn command(self) -> Option<&'static str> {
        match self {
            ChangeKind::Begin => Some("BEGIN"),
            ChangeKind::Commit => Some("COMMIT"),
            ChangeKind::Insert => Some("INSERT"),
            ChangeKind::Update => Some("UPDATE"),
            ChangeKind::Delete => Some("DELETE"),
            ChangeKind::Unknown(_) => None,
        }
    }

    pub fn is_row_change(self) -> bool {
        matches!(
            self,
            ChangeKind::Insert | ChangeKind::Update | ChangeKind::Delete
        )
    }
}

// ============================================================================
// CHANGE EVENT
// ============================================================================

/// Transaction identifier.
pub type Xid = u32;

/// One notification from the change-capture subsystem.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub xid: Xid,
    pub wal_pos: Option<WalPosition>,
    pub relation: Option<Arc<Relation>>,
    pub new_row: Option<Row>,
    pub old_row: Option<Row>,
}

impl ChangeEvent {
    pub fn begin(xid: Xid) -> Self {
        Self::framing(ChangeKind::Begin, xid, None)
    }

    pub fn commit(xid: Xid, wal_pos: Option<WalPosition>) -> Self {
        Self::framing(ChangeKind::Commit, xid, wal_pos)
    }

    fn framing(kind: ChangeKind, xid: Xid, wal_pos: Option<WalPosition>) -> Self {
        Self {
            kind,
            xid,
            wal_pos,
            relation: None,
            new_row: None,
            old_row: None,
        }
    }

    pub fn insert(xid: Xid, relation: Arc<Relation>, new_row: Row) -> Self {
        Self::change(ChangeKind::Insert, xid, relation, Some(new_row), None)
    }

    pub fn update(xid: Xid, relation: Arc<Relation>, new_row: Row, old_row: Option<Row>) -> Self {
        Self::change(ChangeKind::Update, xid, relation, Some(new_row), old_row)
    }

    pub fn delete(xid: Xid, relation: Arc<Relation>, old_row: Option<Row>) -> Self {
        Self::change(ChangeKind::Delete, xid, relation, None, old_row)
    }

    /// A row change with every field explicit, for decoders that map raw actions.
    pub fn change(
        kind: ChangeKind,
        xid: Xid,
        relation: Arc<Relation>,
        new_row: Option<Row>,
        old_row: Option<Row>,
    ) -> Self {
        Self {
            kind,
            xid,
            wal_pos: None,
            relation: Some(relation),
            new_row,
            old_row,
        }
    }

    pub fn at(mut self, wal_pos: WalPosition) -> Self {
        self.wal_pos = Some(wal_pos);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wal_position_formats_as_hex_halves() {
        assert_eq!(WalPosition(0x1_6B37_4D48).to_string(), "1/6B374D48");
        assert_eq!(WalPosition(0).to_string(), "0/0");
        assert_eq!(WalPosition(u64::MAX).to_string(), "FFFFFFFF/FFFFFFFF");
    }

    #[test]
    fn test_kind_from_code() {
        assert_eq!(ChangeKind::from_code(0), ChangeKind::Insert);
        assert_eq!(ChangeKind::from_code(2), ChangeKind::Delete);
        assert_eq!(ChangeKind::from_code(7), ChangeKind::Unknown(7));
        assert_eq!(ChangeKind::Unknown(7).command(), None);
        assert_eq!(ChangeKind::Update.command(), Some("UPDATE"));
    }

    #[test]
    fn test_framing_events_have_no_relation() {
        let ev = ChangeEvent::commit(9, Some(WalPosition(16)));
        assert!(ev.relation.is_none());
        assert!(ev.new_row.is_none());
        assert_eq!(ev.wal_pos, Some(WalPosition(16)));
    }
}
