//! Non-fatal findings collected during a decode.

use std::fmt;
use tracing::warn;
use uuid::Uuid;

/// An integrity warning. Never aborts the decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// An element the decoder does not know was skipped.
    SkippedElement { element: String, parent: String },
    /// A group was referenced but never defined.
    UnresolvedGroupReference { uuid: Uuid },
    /// An entry was referenced but never defined.
    UnresolvedEntryReference { uuid: Uuid },
    /// A pool binary that no entry refers to.
    UnusedBinary { id: String },
    /// An entry refers to a pool id that does not exist.
    UnmappedBinary { id: String },
    /// A pool id was declared twice; the later bytes were kept.
    OverwrittenBinary { id: String },
    /// A group icon number beyond the built-in range.
    IconIdClamped { icon_id: i32, clamped_to: u32 },
    /// `HistoryMaxItems` or `HistoryMaxSize` below -1.
    InvalidHistoryLimit { field: &'static str, value: i32 },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::SkippedElement { element, parent } => {
                write!(f, "skipped unknown element <{}> in <{}>", element, parent)
            }
            Diagnostic::UnresolvedGroupReference { uuid } => {
                write!(f, "reference to undefined group {}", uuid)
            }
            Diagnostic::UnresolvedEntryReference { uuid } => {
                write!(f, "reference to undefined entry {}", uuid)
            }
            Diagnostic::UnusedBinary { id } => write!(f, "binary {} is not used by any entry", id),
            Diagnostic::UnmappedBinary { id } => write!(f, "entry refers to missing binary {}", id),
            Diagnostic::OverwrittenBinary { id } => write!(f, "binary {} was declared twice", id),
            Diagnostic::IconIdClamped { icon_id, clamped_to } => {
                write!(f, "icon id {} clamped to {}", icon_id, clamped_to)
            }
            Diagnostic::InvalidHistoryLimit { field, value } => {
                write!(f, "ignored invalid {} value {}", field, value)
            }
        }
    }
}

/// Ordered list of diagnostics from one decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and log it.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        warn!(diagnostic = %diagnostic, "vault decode warning");
        self.items.push(diagnostic);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_order() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::UnusedBinary { id: "1".into() });
        diagnostics.push(Diagnostic::UnmappedBinary { id: "2".into() });

        assert_eq!(diagnostics.len(), 2);
        let ids: Vec<_> = diagnostics.iter().map(|d| d.to_string()).collect();
        assert_eq!(
            ids,
            vec![
                "binary 1 is not used by any entry",
                "entry refers to missing binary 2"
            ]
        );
    }
}
