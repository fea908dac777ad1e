use crate::error::PromiseIdError;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Caps how deeply a `.then()` chain may nest before `child()` refuses to
/// allocate further. Purely a debug/diagnostic guard rail — nothing in the
/// state machine itself depends on this number.
pub const MAX_CHAIN_DEPTH: usize = 64;

static NEXT_ROOT: AtomicU64 = AtomicU64::new(1);

/// Identifies a promise's position within its promise tree using Dewey
/// notation: a root id plus the sequence of child indices taken to reach
/// this node.
///
/// Display: `"p7.0.2"` (root id, dot-separated path). Used only for
/// diagnostics (tracing spans, `Debug` output) — it is not part of the
/// state machine's correctness argument.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PromiseId {
    root: u64,
    path: Vec<u32>,
}

impl PromiseId {
    /// Allocate a fresh root-level id (empty path).
    ///
    /// Root ids are drawn from a process-wide atomic counter: there is no
    /// need for a content-addressed, cross-process-stable identity here,
    /// since a promise never outlives the process it was created in.
    pub fn new_root() -> Self {
        Self {
            root: NEXT_ROOT.fetch_add(1, Ordering::Relaxed),
            path: Vec::new(),
        }
    }

    /// Create a child id by appending `seq` — the index of this child
    /// among its siblings — to the path.
    ///
    /// Returns `Err` if the path already has [`MAX_CHAIN_DEPTH`] segments.
    pub fn child(&self, seq: u32) -> Result<Self, PromiseIdError> {
        if self.path.len() >= MAX_CHAIN_DEPTH {
            return Err(PromiseIdError::MaxChainDepthExceeded {
                max: MAX_CHAIN_DEPTH,
            });
        }
        let mut path = self.path.clone();
        path.push(seq);
        Ok(Self {
            root: self.root,
            path,
        })
    }

    /// Whether this is a root-level id (depth 0).
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Depth in the promise tree (0 for root).
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// The root id shared by every node in this promise tree.
    pub fn root(&self) -> u64 {
        self.root
    }

    /// The path segments (child index at each depth).
    pub fn path(&self) -> &[u32] {
        &self.path
    }
}

impl fmt::Display for PromiseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.root)?;
        for seg in &self.path {
            write!(f, ".{}", seg)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_ids_are_distinct() {
        let a = PromiseId::new_root();
        let b = PromiseId::new_root();
        assert_ne!(a, b);
        assert!(a.is_root());
        assert_eq!(a.depth(), 0);
    }

    #[test]
    fn child_extends_path_and_display() {
        let root = PromiseId::new_root();
        let child = root.child(0).unwrap();
        let grandchild = child.child(3).unwrap();
        assert_eq!(grandchild.depth(), 2);
        assert_eq!(grandchild.path(), &[0, 3]);
        assert_eq!(format!("{grandchild}"), format!("p{}.0.3", root.root()));
    }

    #[test]
    fn child_refuses_past_max_depth() {
        let mut id = PromiseId::new_root();
        for i in 0..MAX_CHAIN_DEPTH as u32 {
            id = id.child(i).unwrap();
        }
        assert!(matches!(
            id.child(0),
            Err(PromiseIdError::MaxChainDepthExceeded { max }) if max == MAX_CHAIN_DEPTH
        ));
    }
}
