//! Repository session lifecycle.

use std::fmt;

/// Lifecycle of a [`RepositorySession`](super::RepositorySession).
///
/// `Cloned → Fetched* → BranchSwitched ⇄ BranchSwitched → Committed* → Pushed → Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Cloned,
    Fetched,
    BranchSwitched,
    Committed,
    Pushed,
    Closed,
}

impl SessionState {
    /// Whether the session may move from `self` to `next`.
    pub fn can_transition(self, next: SessionState) -> bool {
        use SessionState::*;

        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Cloned | Fetched, Fetched) => true,
            (Cloned | Fetched | BranchSwitched | Committed, BranchSwitched) => true,
            (BranchSwitched | Committed, Committed) => true,
            (BranchSwitched | Committed, Pushed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Cloned => "cloned",
            SessionState::Fetched => "fetched",
            SessionState::BranchSwitched => "branch_switched",
            SessionState::Committed => "committed",
            SessionState::Pushed => "pushed",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::SessionState::*;

    #[test]
    fn fetch_only_before_switching() {
        assert!(Cloned.can_transition(Fetched));
        assert!(Fetched.can_transition(Fetched));
        assert!(!BranchSwitched.can_transition(Fetched));
    }

    #[test]
    fn switches_interleave_with_commits() {
        assert!(Cloned.can_transition(BranchSwitched));
        assert!(BranchSwitched.can_transition(BranchSwitched));
        assert!(BranchSwitched.can_transition(Committed));
        assert!(Committed.can_transition(BranchSwitched));
        assert!(Committed.can_transition(Committed));
    }

    #[test]
    fn commit_requires_a_branch() {
        assert!(!Cloned.can_transition(Committed));
        assert!(!Fetched.can_transition(Committed));
    }

    #[test]
    fn push_is_terminal_except_for_close() {
        assert!(Committed.can_transition(Pushed));
        assert!(BranchSwitched.can_transition(Pushed));
        assert!(!Pushed.can_transition(Committed));
        assert!(!Pushed.can_transition(BranchSwitched));
        assert!(Pushed.can_transition(Closed));
    }

    #[test]
    fn closed_is_final() {
        assert!(Cloned.can_transition(Closed));
        assert!(!Closed.can_transition(Closed));
        assert!(!Closed.can_transition(Fetched));
    }
}
