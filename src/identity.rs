//! Identity and content equality for list entries.
//!
//! The diff engine pairs old and new entries by identity only. Content
//! equality decides whether a paired entry needs an `Update`. Identity must be
//! an equivalence relation over one snapshot; the engine's output is only
//! guaranteed minimal when it is.
use crate::types::{GameRecord, TitleId};
use std::fmt::Debug;
use std::hash::Hash;

pub trait Reconcilable: Clone {
    type Key: Eq + Hash + Clone + Debug;

    fn identity_key(&self) -> Self::Key;

    fn same_content(&self, other: &Self) -> bool;
}

pub fn same_identity<T: Reconcilable>(a: &T, b: &T) -> bool {
    a.identity_key() == b.identity_key()
}

pub fn same_content<T: Reconcilable>(a: &T, b: &T) -> bool {
    a.same_content(b)
}

impl Reconcilable for GameRecord {
    type Key = TitleId;

    fn identity_key(&self) -> TitleId {
        self.title_id
    }

    fn same_content(&self, other: &Self) -> bool {
        self == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_ignores_content() {
        let a = GameRecord::new(7, "Old title", "/roms/a.3ds");
        let b = GameRecord::new(7, "New title", "/roms/a.3ds");
        assert!(same_identity(&a, &b));
        assert!(!same_content(&a, &b));
    }

    #[test]
    fn content_covers_every_attribute() {
        let a = GameRecord::new(7, "Title", "/roms/a.3ds");
        assert!(same_content(&a, &a.clone()));
        assert!(!same_content(&a, &a.clone().resident()));
        assert!(!same_content(&a, &a.clone().with_regions("JPN")));
        assert!(!same_content(&a, &a.clone().with_publisher("Nintendo")));
    }

    #[test]
    fn unknown_titles_share_one_identity() {
        let a = GameRecord::new(0, "", "/roms/a.3ds");
        let b = GameRecord::new(0, "", "/roms/b.3ds");
        assert!(same_identity(&a, &b));
    }
}
