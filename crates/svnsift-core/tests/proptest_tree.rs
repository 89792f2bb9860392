use proptest::prelude::*;
use svnsift_core::history::{Action, Event, EventArena, PathTree};

const PATHS: [&str; 3] = ["trunk", "trunk/a", "branches"];

/// One event per revision, starting at revision 1.
fn arb_history() -> impl Strategy<Value = Vec<(usize, bool)>> {
    prop::collection::vec((0..PATHS.len(), any::<bool>()), 1..40)
}

fn build(history: &[(usize, bool)]) -> (EventArena, PathTree) {
    let mut events = EventArena::new();
    let mut tree = PathTree::new();
    for (offset, &(path_index, delete)) in history.iter().enumerate() {
        let path = tree.intern(PATHS[path_index]);
        let action = if delete { Action::Delete } else { Action::Add };
        let revision = u32::try_from(offset + 1).expect("small history");
        let id = events
            .push(Event::literal(path, action, revision, None))
            .expect("arena has room");
        tree.insert(&mut events, id);
    }
    (events, tree)
}

/// Whether `path` exists at `revision`, by replaying the history.
fn exists_naively(history: &[(usize, bool)], path_index: usize, revision: u32) -> bool {
    history
        .iter()
        .take(revision as usize)
        .filter(|(index, _)| *index == path_index)
        .last()
        .is_some_and(|(_, delete)| !delete)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn lookup_matches_replay(history in arb_history(), path_index in 0..PATHS.len()) {
        let (events, tree) = build(&history);
        let last = u32::try_from(history.len()).expect("small history");
        for revision in 0..=last {
            let found = tree.lookup_at(&events, PATHS[path_index], revision, false);
            prop_assert_eq!(found.is_some(), exists_naively(&history, path_index, revision));
            if let Some(id) = found {
                let event = events.get(id);
                prop_assert!(event.revision <= revision);
                prop_assert_eq!(&*event.path, PATHS[path_index]);
            }
        }
    }

    #[test]
    fn history_is_ordered_by_revision(history in arb_history()) {
        let (events, tree) = build(&history);
        let mut total = 0;
        for (_, ids) in tree.walk() {
            total += ids.len();
            let ordered = ids.windows(2).all(|pair| {
                events.get(pair[0]).revision < events.get(pair[1]).revision
            });
            prop_assert!(ordered);
        }
        prop_assert_eq!(total, history.len());
    }
}
