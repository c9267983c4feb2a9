use std::collections::HashMap;

use bincode::{Decode, Encode, config};
use snafu::{ResultExt, Snafu, ensure};
use tracing::debug;

use super::arena::{Entry, EntryId, EntryKind, MAX_CHILDREN, MAX_ENTRIES, Tree};

/// One persisted entry. Parent and child references are positions in the
/// record vector, never in-memory handles, so a snapshot written by one
/// process reconstructs identically in another.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
struct EntryRecord {
    name: String,
    kind: EntryKind,
    content: Vec<u8>,
    parent: Option<u32>,
    children: Vec<u32>,
}

/// Whole-tree snapshot. Record 0 is always the root.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
struct Snapshot {
    entries: Vec<EntryRecord>,
}

/// Serializes the whole tree into a flat record area.
///
/// Entries are compacted in breadth-first order starting at the root, so
/// arena slot numbers (and freed-slot gaps) never leak into the encoding.
pub fn save(tree: &Tree) -> Result<Vec<u8>, SnapshotError> {
    let mut order = Vec::with_capacity(tree.entry_count());
    let mut positions = HashMap::with_capacity(tree.entry_count());
    order.push(tree.root());
    positions.insert(tree.root(), 0u32);

    let mut next = 0;
    while next < order.len() {
        let id = order[next];
        next += 1;
        for &child in tree.children(id) {
            positions.insert(child, order.len() as u32);
            order.push(child);
        }
    }

    let entries = order
        .iter()
        .map(|&id| EntryRecord {
            name: tree.name(id).to_string(),
            kind: tree.kind(id),
            content: tree.content(id).to_vec(),
            parent: tree.parent(id).map(|parent| positions[&parent]),
            children: tree.children(id).iter().map(|child| positions[child]).collect(),
        })
        .collect();

    debug!("Encoding snapshot of {} entries", order.len());
    bincode::encode_to_vec(Snapshot { entries }, config::standard()).context(EncodeSnafu)
}

/// Reconstructs a tree from a record area produced by [`save`].
///
/// The records are validated in full before any linking happens; truncated,
/// undecodable, or structurally inconsistent input is rejected rather than
/// turned into a half-formed tree.
pub fn load(bytes: &[u8]) -> Result<Tree, SnapshotError> {
    let (snapshot, _): (Snapshot, usize) =
        bincode::decode_from_slice(bytes, config::standard()).context(DecodeSnafu)?;
    validate(&snapshot)?;

    let slots = snapshot
        .entries
        .into_iter()
        .map(|record| Entry {
            name: record.name,
            kind: record.kind,
            content: record.content,
            parent: record.parent.map(EntryId::from_index),
            children: record.children.into_iter().map(EntryId::from_index).collect(),
        })
        .collect();
    Ok(Tree::from_slots(slots))
}

fn validate(snapshot: &Snapshot) -> Result<(), SnapshotError> {
    let entries = &snapshot.entries;
    ensure!(
        !entries.is_empty(),
        CorruptSnafu {
            reason: "record area is empty",
        }
    );
    ensure!(
        entries.len() <= MAX_ENTRIES,
        TooManyEntriesSnafu {
            count: entries.len(),
        }
    );
    ensure!(
        entries[0].parent.is_none() && entries[0].kind == EntryKind::Directory,
        CorruptSnafu {
            reason: "record 0 is not a parentless directory",
        }
    );

    for (position, record) in entries.iter().enumerate() {
        if position > 0 {
            let parent = record.parent.ok_or_else(|| SnapshotError::Corrupt {
                reason: format!("record {position} is a second root"),
            })?;
            let parent_record =
                entries
                    .get(parent as usize)
                    .ok_or_else(|| SnapshotError::Corrupt {
                        reason: format!("record {position} points at missing parent {parent}"),
                    })?;
            ensure!(
                parent_record.kind == EntryKind::Directory,
                CorruptSnafu {
                    reason: format!("record {position} is parented under a file"),
                }
            );
            let listed = parent_record
                .children
                .iter()
                .filter(|&&child| child as usize == position)
                .count();
            ensure!(
                listed == 1,
                CorruptSnafu {
                    reason: format!(
                        "record {position} appears {listed} times in its parent's child list"
                    ),
                }
            );
        }

        ensure!(
            record.children.len() <= MAX_CHILDREN,
            CorruptSnafu {
                reason: format!("record {position} exceeds the child limit"),
            }
        );
        ensure!(
            record.kind == EntryKind::Directory || record.children.is_empty(),
            CorruptSnafu {
                reason: format!("file record {position} has children"),
            }
        );
        ensure!(
            record.kind == EntryKind::File || record.content.is_empty(),
            CorruptSnafu {
                reason: format!("directory record {position} has content"),
            }
        );

        for &child in &record.children {
            let child_record =
                entries
                    .get(child as usize)
                    .ok_or_else(|| SnapshotError::Corrupt {
                        reason: format!("record {position} lists missing child {child}"),
                    })?;
            ensure!(
                child_record.parent == Some(position as u32),
                CorruptSnafu {
                    reason: format!("record {child} does not point back at parent {position}"),
                }
            );
        }
    }

    // Reciprocal links above still admit parent/child cycles detached from
    // the root, so walk from record 0 and require full coverage.
    let mut seen = vec![false; entries.len()];
    let mut stack = vec![0usize];
    seen[0] = true;
    let mut reached = 1;
    while let Some(position) = stack.pop() {
        for &child in &entries[position].children {
            if !seen[child as usize] {
                seen[child as usize] = true;
                reached += 1;
                stack.push(child as usize);
            }
        }
    }
    ensure!(
        reached == entries.len(),
        CorruptSnafu {
            reason: format!("{} entries unreachable from the root", entries.len() - reached),
        }
    );

    Ok(())
}

#[derive(Debug, Snafu)]
pub enum SnapshotError {
    #[snafu(display("Failed to encode the snapshot"))]
    Encode { source: bincode::error::EncodeError },
    #[snafu(display("Snapshot is corrupt: undecodable record area"))]
    Decode { source: bincode::error::DecodeError },
    #[snafu(display("Snapshot is corrupt: {reason}"))]
    Corrupt { reason: String },
    #[snafu(display("Snapshot holds {count} entries, more than the {max} supported", max = MAX_ENTRIES))]
    TooManyEntries { count: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_same_shape(left: &Tree, right: &Tree) {
        assert_eq!(left.entry_count(), right.entry_count());
        assert_same_subtree(left, left.root(), right, right.root());
    }

    fn assert_same_subtree(left: &Tree, a: EntryId, right: &Tree, b: EntryId) {
        assert_eq!(left.name(a), right.name(b));
        assert_eq!(left.kind(a), right.kind(b));
        assert_eq!(left.content(a), right.content(b));
        assert_eq!(left.children(a).len(), right.children(b).len());
        for (&ca, &cb) in left.children(a).iter().zip(right.children(b)) {
            assert_same_subtree(left, ca, right, cb);
        }
    }

    fn sample_tree() -> Tree {
        let mut tree = Tree::new();
        let root = tree.root();
        let docs = tree.create_directory(root, "docs").unwrap();
        let nested = tree.create_directory(docs, "nested").unwrap();
        tree.create_file(docs, "readme", b"hello").unwrap();
        tree.create_file(nested, "deep", b"payload").unwrap();
        tree.create_file(root, "top", b"").unwrap();
        tree
    }

    fn record(
        name: &str,
        kind: EntryKind,
        content: &[u8],
        parent: Option<u32>,
        children: &[u32],
    ) -> EntryRecord {
        EntryRecord {
            name: name.to_string(),
            kind,
            content: content.to_vec(),
            parent,
            children: children.to_vec(),
        }
    }

    fn encode(entries: Vec<EntryRecord>) -> Vec<u8> {
        bincode::encode_to_vec(Snapshot { entries }, config::standard()).unwrap()
    }

    #[test]
    fn round_trip_preserves_names_kinds_contents_and_topology() {
        let tree = sample_tree();
        let bytes = save(&tree).unwrap();
        let loaded = load(&bytes).unwrap();
        assert_same_shape(&tree, &loaded);
    }

    #[test]
    fn round_trip_compacts_freed_arena_slots() {
        let mut tree = sample_tree();
        let root = tree.root();
        let docs = tree.find_child(root, "docs").unwrap();
        tree.clear_subtree(docs);
        tree.create_file(docs, "fresh", b"after gaps").unwrap();

        let loaded = load(&save(&tree).unwrap()).unwrap();
        assert_same_shape(&tree, &loaded);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(load(&[]), Err(SnapshotError::Decode { .. })));
    }

    #[test]
    fn garbage_input_is_rejected_without_panic() {
        let garbage = vec![0xff; 64];
        assert!(load(&garbage).is_err());
    }

    #[test]
    fn truncated_record_area_is_rejected() {
        let bytes = save(&sample_tree()).unwrap();
        let truncated = &bytes[..bytes.len() / 2];
        assert!(load(truncated).is_err());
    }

    #[test]
    fn root_must_be_a_parentless_directory() {
        let bytes = encode(vec![record("", EntryKind::File, b"", None, &[])]);
        assert!(matches!(load(&bytes), Err(SnapshotError::Corrupt { .. })));

        let bytes = encode(vec![
            record("", EntryKind::Directory, b"", Some(1), &[1]),
            record("x", EntryKind::Directory, b"", Some(0), &[0]),
        ]);
        assert!(matches!(load(&bytes), Err(SnapshotError::Corrupt { .. })));
    }

    #[test]
    fn second_parentless_record_is_rejected() {
        let bytes = encode(vec![
            record("", EntryKind::Directory, b"", None, &[]),
            record("stray", EntryKind::Directory, b"", None, &[]),
        ]);
        assert!(matches!(load(&bytes), Err(SnapshotError::Corrupt { .. })));
    }

    #[test]
    fn dangling_parent_index_is_rejected() {
        let bytes = encode(vec![
            record("", EntryKind::Directory, b"", None, &[1]),
            record("x", EntryKind::Directory, b"", Some(9), &[]),
        ]);
        assert!(matches!(load(&bytes), Err(SnapshotError::Corrupt { .. })));
    }

    #[test]
    fn dangling_child_index_is_rejected() {
        let bytes = encode(vec![record("", EntryKind::Directory, b"", None, &[7])]);
        assert!(matches!(load(&bytes), Err(SnapshotError::Corrupt { .. })));
    }

    #[test]
    fn non_reciprocal_parent_link_is_rejected() {
        // Record 2's parent claims record 1, but only record 1 lists it.
        let bytes = encode(vec![
            record("", EntryKind::Directory, b"", None, &[1, 2]),
            record("a", EntryKind::Directory, b"", Some(0), &[]),
            record("b", EntryKind::Directory, b"", Some(1), &[]),
        ]);
        assert!(matches!(load(&bytes), Err(SnapshotError::Corrupt { .. })));
    }

    #[test]
    fn duplicate_child_listing_is_rejected() {
        let bytes = encode(vec![
            record("", EntryKind::Directory, b"", None, &[1, 1]),
            record("a", EntryKind::Directory, b"", Some(0), &[]),
        ]);
        assert!(matches!(load(&bytes), Err(SnapshotError::Corrupt { .. })));
    }

    #[test]
    fn file_with_children_is_rejected() {
        let bytes = encode(vec![
            record("", EntryKind::Directory, b"", None, &[1]),
            record("f", EntryKind::File, b"", Some(0), &[0]),
        ]);
        assert!(matches!(load(&bytes), Err(SnapshotError::Corrupt { .. })));
    }

    #[test]
    fn detached_reciprocal_cycle_is_rejected() {
        let bytes = encode(vec![
            record("", EntryKind::Directory, b"", None, &[]),
            record("a", EntryKind::Directory, b"", Some(2), &[2]),
            record("b", EntryKind::Directory, b"", Some(1), &[1]),
        ]);
        assert!(matches!(load(&bytes), Err(SnapshotError::Corrupt { .. })));
    }

    #[test]
    fn oversized_record_area_is_rejected() {
        let mut entries = vec![record("", EntryKind::Directory, b"", None, &[])];
        // Chain directories so every record has a valid parent.
        for i in 1..=MAX_ENTRIES as u32 {
            entries[(i - 1) as usize].children = vec![i];
            entries.push(record(&format!("d{i}"), EntryKind::Directory, b"", Some(i - 1), &[]));
        }
        let bytes = encode(entries);
        assert!(matches!(
            load(&bytes),
            Err(SnapshotError::TooManyEntries { .. })
        ));
    }

    #[test]
    fn single_root_snapshot_round_trips() {
        let tree = Tree::new();
        let loaded = load(&save(&tree).unwrap()).unwrap();
        assert_eq!(loaded.entry_count(), 1);
        assert_eq!(loaded.kind(loaded.root()), EntryKind::Directory);
    }
}
