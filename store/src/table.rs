//! A typed object table with a unique index, an ordered index and an
//! undo stack.
//!
//! Mutations are journaled into the deepest open undo frame: creations
//! by id, modifications and removals by first-touch pre-image. [`Table::undo`]
//! reverts the deepest frame, [`Table::squash`] folds it into its parent,
//! [`Table::commit_oldest`] makes the oldest frame irreversible. The
//! driver opens one frame per transaction and one per block, so a failed
//! transaction rolls back alone while the block around it survives.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::ops::Bound;

use crate::error::StoreError;
use crate::object::{ObjectId, StateObject};

struct UndoFrame<T: StateObject> {
    /// Pre-images of objects modified in this frame, keyed by id,
    /// recorded on first touch only.
    old_values: BTreeMap<ObjectId, T>,
    /// Pre-images of objects removed in this frame.
    removed: BTreeMap<ObjectId, T>,
    /// Objects created in this frame.
    new_ids: BTreeSet<ObjectId>,
    old_next_id: u64,
}

impl<T: StateObject> UndoFrame<T> {
    fn new(next_id: u64) -> Self {
        Self {
            old_values: BTreeMap::new(),
            removed: BTreeMap::new(),
            new_ids: BTreeSet::new(),
            old_next_id: next_id,
        }
    }
}

pub struct Table<T: StateObject> {
    objects: BTreeMap<ObjectId, T>,
    by_key: BTreeMap<T::Key, ObjectId>,
    by_order: BTreeSet<(T::OrderKey, ObjectId)>,
    next_id: u64,
    undo_stack: Vec<UndoFrame<T>>,
}

impl<T: StateObject> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: StateObject> Table<T> {
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            by_key: BTreeMap::new(),
            by_order: BTreeSet::new(),
            next_id: 0,
            undo_stack: Vec::new(),
        }
    }
}

impl<T: StateObject> Table<T>
where
    T::Key: Debug,
{
    // ── Reads ───────────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, id: ObjectId) -> Option<&T> {
        self.objects.get(&id)
    }

    pub fn find(&self, key: &T::Key) -> Option<&T> {
        self.by_key.get(key).and_then(|id| self.objects.get(id))
    }

    pub fn contains(&self, key: &T::Key) -> bool {
        self.by_key.contains_key(key)
    }

    /// All objects in id order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.objects.values()
    }

    /// All objects in order-key order, object id breaking ties.
    pub fn iter_ordered(&self) -> impl Iterator<Item = &T> {
        self.by_order.iter().filter_map(|(_, id)| self.objects.get(id))
    }

    /// Objects whose order key falls in `[start, end]`, ascending.
    pub fn range_ordered(
        &self,
        start: Bound<(T::OrderKey, ObjectId)>,
        end: Bound<(T::OrderKey, ObjectId)>,
    ) -> impl Iterator<Item = &T> {
        self.by_order
            .range((start, end))
            .filter_map(|(_, id)| self.objects.get(id))
    }

    /// The object with the smallest order key, if any.
    pub fn first_ordered(&self) -> Option<&T> {
        self.by_order
            .iter()
            .next()
            .and_then(|(_, id)| self.objects.get(id))
    }

    // ── Writes ──────────────────────────────────────────────────────────

    /// Create a new object. The builder receives the assigned id and
    /// must return an object carrying it.
    pub fn create<F>(&mut self, build: F) -> Result<&T, StoreError>
    where
        F: FnOnce(ObjectId) -> T,
    {
        let id = ObjectId(self.next_id);
        let object = build(id);
        debug_assert_eq!(object.id(), id);
        let key = object.key();
        if self.by_key.contains_key(&key) {
            return Err(StoreError::Duplicate(format!("{key:?}")));
        }
        self.next_id += 1;
        self.by_key.insert(key, id);
        self.by_order.insert((object.order_key(), id));
        self.objects.insert(id, object);
        if let Some(frame) = self.undo_stack.last_mut() {
            frame.new_ids.insert(id);
        }
        Ok(&self.objects[&id])
    }

    /// Mutate the object with the given id in place.
    ///
    /// The mutation runs on a copy; if it changes the unique key onto an
    /// existing object the table is left untouched and `Duplicate` is
    /// returned. Index entries follow any key changes.
    pub fn modify<F>(&mut self, id: ObjectId, mutate: F) -> Result<&T, StoreError>
    where
        F: FnOnce(&mut T),
    {
        let current = self
            .objects
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("object {id}")))?;

        let old_key = current.key();
        let old_order = current.order_key();
        let mut updated = current.clone();
        mutate(&mut updated);
        debug_assert_eq!(updated.id(), id);
        let new_key = updated.key();
        if new_key != old_key {
            if let Some(other) = self.by_key.get(&new_key) {
                if *other != id {
                    return Err(StoreError::Duplicate(format!("{new_key:?}")));
                }
            }
        }

        self.record_pre_image(id);

        if new_key != old_key {
            self.by_key.remove(&old_key);
            self.by_key.insert(new_key, id);
        }
        let new_order = updated.order_key();
        if new_order != old_order {
            self.by_order.remove(&(old_order, id));
            self.by_order.insert((new_order, id));
        }
        self.objects.insert(id, updated);
        Ok(&self.objects[&id])
    }

    /// Mutate the object with the given unique key.
    pub fn modify_by_key<F>(&mut self, key: &T::Key, mutate: F) -> Result<&T, StoreError>
    where
        F: FnOnce(&mut T),
    {
        let id = *self
            .by_key
            .get(key)
            .ok_or_else(|| StoreError::NotFound(format!("{key:?}")))?;
        self.modify(id, mutate)
    }

    /// Remove and return the object with the given id.
    pub fn remove(&mut self, id: ObjectId) -> Result<T, StoreError> {
        let object = self
            .objects
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("object {id}")))?;
        self.by_key.remove(&object.key());
        self.by_order.remove(&(object.order_key(), id));
        if let Some(frame) = self.undo_stack.last_mut() {
            if frame.new_ids.remove(&id) {
                // Created inside this frame: net effect is nothing.
            } else {
                let pre = frame.old_values.remove(&id).unwrap_or_else(|| object.clone());
                frame.removed.insert(id, pre);
            }
        }
        Ok(object)
    }

    /// Remove and return the object with the given unique key.
    pub fn remove_by_key(&mut self, key: &T::Key) -> Result<T, StoreError> {
        let id = *self
            .by_key
            .get(key)
            .ok_or_else(|| StoreError::NotFound(format!("{key:?}")))?;
        self.remove(id)
    }

    fn record_pre_image(&mut self, id: ObjectId) {
        let Some(frame) = self.undo_stack.last_mut() else {
            return;
        };
        if frame.new_ids.contains(&id) || frame.old_values.contains_key(&id) {
            return;
        }
        if let Some(current) = self.objects.get(&id) {
            frame.old_values.insert(id, current.clone());
        }
    }

    // ── Undo frames ─────────────────────────────────────────────────────

    /// Open a new undo frame; later mutations are journaled into it.
    pub fn begin(&mut self) {
        self.undo_stack.push(UndoFrame::new(self.next_id));
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Revert every change journaled in the deepest frame.
    pub fn undo(&mut self) -> Result<(), StoreError> {
        let frame = self.undo_stack.pop().ok_or(StoreError::NoUndoFrame)?;

        for id in &frame.new_ids {
            if let Some(object) = self.objects.remove(id) {
                self.by_key.remove(&object.key());
                self.by_order.remove(&(object.order_key(), *id));
            }
        }
        for (id, old) in frame.old_values {
            if let Some(current) = self.objects.get(&id) {
                self.by_key.remove(&current.key());
                self.by_order.remove(&(current.order_key(), id));
            }
            self.by_key.insert(old.key(), id);
            self.by_order.insert((old.order_key(), id));
            self.objects.insert(id, old);
        }
        for (id, old) in frame.removed {
            self.by_key.insert(old.key(), id);
            self.by_order.insert((old.order_key(), id));
            self.objects.insert(id, old);
        }
        self.next_id = frame.old_next_id;
        Ok(())
    }

    /// Fold the deepest frame into its parent, so both commit or revert
    /// together.
    pub fn squash(&mut self) -> Result<(), StoreError> {
        if self.undo_stack.len() < 2 {
            return Err(StoreError::NothingToSquash(self.undo_stack.len()));
        }
        let top = self.undo_stack.pop().ok_or(StoreError::NoUndoFrame)?;
        let below = self.undo_stack.last_mut().ok_or(StoreError::NoUndoFrame)?;

        for (id, old) in top.old_values {
            if below.new_ids.contains(&id) || below.old_values.contains_key(&id) {
                continue;
            }
            below.old_values.insert(id, old);
        }
        for id in top.new_ids {
            below.new_ids.insert(id);
        }
        for (id, old) in top.removed {
            if below.new_ids.remove(&id) {
                continue;
            }
            let pre = below.old_values.remove(&id).unwrap_or(old);
            below.removed.insert(id, pre);
        }
        Ok(())
    }

    /// Discard the oldest frame, making its changes irreversible.
    pub fn commit_oldest(&mut self) -> Result<(), StoreError> {
        if self.undo_stack.is_empty() {
            return Err(StoreError::NoUndoFrame);
        }
        self.undo_stack.remove(0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Row {
        id: ObjectId,
        name: String,
        rank: u32,
    }

    impl StateObject for Row {
        type Key = String;
        type OrderKey = u32;

        fn id(&self) -> ObjectId {
            self.id
        }
        fn key(&self) -> String {
            self.name.clone()
        }
        fn order_key(&self) -> u32 {
            self.rank
        }
    }

    fn make_row(table: &mut Table<Row>, name: &str, rank: u32) -> ObjectId {
        table
            .create(|id| Row {
                id,
                name: name.to_string(),
                rank,
            })
            .unwrap()
            .id()
    }

    #[test]
    fn test_create_and_find() {
        let mut table = Table::new();
        let id = make_row(&mut table, "alpha", 3);
        assert_eq!(table.len(), 1);
        assert_eq!(table.find(&"alpha".to_string()).unwrap().id(), id);
        assert!(table.find(&"beta".to_string()).is_none());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut table = Table::new();
        make_row(&mut table, "alpha", 3);
        let dup = table.create(|id| Row {
            id,
            name: "alpha".to_string(),
            rank: 9,
        });
        assert!(matches!(dup, Err(StoreError::Duplicate(_))));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_ordered_iteration_follows_order_key() {
        let mut table = Table::new();
        make_row(&mut table, "c", 30);
        make_row(&mut table, "a", 10);
        make_row(&mut table, "b", 20);
        let names: Vec<_> = table.iter_ordered().map(|r| r.name.clone()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(table.first_ordered().unwrap().name, "a");
    }

    #[test]
    fn test_range_scan_is_bounded() {
        let mut table = Table::new();
        for (name, rank) in [("a", 10), ("b", 20), ("c", 30), ("d", 40)] {
            make_row(&mut table, name, rank);
        }
        let picked: Vec<_> = table
            .range_ordered(
                Bound::Included((15, ObjectId(0))),
                Bound::Included((30, ObjectId::MAX)),
            )
            .map(|r| r.name.clone())
            .collect();
        assert_eq!(picked, ["b", "c"]);
    }

    #[test]
    fn test_modify_reindexes_order_key() {
        let mut table = Table::new();
        let id = make_row(&mut table, "a", 10);
        make_row(&mut table, "b", 20);
        table.modify(id, |r| r.rank = 99).unwrap();
        let names: Vec<_> = table.iter_ordered().map(|r| r.name.clone()).collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn test_modify_onto_existing_key_fails_cleanly() {
        let mut table = Table::new();
        let id = make_row(&mut table, "a", 10);
        make_row(&mut table, "b", 20);
        let clash = table.modify(id, |r| r.name = "b".to_string());
        assert!(matches!(clash, Err(StoreError::Duplicate(_))));
        // Original object is untouched.
        assert_eq!(table.get(id).unwrap().name, "a");
        assert_eq!(table.find(&"a".to_string()).unwrap().id(), id);
    }

    #[test]
    fn test_undo_reverts_create_modify_remove() {
        let mut table = Table::new();
        let kept = make_row(&mut table, "kept", 1);
        let doomed = make_row(&mut table, "doomed", 2);

        table.begin();
        make_row(&mut table, "fresh", 3);
        table.modify(kept, |r| r.rank = 50).unwrap();
        table.remove(doomed).unwrap();
        assert_eq!(table.len(), 2);

        table.undo().unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.find(&"fresh".to_string()).is_none());
        assert_eq!(table.get(kept).unwrap().rank, 1);
        assert_eq!(table.get(doomed).unwrap().name, "doomed");
    }

    #[test]
    fn test_undo_restores_id_counter() {
        let mut table = Table::new();
        table.begin();
        let first = make_row(&mut table, "one", 1);
        table.undo().unwrap();
        let second = make_row(&mut table, "two", 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_create_then_remove_in_frame_is_net_zero() {
        let mut table = Table::new();
        table.begin();
        let id = make_row(&mut table, "blip", 1);
        table.remove(id).unwrap();
        table.undo().unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_pre_image_is_first_touch() {
        let mut table = Table::new();
        let id = make_row(&mut table, "a", 1);
        table.begin();
        table.modify(id, |r| r.rank = 2).unwrap();
        table.modify(id, |r| r.rank = 3).unwrap();
        table.undo().unwrap();
        assert_eq!(table.get(id).unwrap().rank, 1);
    }

    #[test]
    fn test_squash_folds_into_parent() {
        let mut table = Table::new();
        let id = make_row(&mut table, "a", 1);

        table.begin();
        table.modify(id, |r| r.rank = 2).unwrap();
        table.begin();
        table.modify(id, |r| r.rank = 3).unwrap();
        make_row(&mut table, "b", 9);

        table.squash().unwrap();
        assert_eq!(table.undo_depth(), 1);

        // One undo now reverts both frames' work.
        table.undo().unwrap();
        assert_eq!(table.get(id).unwrap().rank, 1);
        assert!(table.find(&"b".to_string()).is_none());
    }

    #[test]
    fn test_squash_modify_then_remove_keeps_oldest_pre_image() {
        let mut table = Table::new();
        let id = make_row(&mut table, "a", 1);

        table.begin();
        table.modify(id, |r| r.rank = 2).unwrap();
        table.begin();
        table.remove(id).unwrap();
        table.squash().unwrap();
        table.undo().unwrap();

        assert_eq!(table.get(id).unwrap().rank, 1);
    }

    #[test]
    fn test_commit_oldest_makes_changes_permanent() {
        let mut table = Table::new();
        table.begin();
        let id = make_row(&mut table, "a", 1);
        table.begin();
        table.modify(id, |r| r.rank = 2).unwrap();

        table.commit_oldest().unwrap();
        assert_eq!(table.undo_depth(), 1);
        // The creation can no longer be undone, the modify still can.
        table.undo().unwrap();
        assert_eq!(table.get(id).unwrap().rank, 1);
        assert!(table.undo().is_err());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_undo_without_frame_errors() {
        let mut table: Table<Row> = Table::new();
        assert!(matches!(table.undo(), Err(StoreError::NoUndoFrame)));
        table.begin();
        assert!(matches!(
            table.squash(),
            Err(StoreError::NothingToSquash(1))
        ));
    }
}
