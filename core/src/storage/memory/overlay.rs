// stockpile/src/storage/memory/overlay.rs

//! Committed tables and the per-transaction write overlay on top of them.

use std::collections::BTreeMap;

/// Committed rows of one entity plus its id sequence.
#[derive(Debug)]
pub(crate) struct Table<T> {
  rows: BTreeMap<i64, T>,
  last_id: i64,
}

impl<T> Default for Table<T> {
  fn default() -> Self {
    Self {
      rows: BTreeMap::new(),
      last_id: 0,
    }
  }
}

impl<T> Table<T> {
  pub(crate) fn len(&self) -> usize {
    self.rows.len()
  }
}

/// Writes staged by one transaction against a [`Table`].
///
/// `None` in `writes` marks a staged delete. Nothing touches the table until
/// [`Staged::apply`].
#[derive(Debug)]
pub(crate) struct Staged<T> {
  writes: BTreeMap<i64, Option<T>>,
  last_id: i64,
}

impl<T: Clone> Staged<T> {
  pub(crate) fn over(table: &Table<T>) -> Self {
    Self {
      writes: BTreeMap::new(),
      last_id: table.last_id,
    }
  }

  pub(crate) fn next_id(&mut self) -> i64 {
    self.last_id += 1;
    self.last_id
  }

  pub(crate) fn get<'a>(&'a self, table: &'a Table<T>, id: i64) -> Option<&'a T> {
    match self.writes.get(&id) {
      Some(slot) => slot.as_ref(),
      None => table.rows.get(&id),
    }
  }

  pub(crate) fn contains(&self, table: &Table<T>, id: i64) -> bool {
    self.get(table, id).is_some()
  }

  pub(crate) fn put(&mut self, id: i64, row: T) {
    self.writes.insert(id, Some(row));
  }

  pub(crate) fn remove(&mut self, id: i64) {
    self.writes.insert(id, None);
  }

  /// Rows visible to the transaction, ascending by id.
  pub(crate) fn visible<'a>(&'a self, table: &'a Table<T>) -> Vec<&'a T> {
    let mut merged: BTreeMap<i64, &'a T> = table.rows.iter().map(|(id, row)| (*id, row)).collect();
    for (id, slot) in &self.writes {
      match slot {
        Some(row) => {
          merged.insert(*id, row);
        }
        None => {
          merged.remove(id);
        }
      }
    }
    merged.into_values().collect()
  }

  /// Number of staged upserts and deletes.
  pub(crate) fn pending(&self) -> usize {
    self.writes.len()
  }

  pub(crate) fn apply(self, table: &mut Table<T>) {
    for (id, slot) in self.writes {
      match slot {
        Some(row) => {
          table.rows.insert(id, row);
        }
        None => {
          table.rows.remove(&id);
        }
      }
    }
    table.last_id = table.last_id.max(self.last_id);
  }
}
