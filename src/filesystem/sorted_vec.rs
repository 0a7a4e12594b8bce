use std::cmp::Ordering;
use std::collections::TryReserveError;

/// Result of a binary search: where the key sits, or where it would go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Found(usize),
    Vacant(usize),
}

impl Position {
    pub fn is_found(self) -> bool {
        matches!(self, Position::Found(_))
    }

    /// Index of the match, or the insertion index that keeps the order.
    pub fn index(self) -> usize {
        match self {
            Position::Found(index) | Position::Vacant(index) => index,
        }
    }
}

/// A vector whose order is maintained by its callers through [`Position`].
///
/// The container never compares elements itself; every search takes a
/// comparator, so it can hold handles whose keys live elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortedVec<T> {
    items: Vec<T>,
}

impl<T> Default for SortedVec<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> SortedVec<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// `compare` orders an element against the searched key.
    pub fn search_by<F>(&self, compare: F) -> Position
    where
        F: FnMut(&T) -> Ordering,
    {
        match self.items.binary_search_by(compare) {
            Ok(index) => Position::Found(index),
            Err(index) => Position::Vacant(index),
        }
    }

    /// Inserts without reallocating on failure; `index` must come from a
    /// [`Position`] computed against the current contents.
    pub fn insert_at(&mut self, index: usize, item: T) -> Result<(), TryReserveError> {
        self.items.try_reserve(1)?;
        self.items.insert(index, item);
        Ok(())
    }

    pub fn remove_at(&mut self, index: usize) -> Option<T> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }
}

impl<T> IntoIterator for SortedVec<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a SortedVec<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
