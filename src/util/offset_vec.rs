use std::fmt::{Debug, Error, Formatter};
use std::iter::{DoubleEndedIterator, Enumerate, Extend, FromIterator};
use std::ops::Sub;
use std::result::Result;
use std::slice::Iter;

/// Elements with a width (eg. when used in an `OffsetVec`)
pub trait Width {
    fn width(&self) -> usize;
}

/// A vector of elements of different logical "widths", where offsets into the vector are given in
/// terms of the sum of the widths of the previous elements (as opposed to the number of preceding
/// elements).
///
/// Class files are full of this sort of indexing:
///
///   - constant pool indices (`long` and `double` entries take two indices, and indexing starts
///     at 1)
///   - local variable slots and operand stack depth (`long` and `double` take two slots)
///
#[derive(Clone)]
pub struct OffsetVec<T: Sized> {
    /// Entries, along with their offset
    entries: Vec<(Offset, T)>,

    /// Offset of the next element to be added
    offset_len: Offset,

    /// Offset for the first element (usually 0, but 1 for the constant pool)
    initial_offset: Offset,
}

/// Offset into an `OffsetVec`
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Offset(pub usize);

impl Sub for Offset {
    type Output = isize;

    fn sub(self, other: Offset) -> isize {
        (self.0 as isize) - (other.0 as isize)
    }
}

impl<T: Sized + Width> OffsetVec<T> {
    /// New empty offset vector
    pub fn new() -> OffsetVec<T> {
        OffsetVec::new_starting_at(Offset(0))
    }

    /// New empty offset vector, with a custom starting offset
    pub fn new_starting_at(initial_offset: Offset) -> OffsetVec<T> {
        OffsetVec {
            entries: vec![],
            offset_len: initial_offset,
            initial_offset,
        }
    }

    /// Number of entries (not the sum of their widths)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offset of the next element to be added
    pub fn offset_len(&self) -> Offset {
        self.offset_len
    }

    /// Add an entry to the back, returning the offset at which it was placed
    pub fn push(&mut self, slot: T) -> Offset {
        let offset = self.offset_len;
        self.offset_len.0 += slot.width();
        self.entries.push((offset, slot));
        offset
    }

    /// Remove an entry from the back
    pub fn pop(&mut self) -> Option<(Offset, T)> {
        self.entries.pop().map(|(off, elem)| {
            self.offset_len = off;
            (off, elem)
        })
    }

    /// Peek at the entry at the back
    pub fn last(&self) -> Option<&T> {
        self.entries.last().map(|(_, elem)| elem)
    }

    /// Peek at the entry `depth` positions away from the back (`0` is the last entry)
    pub fn from_back(&self, depth: usize) -> Option<&T> {
        self.entries
            .len()
            .checked_sub(depth + 1)
            .map(|idx| &self.entries[idx].1)
    }

    /// Drop entries from the back while they match a predicate
    pub fn pop_while(&mut self, mut predicate: impl FnMut(&T) -> bool) {
        while let Some((_, elem)) = self.entries.last() {
            if !predicate(elem) {
                break;
            }
            let _ = self.pop();
        }
    }

    /// Get an entry (and its index) by its offset in the vector
    ///
    /// Note: this uses binary search to find the offset
    pub fn get_offset(&self, offset: Offset) -> OffsetResult<T> {
        match self.entries.binary_search_by_key(&offset, |(off, _)| *off) {
            Err(insert_at)
                if insert_at == 0
                    || (insert_at == self.entries.len() && offset >= self.offset_len) =>
            {
                OffsetResult::OutOfBounds
            }
            Err(insert_at) => OffsetResult::InvalidOffset(insert_at - 1),
            Ok(found_idx) => OffsetResult::Ok(found_idx, &self.entries[found_idx].1),
        }
    }

    /// Replace the entry at an offset with an entry of the same width
    pub fn replace_at_offset(&mut self, offset: Offset, value: T) -> OffsetResult<'static, ()> {
        match self.entries.binary_search_by_key(&offset, |(off, _)| *off) {
            Err(insert_at)
                if insert_at == 0
                    || (insert_at == self.entries.len() && offset >= self.offset_len) =>
            {
                OffsetResult::OutOfBounds
            }
            Err(insert_at) => OffsetResult::InvalidOffset(insert_at - 1),
            Ok(found_idx) => {
                let replacing = &mut self.entries[found_idx].1;
                if replacing.width() != value.width() {
                    OffsetResult::IncompatibleWidth(value.width(), replacing.width())
                } else {
                    *replacing = value;
                    OffsetResult::Ok(found_idx, &())
                }
            }
        }
    }

    /// Get an entry (and its offset) by its position in the vector
    pub fn get_index(&self, index: usize) -> Option<(Offset, &T)> {
        self.entries.get(index).map(|(offset, t)| (*offset, t))
    }

    pub fn iter(&self) -> OffsetVecIter<'_, T> {
        self.into_iter()
    }

    /// Iterate over just the values
    pub fn values(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.entries.iter().map(|(_, elem)| elem)
    }
}

impl<A: PartialEq> PartialEq for OffsetVec<A> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<A: Eq> Eq for OffsetVec<A> {}

impl<A: Width> Default for OffsetVec<A> {
    fn default() -> Self {
        OffsetVec::new()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum OffsetResult<'a, T> {
    /// Element was accessed
    Ok(usize, &'a T),

    /// Offset falls in the middle of the element at this index
    InvalidOffset(usize),

    /// Width is incompatible (only occurs when replacing an element)
    IncompatibleWidth(usize, usize),

    /// Offset is before the first element or past the end
    OutOfBounds,
}

impl<'a, T> OffsetResult<'a, T> {
    /// Convert to an `Option` and keep only the value found
    pub fn ok(&self) -> Option<&'a T> {
        match self {
            OffsetResult::Ok(_, found) => Some(found),
            OffsetResult::InvalidOffset(_)
            | OffsetResult::OutOfBounds
            | OffsetResult::IncompatibleWidth(_, _) => None,
        }
    }
}

/// Iterator for borrowed `OffsetVec`
pub struct OffsetVecIter<'a, T>(Enumerate<Iter<'a, (Offset, T)>>);

impl<'a, T> Iterator for OffsetVecIter<'a, T> {
    type Item = (Offset, usize, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(idx, (off, elem))| (*off, idx, elem))
    }
}

impl<'a, T> DoubleEndedIterator for OffsetVecIter<'a, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0
            .next_back()
            .map(|(idx, (off, elem))| (*off, idx, elem))
    }
}

impl<'a, T> IntoIterator for &'a OffsetVec<T> {
    type Item = (Offset, usize, &'a T);
    type IntoIter = OffsetVecIter<'a, T>;

    fn into_iter(self) -> OffsetVecIter<'a, T> {
        OffsetVecIter(self.entries.iter().enumerate())
    }
}

impl<T: Width> FromIterator<T> for OffsetVec<T> {
    fn from_iter<A: IntoIterator<Item = T>>(elems: A) -> Self {
        let mut offset_vec = OffsetVec::new();
        offset_vec.extend(elems);
        offset_vec
    }
}

impl<T: Width> Extend<T> for OffsetVec<T> {
    fn extend<U: IntoIterator<Item = T>>(&mut self, iter: U) {
        for elem in iter {
            self.push(elem);
        }
    }
}

impl<T: Debug> Debug for OffsetVec<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        let mut list = f.debug_list();
        for (off, elem) in &self.entries {
            list.entry(&format_args!("#{} = {:?}", off.0, elem));
        }
        list.finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Mimics constant pool entries: `Wide` is a `long` or `double`
    #[derive(Copy, Clone, Eq, PartialEq, Debug)]
    enum Entry {
        Narrow(u8),
        Wide(u8),
    }

    impl Width for Entry {
        fn width(&self) -> usize {
            match self {
                Entry::Narrow(_) => 1,
                Entry::Wide(_) => 2,
            }
        }
    }

    fn pool() -> OffsetVec<Entry> {
        let mut pool = OffsetVec::new_starting_at(Offset(1));
        pool.extend(vec![Entry::Narrow(1), Entry::Wide(2), Entry::Narrow(3)]);
        pool
    }

    #[test]
    fn offsets_skip_wide_entries() {
        let pool = pool();
        let offsets: Vec<_> = pool.iter().map(|(off, idx, e)| (off.0, idx, *e)).collect();
        assert_eq!(
            offsets,
            vec![
                (1, 0, Entry::Narrow(1)),
                (2, 1, Entry::Wide(2)),
                (4, 2, Entry::Narrow(3)),
            ]
        );
        assert_eq!(pool.offset_len(), Offset(5));
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn lookup_by_offset() {
        let pool = pool();
        assert_eq!(pool.get_offset(Offset(2)), OffsetResult::Ok(1, &Entry::Wide(2)));
        assert_eq!(pool.get_offset(Offset(3)), OffsetResult::InvalidOffset(1));
        assert_eq!(pool.get_offset(Offset(5)), OffsetResult::OutOfBounds);
        assert_eq!(pool.get_offset(Offset(0)), OffsetResult::OutOfBounds);
    }

    #[test]
    fn replace_needs_same_width() {
        let mut pool = pool();
        assert_eq!(
            pool.replace_at_offset(Offset(1), Entry::Wide(9)),
            OffsetResult::IncompatibleWidth(2, 1)
        );
        assert_eq!(pool.replace_at_offset(Offset(4), Entry::Narrow(9)), OffsetResult::Ok(2, &()));
        assert_eq!(pool.get_offset(Offset(4)).ok(), Some(&Entry::Narrow(9)));
    }

    #[test]
    fn popping_restores_offset() {
        let mut stack: OffsetVec<Entry> = vec![Entry::Wide(1), Entry::Narrow(2)]
            .into_iter()
            .collect();
        assert_eq!(stack.from_back(1), Some(&Entry::Wide(1)));
        assert_eq!(stack.pop(), Some((Offset(2), Entry::Narrow(2))));
        assert_eq!(stack.offset_len(), Offset(2));
        stack.pop_while(|e| matches!(e, Entry::Wide(_)));
        assert!(stack.is_empty());
        assert_eq!(stack.offset_len(), Offset(0));
    }
}
