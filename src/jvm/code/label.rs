use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Opaque position in the code of a method
///
/// Labels are only meaningful to the method that created them. Each method gets its own
/// [`LabelGenerator`] and labels remember which generator they came from.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Label {
    owner: u32,
    index: u32,
}

impl Label {
    /// Does this label come from the given generator?
    pub fn belongs_to(&self, generator: &LabelGenerator) -> bool {
        self.owner == generator.owner
    }
}

/// Source of unique owner identifiers for generators
static NEXT_OWNER: AtomicU32 = AtomicU32::new(0);

/// Generates new labels
///
/// Cloning does not split the generator source - the cloned generator will produce the same
/// sequence of labels as the original.
#[derive(Clone, Debug)]
pub struct LabelGenerator {
    owner: u32,
    next: u32,
}

impl LabelGenerator {
    pub fn new() -> LabelGenerator {
        LabelGenerator {
            owner: NEXT_OWNER.fetch_add(1, Ordering::Relaxed),
            next: 0,
        }
    }

    /// Generate a fresh label
    pub fn fresh_label(&mut self) -> Label {
        let label = Label {
            owner: self.owner,
            index: self.next,
        };
        self.next += 1;
        label
    }
}

impl Default for LabelGenerator {
    fn default() -> Self {
        LabelGenerator::new()
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "l{}", self.index)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "l{}", self.index)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn labels_are_tied_to_their_generator() {
        let mut first = LabelGenerator::new();
        let mut second = LabelGenerator::new();

        let a = first.fresh_label();
        let b = first.fresh_label();
        let c = second.fresh_label();

        assert_ne!(a, b);
        assert_ne!(a, c);
        assert!(a.belongs_to(&first));
        assert!(!c.belongs_to(&first));
        assert_eq!(b.to_string(), "l1");
    }
}
