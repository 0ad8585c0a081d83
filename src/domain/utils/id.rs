use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A typed, sequential identifier.
///
/// Ids are plain numbers so that they order by creation. Several queues use the id as the final
/// tie-break of their ordering, which keeps simulation runs reproducible.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Id<T> {
    pub id: u64,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(id: u64) -> Self {
        Id { id, _marker: PhantomData }
    }

    pub fn get(&self) -> u64 {
        self.id
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full_name = std::any::type_name::<T>();
        let clean_name = full_name.split("::").last().unwrap_or(full_name);
        let display_name = clean_name.replace("Tag", "Id");

        write!(f, "{}: {}", display_name, self.id)
    }
}

/// Hands out increasing ids of one kind. Clones share the same counter.
#[derive(Debug, Clone)]
pub struct IdGenerator<T> {
    next: Arc<AtomicU64>,
    _marker: PhantomData<T>,
}

impl<T> IdGenerator<T> {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        IdGenerator { next: Arc::new(AtomicU64::new(first)), _marker: PhantomData }
    }

    pub fn next_id(&self) -> Id<T> {
        Id::new(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl<T> Default for IdGenerator<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct TaskTag;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_hands_out_increasing_ids_across_clones() {
        let generator: IdGenerator<TaskTag> = IdGenerator::new();
        let clone = generator.clone();

        let first = generator.next_id();
        let second = clone.next_id();

        assert!(first < second);
        assert_eq!(format!("{:?}", first), "TaskId: 1");
    }
}
