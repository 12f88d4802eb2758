//! Append-only arena of protocol instances.
//!
//! Instances are never freed: a settled dispute stays readable, with its
//! full posted history, for as long as the arena lives.

use serde::{Deserialize, Serialize};

/// Handle to an instance in an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "instance#{}", self.0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Arena<T> {
    items: Vec<T>,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn insert(&mut self, item: T) -> InstanceId {
        let id = InstanceId(self.items.len() as u64);
        self.items.push(item);
        id
    }

    pub fn get(&self, id: InstanceId) -> Option<&T> {
        self.items.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut T> {
        self.items.get_mut(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, &T)> {
        self.items.iter().enumerate().map(|(i, item)| (InstanceId(i as u64), item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable_and_instances_stay_readable() {
        let mut arena = Arena::new();
        let a = arena.insert("first");
        let b = arena.insert("second");
        assert_ne!(a, b);
        *arena.get_mut(a).unwrap() = "settled";
        assert_eq!(arena.get(a), Some(&"settled"));
        assert_eq!(arena.get(b), Some(&"second"));
        assert_eq!(arena.get(InstanceId(2)), None);
        assert_eq!(arena.iter().count(), 2);
    }
}
