//! Identifier generation.
//!
//! Meetings and invitations get opaque string ids. Services take an
//! `Arc<dyn IdGenerator>` so tests can substitute predictable ids.

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Source of globally unique identifiers for new entities.
pub trait IdGenerator: Send + Sync {
    /// Produce a fresh identifier. Never returns the same value twice.
    fn next_id(&self) -> String;
}

/// Random UUID v4 identifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Counter-based identifiers with a fixed prefix (`inv-1`, `inv-2`, ...).
///
/// Unique only within one generator instance.
#[derive(Debug)]
pub struct SequentialGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialGenerator {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialGenerator {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_uuid_generator_produces_distinct_ids() {
        let generator = UuidGenerator;
        let ids: HashSet<String> = (0..100).map(|_| generator.next_id()).collect();
        assert_eq!(ids.len(), 100);
        assert!(ids.iter().all(|id| Uuid::parse_str(id).is_ok()));
    }

    #[test]
    fn test_sequential_generator_counts_from_one() {
        let generator = SequentialGenerator::new("inv");
        assert_eq!(generator.next_id(), "inv-1");
        assert_eq!(generator.next_id(), "inv-2");
        assert_eq!(generator.next_id(), "inv-3");
    }

    #[test]
    fn test_generators_are_object_safe() {
        let generators: Vec<Box<dyn IdGenerator>> = vec![
            Box::new(UuidGenerator),
            Box::new(SequentialGenerator::new("m")),
        ];
        for generator in &generators {
            assert!(!generator.next_id().is_empty());
        }
    }
}
