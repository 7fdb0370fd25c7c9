//! Record id sources.
//!
//! Generators do not consult the tables; the service checks the target table
//! and retries on the (improbable) collision.

use uuid::Uuid;

/// Produces ids for new records.
pub trait IdGenerator {
    fn next_id(&mut self) -> String;
}

/// Random UUIDv4 ids in hyphenated form (36 bytes).
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&mut self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic ids (`<prefix>-000001`, ...) for tests and fixtures.
#[derive(Debug, Clone)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: u64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&mut self) -> String {
        let id = format!("{}-{:06}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::{IdGenerator, SequentialIdGenerator, UuidIdGenerator};
    use uuid::Uuid;

    #[test]
    fn uuid_ids_parse_and_differ() {
        let mut ids = UuidIdGenerator;
        let first = ids.next_id();
        let second = ids.next_id();
        assert_ne!(first, second);
        assert_eq!(first.len(), 36);
        assert_eq!(Uuid::parse_str(&first).unwrap().get_version_num(), 4);
    }

    #[test]
    fn sequential_ids_are_ordered() {
        let mut ids = SequentialIdGenerator::new("u");
        assert_eq!(ids.next_id(), "u-000001");
        assert_eq!(ids.next_id(), "u-000002");
    }
}
