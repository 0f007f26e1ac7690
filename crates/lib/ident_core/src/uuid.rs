// Helper for generating UUIDv7 (timestamp-sortable UUIDs)
//
// The Postgres store lets `gen_random_uuid()` assign user ids. The in-memory
// store has no database default, so it generates UUIDv7 app-side instead.

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}

/// Parse a textual identifier, rejecting the nil UUID.
pub fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok().filter(|id| !id.is_nil())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuidv7_is_valid() {
        let id = uuidv7();
        assert_eq!(id.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn parse_id_rejects_nil_and_garbage() {
        assert!(parse_id("00000000-0000-0000-0000-000000000000").is_none());
        assert!(parse_id("not-a-uuid").is_none());
        let id = uuidv7();
        assert_eq!(parse_id(&id.to_string()), Some(id));
    }
}
