//! Shared fixtures for integration tests that need real infrastructure.
//!
//! Tests call [`runtime::ensure_container_runtime`] (directly or through
//! [`postgres::PostgresContainer::start`]) and skip themselves when no
//! Docker/Podman socket is reachable.

pub mod postgres;
pub mod runtime;

use uuid::Uuid;

pub(crate) fn unique_name(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_name_keeps_prefix_and_differs() {
        let first = unique_name("purple-pg");
        let second = unique_name("purple-pg");
        assert!(first.starts_with("purple-pg-"));
        assert_ne!(first, second);
    }
}
