//! Tunables and named constants, collected in one place instead of scattered as magic literals.

/// The `userIdentity.PrincipalId` value the hosted NoSQL service's TTL sweeper stamps on a
/// `REMOVE` record it originates. A `REMOVE` carrying this (with `Type == "Service"`) is
/// reclassified as `TTL_REMOVE` (§4.1).
pub const TTL_PRINCIPAL_MARKER: &str = "dynamodb.amazonaws.com";
