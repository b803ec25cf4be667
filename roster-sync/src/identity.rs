//! Deterministic identities for synthetic roster rows.
//!
//! Every synthetic row needs an identifier that survives recomputation:
//! the same layout slot must map to the same identity on every tick, or the
//! diff would see a remove+add (visible flicker) instead of a no-op.
//!
//! Identities are UUID v5 (SHA-1 content hash) under a crate-private
//! namespace, so they never collide with the random v4 identities of real
//! participants.

use uuid::Uuid;

/// Namespace for all synthetic roster identities.
pub const ROSTER_NAMESPACE: Uuid = Uuid::from_u128(0x6c0f_3d2e_91a4_4b7c_8e55_0d7a_2f19_c3b8);

/// Seed of the singleton overflow counter row.
pub const COUNTER_SEED: &str = "roster:overflow-counter";

/// Derive a stable identity from a seed string.
///
/// Pure: the same seed always yields the same identity.
#[inline]
pub fn derive_identity(seed: &str) -> Uuid {
    Uuid::new_v5(&ROSTER_NAMESPACE, seed.as_bytes())
}

/// Seed for the row occupying `slot` inside `region`.
///
/// Text rows and padding rows share the seed space on purpose: a slot that
/// flips between the two is diffed as an update.
pub fn slot_seed(region: &str, slot: usize) -> String {
    format!("roster:{region}:{slot}")
}

/// Identity of the row occupying `slot` inside `region`.
pub fn slot_identity(region: &str, slot: usize) -> Uuid {
    derive_identity(&slot_seed(region, slot))
}

/// Identity of the overflow counter row.
pub fn counter_identity() -> Uuid {
    derive_identity(COUNTER_SEED)
}
