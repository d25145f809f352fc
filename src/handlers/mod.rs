// handlers/mod.rs - 3-Tier Handler Architecture
//
// Public (no auth) → Protected (JWT + active user) → Elevated (admin role)
//
// Each tier exposes a `router()` that lib.rs merges into the app router with
// the matching middleware stack.
pub mod public;    // Tier 1: No authentication required (/auth/*, /share/*)
pub mod protected; // Tier 2: JWT authentication required (/api/*)
pub mod elevated;  // Tier 3: Admin role required (/api/admin/*)
