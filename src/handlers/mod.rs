// handlers/mod.rs - three security tiers
//
// Public (no auth) → Protected (JWT, /api/v1/*) → Elevated (JWT + admin, /api/v1/admin/*)

pub mod elevated;
pub mod protected;
pub mod public;
