// handlers/elevated/mod.rs - admin-only endpoints under /api/v1/admin
//
// Routed behind both `jwt_auth_middleware` and `require_admin`.

pub mod kyc;
pub mod wallet;
