// handlers/public/mod.rs - endpoints reachable without a token

mod health;
mod root;

pub use health::health;
pub use root::root;
