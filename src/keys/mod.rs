pub mod fingerprint;
pub mod store;
pub mod vault;
