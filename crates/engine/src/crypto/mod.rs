pub mod services;
pub mod signer;
pub mod timestamper;
