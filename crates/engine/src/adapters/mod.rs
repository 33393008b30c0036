pub mod memory;
#[cfg(feature = "openssl")]
pub mod openssl;
pub mod runtime;
pub mod url_validation;
pub mod x509;
