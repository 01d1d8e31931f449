mod encryption;
mod repository;

pub use encryption::SecretEncryptor;
pub use repository::{ApplicationGraph, ApplicationGraphRepository};
