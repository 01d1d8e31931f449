//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod aes_secret_encryptor;
mod in_memory_application_repository;
mod json_file_bundle_store;

pub use aes_secret_encryptor::AesSecretEncryptor;
pub use in_memory_application_repository::InMemoryApplicationRepository;
pub use json_file_bundle_store::JsonFileBundleStore;
