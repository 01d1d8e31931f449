//! Export and import services and the ports they depend on.

#![forbid(unsafe_code)]

mod bundle_export_service;
mod bundle_import_service;
mod bundle_migrator;
mod bundle_ports;
#[cfg(test)]
mod test_support;

pub use bundle_export_service::BundleExportService;
pub use bundle_import_service::{
    BundleImportService, IdRemapper, ImportOptions, ImportReport, RemappedKind,
};
pub use bundle_migrator::{BundleMigrator, MigratedDocument};
pub use bundle_ports::{ApplicationGraph, ApplicationGraphRepository, SecretEncryptor};
