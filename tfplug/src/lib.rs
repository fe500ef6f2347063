//! tfplug - Terraform Plugin Framework for Rust
//!
//! The provider-facing half of the Terraform plugin contract: dynamic values,
//! schemas, diagnostics, and the async resource / data source / provider traits.

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Provider API modules
pub mod data_source;
pub mod provider;
pub mod resource;

// Helper modules
pub mod import;
pub mod timeouts;
pub mod validator;

// Re-exports for convenience
pub use context::Context;
pub use data_source::{DataSource, DataSourceWithConfigure};
pub use error::{Result, TfplugError};
pub use import::import_state_passthrough_id;
pub use provider::{ConfigureProviderRequest, ConfigureProviderResponse, Provider};
pub use resource::{
    Resource, ResourceWithConfigure, ResourceWithExists, ResourceWithImportState,
};
pub use schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
pub use timeouts::Timeouts;
pub use types::{AttributePath, Diagnostic, DiagnosticSeverity, Dynamic, DynamicValue};
