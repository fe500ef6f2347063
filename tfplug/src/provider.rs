//! Provider trait
//!
//! A provider configures shared state once and hands it to every resource and
//! data source it creates through `provider_data`.

use crate::context::Context;
use crate::data_source::DataSourceWithConfigure;
use crate::resource::ConfigurableResource;
use crate::schema::Schema;
use crate::types::{Diagnostic, DynamicValue};
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

pub type ResourceFactory = fn() -> Box<dyn ConfigurableResource>;
pub type DataSourceFactory = fn() -> Box<dyn DataSourceWithConfigure>;

#[async_trait]
pub trait Provider: Send + Sync {
    fn type_name(&self) -> &str;

    async fn schema(&self, ctx: Context) -> Schema;

    async fn configure(
        &mut self,
        ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse;

    /// Factories keyed by resource type name
    fn resources(&self) -> HashMap<String, ResourceFactory>;

    /// Factories keyed by data source type name
    fn data_sources(&self) -> HashMap<String, DataSourceFactory>;
}

pub struct ConfigureProviderRequest {
    pub terraform_version: String,
    pub config: DynamicValue,
}

pub struct ConfigureProviderResponse {
    pub diagnostics: Vec<Diagnostic>,
    /// Passed to `configure` of every resource and data source
    pub provider_data: Option<Arc<dyn Any + Send + Sync>>,
}
