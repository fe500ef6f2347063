//! Load balancer data source

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
    DataSourceMetadataResponse, DataSourceSchemaRequest, DataSourceSchemaResponse,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::DynamicValue;

use crate::api::load_balancers::LoadBalancer;
use crate::error::{ApiResultExt, Result};
use crate::resources::common::*;
use crate::VpcProviderData;

#[derive(Default)]
pub struct LbDataSource {
    provider_data: Option<VpcProviderData>,
}

impl LbDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for LbDataSource {
    fn type_name(&self) -> &str {
        "vpc_lb"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: DataSourceMetadataRequest,
    ) -> DataSourceMetadataResponse {
        DataSourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Looks up a load balancer by ID")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Load balancer ID")
                    .required()
                    .build(),
            )
            .attribute(AttributeBuilder::new("name", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("crn", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("hostname", AttributeType::String).computed().build())
            .attribute(
                AttributeBuilder::new("provisioning_status", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("operating_status", AttributeType::String)
                    .description("online or offline")
                    .computed()
                    .build(),
            )
            .attribute(AttributeBuilder::new("is_public", AttributeType::Bool).computed().build())
            .attribute(
                AttributeBuilder::new("listeners", AttributeType::List(Box::new(AttributeType::String)))
                    .description("Listener IDs")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("pools", AttributeType::List(Box::new(AttributeType::String)))
                    .description("Pool IDs")
                    .computed()
                    .build(),
            )
            .attribute(AttributeBuilder::new("created_at", AttributeType::String).computed().build())
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(data) = &self.provider_data else {
            return ReadDataSourceResponse {
                state: DynamicValue::null(),
                diagnostics: vec![not_configured()],
            };
        };

        match read_lb(data, &request.config).await {
            Ok(state) => ReadDataSourceResponse {
                state,
                diagnostics: vec![],
            },
            Err(e) => ReadDataSourceResponse {
                state: DynamicValue::null(),
                diagnostics: vec![e.to_diagnostic("Failed to read load balancer")],
            },
        }
    }
}

async fn read_lb(data: &VpcProviderData, config: &DynamicValue) -> Result<DynamicValue> {
    let lb_id = required_string(config, "id")?;
    tracing::debug!("Reading load balancer {}", lb_id);

    let lb = data
        .client
        .load_balancers()
        .get(&lb_id)
        .await
        .context(format!("load balancer {}", lb_id))?;

    let mut state = config.clone();
    flatten_lb(&mut state, &lb);
    Ok(state)
}

fn flatten_lb(state: &mut DynamicValue, lb: &LoadBalancer) {
    put_string(state, "id", &lb.id);
    put_string(state, "name", &lb.name);
    put_opt_string(state, "crn", lb.crn.as_deref());
    put_opt_string(state, "hostname", lb.hostname.as_deref());
    put_string(state, "provisioning_status", &lb.provisioning_status);
    put_opt_string(state, "operating_status", lb.operating_status.as_deref());
    put_bool(state, "is_public", lb.is_public);
    put_strings(state, "listeners", lb.listeners.iter().map(|l| l.id.clone()));
    put_strings(state, "pools", lb.pools.iter().map(|p| p.id.clone()));
    put_opt_string(
        state,
        "created_at",
        lb.created_at.map(|t| t.to_rfc3339()).as_deref(),
    );
}

#[async_trait]
impl DataSourceWithConfigure for LbDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        let (provider_data, diagnostics) = configure_provider_data(request.provider_data);
        self.provider_data = provider_data;
        ConfigureDataSourceResponse { diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::provider_data;
    use mockito::{Matcher, Server};
    use std::any::Any;
    use std::sync::Arc;

    async fn configured(url: &str) -> LbDataSource {
        let mut data_source = LbDataSource::new();
        let data: Arc<dyn Any + Send + Sync> = Arc::new(provider_data(url));
        let response = data_source
            .configure(
                Context::new(),
                ConfigureDataSourceRequest {
                    provider_data: Some(data),
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
        data_source
    }

    fn config(id: &str) -> DynamicValue {
        let mut config = DynamicValue::object();
        put_string(&mut config, "id", id);
        config
    }

    #[tokio::test]
    async fn reads_load_balancer() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v1/load_balancers/r006-lb")
            .match_query(Matcher::Any)
            .with_body(
                serde_json::json!({
                    "id": "r006-lb",
                    "name": "web",
                    "hostname": "web.lb.example.com",
                    "provisioning_status": "active",
                    "operating_status": "online",
                    "is_public": true,
                    "listeners": [{"id": "r006-l1"}, {"id": "r006-l2"}],
                    "pools": [{"id": "r006-p1"}],
                    "created_at": "2024-05-01T10:00:00Z"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let data_source = configured(&server.url()).await;
        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: "vpc_lb".to_string(),
                    config: config("r006-lb"),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.state;
        assert_eq!(state_string(&state, "hostname").as_deref(), Some("web.lb.example.com"));
        assert!(state.get_bool(&path("is_public")).unwrap());
        assert_eq!(
            state.get_string_list(&path("listeners")).unwrap(),
            vec!["r006-l1".to_string(), "r006-l2".to_string()]
        );
        assert_eq!(
            state_string(&state, "created_at").as_deref(),
            Some("2024-05-01T10:00:00+00:00")
        );
    }

    #[tokio::test]
    async fn missing_load_balancer_is_an_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v1/load_balancers/nope")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"errors":[{"code":"load_balancer_not_found","message":"not found"}]}"#)
            .create_async()
            .await;

        let data_source = configured(&server.url()).await;
        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: "vpc_lb".to_string(),
                    config: config("nope"),
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].detail, "load balancer nope not found");
    }

    #[tokio::test]
    async fn unconfigured_read_reports_error() {
        let response = LbDataSource::new()
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: "vpc_lb".to_string(),
                    config: config("r006-lb"),
                },
            )
            .await;
        assert!(response.diagnostics[0].is_error());
    }
}
