#![allow(clippy::disallowed_methods)]

use mockito::{Matcher, Server};
use tfplug::data_source::{ConfigureDataSourceRequest, ReadDataSourceRequest};
use tfplug::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest, ReadResourceRequest,
};
use tfplug::{
    AttributePath, ConfigureProviderRequest, Context, DataSource, DataSourceWithConfigure,
    DynamicValue, Provider, Resource, ResourceWithConfigure,
};
use vpc::VpcProvider;

fn configured_provider(url: &str) -> (VpcProvider, ConfigureProviderRequest) {
    let mut config = DynamicValue::object();
    config
        .set_string(&AttributePath::new("endpoint"), url.to_string())
        .unwrap();
    config
        .set_string(&AttributePath::new("api_token"), "secret".to_string())
        .unwrap();
    config
        .set_number(&AttributePath::new("max_retries"), 0.0)
        .unwrap();
    (
        VpcProvider::new(),
        ConfigureProviderRequest {
            terraform_version: "1.9.0".to_string(),
            config,
        },
    )
}

#[tokio::test]
async fn data_source_reads_through_provider() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/load_balancers/r006-lb")
        .match_header("authorization", "Bearer secret")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("version".into(), vpc::api::DEFAULT_API_VERSION.into()),
            Matcher::UrlEncoded("generation".into(), "2".into()),
        ]))
        .with_body(
            serde_json::json!({
                "id": "r006-lb",
                "name": "edge",
                "provisioning_status": "active",
                "operating_status": "online",
                "is_public": false,
                "listeners": [],
                "pools": [{"id": "r006-pool"}]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let (mut provider, request) = configured_provider(&server.url());
    let configured = provider.configure(Context::new(), request).await;
    assert!(configured.diagnostics.is_empty(), "{:?}", configured.diagnostics);

    let factory = provider.data_sources()["vpc_lb"];
    let mut data_source = factory();
    data_source
        .configure(
            Context::new(),
            ConfigureDataSourceRequest {
                provider_data: configured.provider_data,
            },
        )
        .await;

    let mut config = DynamicValue::object();
    config
        .set_string(&AttributePath::new("id"), "r006-lb".to_string())
        .unwrap();
    let response = data_source
        .read(
            Context::new(),
            ReadDataSourceRequest {
                type_name: "vpc_lb".to_string(),
                config,
            },
        )
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert_eq!(
        response.state.get_string(&AttributePath::new("name")).unwrap(),
        "edge"
    );
    assert_eq!(
        response
            .state
            .get_string_list(&AttributePath::new("pools"))
            .unwrap(),
        vec!["r006-pool".to_string()]
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn reserved_ip_lifecycle_through_provider() {
    let mut server = Server::new_async().await;
    let reserved_ip = serde_json::json!({
        "id": "0717-rip",
        "address": "10.240.0.9",
        "name": "frontend",
        "auto_delete": false,
        "lifecycle_state": "stable",
        "owner": "user",
        "href": "https://us-south.iaas.example.com/v1/subnets/0717-subnet/reserved_ips/0717-rip"
    })
    .to_string();

    let create = server
        .mock("POST", "/v1/subnets/0717-subnet/reserved_ips")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(serde_json::json!({"name": "frontend"})))
        .with_status(201)
        .with_body(&reserved_ip)
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/v1/subnets/0717-subnet/reserved_ips/0717-rip")
        .match_query(Matcher::Any)
        .with_status(204)
        .create_async()
        .await;
    // Served until the delete goes through, then the 404 below takes over
    server
        .mock("GET", "/v1/subnets/0717-subnet/reserved_ips/0717-rip")
        .match_query(Matcher::Any)
        .with_body(&reserved_ip)
        .expect(2)
        .create_async()
        .await;
    server
        .mock("GET", "/v1/subnets/0717-subnet/reserved_ips/0717-rip")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"errors":[{"code":"reserved_ip_not_found","message":"not found"}]}"#)
        .create_async()
        .await;

    let (mut provider, request) = configured_provider(&server.url());
    let configured = provider.configure(Context::new(), request).await;
    assert!(configured.diagnostics.is_empty(), "{:?}", configured.diagnostics);

    let factory = provider.resources()["vpc_subnet_reserved_ip"];
    let mut resource = factory();
    let response = resource
        .configure(
            Context::new(),
            ConfigureResourceRequest {
                provider_data: configured.provider_data,
            },
        )
        .await;
    assert!(response.diagnostics.is_empty());

    let mut config = DynamicValue::object();
    config
        .set_string(&AttributePath::new("subnet"), "0717-subnet".to_string())
        .unwrap();
    config
        .set_string(&AttributePath::new("name"), "frontend".to_string())
        .unwrap();

    let created = resource
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: "vpc_subnet_reserved_ip".to_string(),
                planned_state: config.clone(),
                config,
            },
        )
        .await;
    assert!(created.diagnostics.is_empty(), "{:?}", created.diagnostics);
    assert_eq!(
        created.new_state.get_string(&AttributePath::new("id")).unwrap(),
        "0717-subnet/0717-rip"
    );
    assert_eq!(
        created
            .new_state
            .get_string(&AttributePath::new("address"))
            .unwrap(),
        "10.240.0.9"
    );
    create.assert_async().await;

    let read = resource
        .read(
            Context::new(),
            ReadResourceRequest {
                type_name: "vpc_subnet_reserved_ip".to_string(),
                current_state: created.new_state.clone(),
            },
        )
        .await;
    assert!(read.diagnostics.is_empty(), "{:?}", read.diagnostics);
    assert!(read.new_state.is_some());

    let deleted = resource
        .delete(
            Context::new(),
            DeleteResourceRequest {
                type_name: "vpc_subnet_reserved_ip".to_string(),
                prior_state: created.new_state,
            },
        )
        .await;
    assert!(deleted.diagnostics.is_empty(), "{:?}", deleted.diagnostics);
    delete.assert_async().await;
}

#[tokio::test]
async fn unconfigured_resource_reports_error() {
    let provider = VpcProvider::new();
    let resource = provider.resources()["vpc_lb_pool"]();

    let response = resource
        .delete(
            Context::new(),
            DeleteResourceRequest {
                type_name: "vpc_lb_pool".to_string(),
                prior_state: DynamicValue::object(),
            },
        )
        .await;
    assert_eq!(response.diagnostics.len(), 1);
    assert!(response.diagnostics[0].is_error());
}
