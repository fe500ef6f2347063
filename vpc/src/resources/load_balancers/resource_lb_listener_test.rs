#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::test_helpers::provider_data;
    use mockito::{Matcher, Mock, ServerGuard};
    use std::any::Any;
    use std::sync::Arc;

    const LB_PATH: &str = "/v1/load_balancers/r006-lb";
    const LISTENER_PATH: &str = "/v1/load_balancers/r006-lb/listeners/r006-listener";

    fn config() -> DynamicValue {
        let mut config = DynamicValue::object();
        put_string(&mut config, "lb", "r006-lb");
        put_string(&mut config, "protocol", "http");
        put_i64(&mut config, "port", 80);
        put_string(&mut config, "default_pool", "r006-lb/r006-pool");
        config
    }

    fn prior_state() -> DynamicValue {
        let mut state = config();
        put_string(&mut state, "id", "r006-lb/r006-listener");
        state
    }

    fn lb_body(status: &str) -> String {
        serde_json::json!({
            "id": "r006-lb",
            "name": "lb",
            "provisioning_status": status,
            "is_public": true
        })
        .to_string()
    }

    fn listener_body(status: &str) -> String {
        serde_json::json!({
            "id": "r006-listener",
            "protocol": "http",
            "port": 80,
            "default_pool": {"id": "r006-pool", "href": "https://vpc.example/pools/r006-pool"},
            "connection_limit": 2000,
            "idle_connection_timeout": 50,
            "provisioning_status": status,
            "policies": [{"id": "r006-policy"}],
            "created_at": "2024-03-01T10:00:00Z"
        })
        .to_string()
    }

    fn not_found_body() -> &'static str {
        r#"{"errors":[{"code":"not_found","message":"Listener not found"}]}"#
    }

    async fn lb_mock(server: &mut ServerGuard, status: &str, hits: usize) -> Mock {
        server
            .mock("GET", LB_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(lb_body(status))
            .expect(hits)
            .create_async()
            .await
    }

    async fn configured(url: &str) -> LbListenerResource {
        let mut resource = LbListenerResource::new();
        let data: Arc<dyn Any + Send + Sync> = Arc::new(provider_data(url));
        let response = resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: Some(data),
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
        resource
    }

    #[tokio::test]
    async fn create_waits_for_load_balancer_around_post() {
        let mut server = mockito::Server::new_async().await;
        // One poll before the POST sees the LB still busy, the next one and
        // the wait after the listener settles see it active
        let busy = lb_mock(&mut server, "update_pending", 1).await;
        let active = lb_mock(&mut server, "active", 2).await;
        let create = server
            .mock("POST", "/v1/load_balancers/r006-lb/listeners")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "protocol": "http",
                "port": 80,
                "default_pool": {"id": "r006-pool"}
            })))
            .with_status(201)
            .with_body(listener_body("create_pending"))
            .expect(1)
            .create_async()
            .await;
        let pending = server
            .mock("GET", LISTENER_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(listener_body("create_pending"))
            .expect(1)
            .create_async()
            .await;
        let settled = server
            .mock("GET", LISTENER_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(listener_body("active"))
            .expect(1)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "vpc_lb_listener".to_string(),
                    planned_state: config(),
                    config: config(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state;
        assert_eq!(state_string(&state, "id").as_deref(), Some("r006-lb/r006-listener"));
        assert_eq!(state_string(&state, "listener_id").as_deref(), Some("r006-listener"));
        assert_eq!(state_string(&state, "status").as_deref(), Some("active"));
        assert_eq!(state_string(&state, "default_pool").as_deref(), Some("r006-lb/r006-pool"));
        assert_eq!(optional_i64(&state, "connection_limit").unwrap(), Some(2000));
        assert_eq!(
            state.get_string_list(&path("policies")).unwrap(),
            vec!["r006-policy".to_string()]
        );

        busy.assert_async().await;
        active.assert_async().await;
        create.assert_async().await;
        pending.assert_async().await;
        settled.assert_async().await;
    }

    #[tokio::test]
    async fn create_keeps_id_when_listener_fails() {
        let mut server = mockito::Server::new_async().await;
        lb_mock(&mut server, "active", 1).await;
        server
            .mock("POST", "/v1/load_balancers/r006-lb/listeners")
            .match_query(Matcher::Any)
            .with_status(201)
            .with_body(listener_body("create_pending"))
            .create_async()
            .await;
        server
            .mock("GET", LISTENER_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(listener_body("failed"))
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "vpc_lb_listener".to_string(),
                    planned_state: config(),
                    config: config(),
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Failed to create load balancer listener");
        assert!(response.diagnostics[0].detail.contains("failed"));
        assert_eq!(
            state_string(&response.new_state, "id").as_deref(),
            Some("r006-lb/r006-listener")
        );
    }

    #[tokio::test]
    async fn delete_treats_missing_listener_as_deleted() {
        let mut server = mockito::Server::new_async().await;
        let active = lb_mock(&mut server, "active", 1).await;
        let delete = server
            .mock("DELETE", LISTENER_PATH)
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(not_found_body())
            .expect(1)
            .create_async()
            .await;
        let get = server
            .mock("GET", LISTENER_PATH)
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "vpc_lb_listener".to_string(),
                    prior_state: prior_state(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        active.assert_async().await;
        delete.assert_async().await;
        get.assert_async().await;
    }

    #[tokio::test]
    async fn delete_waits_until_listener_is_gone() {
        let mut server = mockito::Server::new_async().await;
        let active = lb_mock(&mut server, "active", 2).await;
        let delete = server
            .mock("DELETE", LISTENER_PATH)
            .match_query(Matcher::Any)
            .with_status(202)
            .expect(1)
            .create_async()
            .await;
        let deleting = server
            .mock("GET", LISTENER_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(listener_body("delete_pending"))
            .expect(1)
            .create_async()
            .await;
        let gone = server
            .mock("GET", LISTENER_PATH)
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(not_found_body())
            .expect(1)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "vpc_lb_listener".to_string(),
                    prior_state: prior_state(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        active.assert_async().await;
        delete.assert_async().await;
        deleting.assert_async().await;
        gone.assert_async().await;
    }

    #[tokio::test]
    async fn delete_skips_when_load_balancer_is_gone() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", LB_PATH)
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"errors":[{"code":"not_found","message":"Load balancer not found"}]}"#)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", LISTENER_PATH)
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "vpc_lb_listener".to_string(),
                    prior_state: prior_state(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn read_removes_missing_listener() {
        let mut server = mockito::Server::new_async().await;
        let get = server
            .mock("GET", LISTENER_PATH)
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(not_found_body())
            .expect(1)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "vpc_lb_listener".to_string(),
                    current_state: prior_state(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert!(response.new_state.is_none());
        get.assert_async().await;
    }

    #[tokio::test]
    async fn read_reports_pool_by_bare_id_when_changed_remotely() {
        let mut server = mockito::Server::new_async().await;
        let mut body: serde_json::Value = serde_json::from_str(&listener_body("active")).unwrap();
        body["default_pool"]["id"] = serde_json::json!("r006-other");
        server
            .mock("GET", LISTENER_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "vpc_lb_listener".to_string(),
                    current_state: prior_state(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state.unwrap();
        assert_eq!(state_string(&state, "default_pool").as_deref(), Some("r006-other"));
        assert_eq!(state_string(&state, "lb").as_deref(), Some("r006-lb"));
    }

    #[tokio::test]
    async fn import_splits_composite_id() {
        let resource = LbListenerResource::new();
        let response = resource
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: "vpc_lb_listener".to_string(),
                    id: "r006-lb/r006-listener".to_string(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        let state = &response.imported_resources[0].state;
        assert_eq!(state_string(state, "lb").as_deref(), Some("r006-lb"));
        assert_eq!(state_string(state, "listener_id").as_deref(), Some("r006-listener"));
    }
}
