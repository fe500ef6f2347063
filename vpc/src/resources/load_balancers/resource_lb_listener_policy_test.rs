#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::test_helpers::provider_data;
    use mockito::{Matcher, Server};
    use std::any::Any;
    use std::sync::Arc;

    const LB: &str = "r006-lb";
    const LISTENER: &str = "r006-listener";

    fn config(action: &str) -> DynamicValue {
        let mut config = DynamicValue::object();
        put_string(&mut config, "lb", LB);
        put_string(&mut config, "listener", LISTENER);
        put_string(&mut config, "action", action);
        put_i64(&mut config, "priority", 1);
        config
    }

    fn summaries(diagnostics: &[Diagnostic]) -> Vec<&str> {
        diagnostics.iter().map(|d| d.summary.as_str()).collect()
    }

    #[test]
    fn forward_requires_target_id() {
        let diagnostics = validate_policy_config(&config("forward"));
        assert_eq!(summaries(&diagnostics), vec!["Missing policy target"]);
        assert!(diagnostics[0].detail.contains("target_id"));

        let mut ok = config("forward");
        put_string(&mut ok, "target_id", "r006-lb/r006-pool");
        assert!(validate_policy_config(&ok).is_empty());
    }

    #[test]
    fn redirect_requires_status_and_url() {
        let mut config = config("redirect");
        put_i64(&mut config, "target_http_status_code", 301);
        let diagnostics = validate_policy_config(&config);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].detail.contains("target_url"));

        put_string(&mut config, "target_url", "https://example.com");
        assert!(validate_policy_config(&config).is_empty());
    }

    #[test]
    fn https_redirect_requires_listener_and_status() {
        let mut config = config("https_redirect");
        assert_eq!(validate_policy_config(&config).len(), 2);

        put_string(&mut config, "target_https_redirect_listener", "r006-https");
        put_i64(&mut config, "target_https_redirect_status_code", 302);
        put_string(&mut config, "target_https_redirect_uri", "/secure");
        assert!(validate_policy_config(&config).is_empty());
    }

    #[test]
    fn reject_conflicts_with_targets() {
        let mut config = config("reject");
        assert!(validate_policy_config(&config).is_empty());

        put_string(&mut config, "target_url", "https://example.com");
        let diagnostics = validate_policy_config(&config);
        assert_eq!(summaries(&diagnostics), vec!["Conflicting policy target"]);
    }

    #[test]
    fn unknown_targets_are_not_reported_missing() {
        let mut config = config("forward");
        config
            .set_value(&AttributePath::new("target_id"), Dynamic::Unknown)
            .unwrap();
        assert!(validate_policy_config(&config).is_empty());
    }

    #[test]
    fn redirect_status_code_checked() {
        let mut config = config("redirect");
        put_i64(&mut config, "target_http_status_code", 200);
        put_string(&mut config, "target_url", "https://example.com");
        let diagnostics = validate_policy_config(&config);
        assert_eq!(summaries(&diagnostics), vec!["Invalid redirect status code"]);
    }

    #[test]
    fn header_rules_need_a_field() {
        let mut config = config("reject");
        let mut rule = HashMap::new();
        rule.insert("condition".to_string(), Dynamic::String("equals".to_string()));
        rule.insert("type".to_string(), Dynamic::String("header".to_string()));
        rule.insert("value".to_string(), Dynamic::String("1".to_string()));
        config
            .set_list(&AttributePath::new(RULES), vec![Dynamic::Map(rule)])
            .unwrap();

        let diagnostics = validate_policy_config(&config);
        assert_eq!(summaries(&diagnostics), vec!["Missing rule field"]);
        assert_eq!(
            diagnostics[0].attribute,
            Some(AttributePath::new(RULES).index(0).attribute("field"))
        );
    }

    #[test]
    fn target_from_accepts_pool_resource_id() {
        let mut config = config("forward");
        put_string(&mut config, "target_id", "r006-lb/r006-pool");
        assert_eq!(
            target_from(&config, "forward").unwrap(),
            Some(ListenerPolicyTargetPrototype::Pool(Identity::new("r006-pool")))
        );
        assert_eq!(target_from(&config, "reject").unwrap(), None);
    }

    #[test]
    fn rules_read_from_block() {
        let mut config = config("reject");
        let mut rule = HashMap::new();
        rule.insert("condition".to_string(), Dynamic::String("contains".to_string()));
        rule.insert("type".to_string(), Dynamic::String("path".to_string()));
        rule.insert("value".to_string(), Dynamic::String("/api".to_string()));
        config
            .set_list(&AttributePath::new(RULES), vec![Dynamic::Map(rule)])
            .unwrap();

        let rules = rules_from(&config).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].rule_type, "path");
        assert_eq!(rules[0].field, None);
        assert!(rules_from(&DynamicValue::object()).unwrap().is_empty());
    }

    #[test]
    fn flatten_redirect_clears_other_targets() {
        let policy: ListenerPolicy = serde_json::from_value(serde_json::json!({
            "id": "r006-policy",
            "name": "to-docs",
            "action": "redirect",
            "priority": 2,
            "provisioning_status": "active",
            "rules": [],
            "target": {"http_status_code": 308, "url": "https://docs.example.com"}
        }))
        .unwrap();

        let mut state = config("redirect");
        put_string(&mut state, "target_id", "stale");
        flatten_policy(&mut state, LB, LISTENER, &policy);

        assert_eq!(
            state_string(&state, "id").as_deref(),
            Some("r006-lb/r006-listener/r006-policy")
        );
        assert_eq!(state_string(&state, "target_id"), None);
        assert_eq!(state_string(&state, "target_url").as_deref(), Some("https://docs.example.com"));
        assert_eq!(optional_i64(&state, "target_http_status_code").unwrap(), Some(308));
    }

    async fn configured(url: &str) -> LbListenerPolicyResource {
        let mut resource = LbListenerPolicyResource::new();
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
    async fn create_forward_policy() {
        let mut server = Server::new_async().await;
        let lb = server
            .mock("GET", "/v1/load_balancers/r006-lb")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"id":"r006-lb","name":"lb","provisioning_status":"active","is_public":true}"#)
            .expect_at_least(2)
            .create_async()
            .await;
        let policy_body = |status: &str| {
            serde_json::json!({
                "id": "r006-policy",
                "name": "api",
                "action": "forward",
                "priority": 1,
                "provisioning_status": status,
                "rules": [{"id": "r006-rule", "condition": "contains", "type": "path", "value": "/api"}],
                "target": {"id": "r006-pool", "href": "https://vpc.example/pools/r006-pool"}
            })
            .to_string()
        };
        let create = server
            .mock("POST", "/v1/load_balancers/r006-lb/listeners/r006-listener/policies")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "action": "forward",
                "priority": 1,
                "target": {"id": "r006-pool"}
            })))
            .with_status(201)
            .with_body(policy_body("create_pending"))
            .create_async()
            .await;
        let get = server
            .mock("GET", "/v1/load_balancers/r006-lb/listeners/r006-listener/policies/r006-policy")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(policy_body("active"))
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let mut config = config("forward");
        put_string(&mut config, "target_id", "r006-lb/r006-pool");

        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "vpc_lb_listener_policy".to_string(),
                    planned_state: config.clone(),
                    config,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state;
        assert_eq!(
            state_string(&state, "id").as_deref(),
            Some("r006-lb/r006-listener/r006-policy")
        );
        assert_eq!(state_string(&state, "target_id").as_deref(), Some("r006-lb/r006-pool"));
        assert_eq!(state_string(&state, "status").as_deref(), Some("active"));

        lb.assert_async().await;
        create.assert_async().await;
        get.assert_async().await;
    }

    #[tokio::test]
    async fn read_removes_missing_policy() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v1/load_balancers/r006-lb/listeners/r006-listener/policies/gone")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"errors":[{"code":"not_found","message":"Policy not found"}]}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let mut state = config("reject");
        put_string(&mut state, "id", "r006-lb/r006-listener/gone");

        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "vpc_lb_listener_policy".to_string(),
                    current_state: state,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert!(response.new_state.is_none());
    }

    #[tokio::test]
    async fn import_rejects_short_ids() {
        let resource = LbListenerPolicyResource::new();
        let response = resource
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: "vpc_lb_listener_policy".to_string(),
                    id: "r006-lb/r006-listener".to_string(),
                },
            )
            .await;

        assert!(response.imported_resources.is_empty());
        assert_eq!(response.diagnostics[0].summary, "Invalid import ID");
    }
}
