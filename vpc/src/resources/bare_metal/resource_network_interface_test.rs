#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::test_helpers::provider_data;
    use mockito::{Matcher, Server, ServerGuard};
    use std::any::Any;
    use std::sync::Arc;
    use tfplug::types::AttributePath;

    const SERVER_PATH: &str = "/v1/bare_metal_servers/0717-bms";
    const NICS_PATH: &str = "/v1/bare_metal_servers/0717-bms/network_interfaces";
    const NIC_PATH: &str = "/v1/bare_metal_servers/0717-bms/network_interfaces/0717-nic";

    fn server_json(status: &str) -> String {
        serde_json::json!({"id": "0717-bms", "name": "bms", "status": status}).to_string()
    }

    fn pci_json(status: &str) -> String {
        serde_json::json!({
            "id": "0717-nic",
            "name": "eth2",
            "status": status,
            "interface_type": "pci",
            "allowed_vlans": [100, 102],
            "allow_ip_spoofing": false,
            "enable_infrastructure_nat": true,
            "mac_address": "02:00:04:00:c4:6a",
            "port_speed": 100000,
            "primary_ip": {"address": "10.240.0.9", "id": "0717-rip"},
            "subnet": {"id": "0717-subnet"},
            "security_groups": [{"id": "0717-sg"}],
            "type": "secondary"
        })
        .to_string()
    }

    fn vlan_json(status: &str) -> String {
        serde_json::json!({
            "id": "0717-nic",
            "name": "vlan100",
            "status": status,
            "interface_type": "vlan",
            "vlan": 100,
            "allow_interface_to_float": true,
            "subnet": {"id": "0717-subnet"}
        })
        .to_string()
    }

    fn base_config() -> DynamicValue {
        let mut config = DynamicValue::object();
        put_string(&mut config, "bare_metal_server", "0717-bms");
        put_string(&mut config, "subnet", "0717-subnet");
        config
    }

    fn pci_config() -> DynamicValue {
        let mut config = base_config();
        put_string(&mut config, "name", "eth2");
        put_i64s(&mut config, "allowed_vlans", &[100, 102]);
        config
    }

    fn vlan_config() -> DynamicValue {
        let mut config = base_config();
        put_string(&mut config, "name", "vlan100");
        put_i64(&mut config, "vlan", 100);
        config
    }

    async fn configured(server: &ServerGuard) -> BareMetalServerNetworkInterfaceResource {
        let mut resource = BareMetalServerNetworkInterfaceResource::new();
        let data: Arc<dyn Any + Send + Sync> = Arc::new(provider_data(&server.url()));
        resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: Some(data),
                },
            )
            .await;
        resource
    }

    #[test]
    fn allowed_vlans_conflicts_with_vlan_settings() {
        let mut config = pci_config();
        put_i64(&mut config, "vlan", 100);
        put_bool(&mut config, "allow_interface_to_float", true);

        let diagnostics = validate_interface_config(&config);
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.iter().all(|d| d.summary == "Conflicting interface type"));
        assert_eq!(diagnostics[0].attribute, Some(AttributePath::new("vlan")));
    }

    #[test]
    fn interface_type_must_be_chosen() {
        let diagnostics = validate_interface_config(&base_config());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Missing interface type");

        let mut config = base_config();
        config
            .set_value(&AttributePath::new("allowed_vlans"), Dynamic::Unknown)
            .unwrap();
        assert!(validate_interface_config(&config).is_empty());

        assert!(validate_interface_config(&pci_config()).is_empty());
        assert!(validate_interface_config(&vlan_config()).is_empty());
    }

    #[test]
    fn prototype_follows_allowed_vlans() {
        match interface_prototype(&pci_config()).unwrap() {
            NetworkInterfacePrototype::Pci {
                settings,
                allowed_vlans,
            } => {
                assert_eq!(allowed_vlans, vec![100, 102]);
                assert_eq!(settings.subnet.id, "0717-subnet");
                assert_eq!(settings.name.as_deref(), Some("eth2"));
            }
            other => panic!("expected a PCI prototype, got {:?}", other),
        }

        assert!(matches!(
            interface_prototype(&vlan_config()).unwrap(),
            NetworkInterfacePrototype::Vlan { vlan: 100, .. }
        ));
        assert!(interface_prototype(&base_config()).is_err());
    }

    #[test]
    fn patch_ignores_vlan_order() {
        let mut prior = pci_config();
        put_i64s(&mut prior, "allowed_vlans", &[102, 100]);
        let patch = interface_patch(&pci_config(), &prior).unwrap();
        assert!(patch_is_empty(&patch));

        let mut config = pci_config();
        put_i64s(&mut config, "allowed_vlans", &[100, 102, 104]);
        put_bool(&mut config, "allow_ip_spoofing", true);
        let patch = interface_patch(&config, &prior).unwrap();
        assert_eq!(patch.allowed_vlans, Some(vec![100, 102, 104]));
        assert_eq!(patch.allow_ip_spoofing, Some(true));
        assert!(patch.name.is_none());
    }

    #[test]
    fn flatten_vlan_interface() {
        let nic: BareMetalServerNetworkInterface = serde_json::from_str(&vlan_json("available")).unwrap();
        let mut state = DynamicValue::object();
        flatten_interface(&mut state, "0717-bms", &nic);

        assert_eq!(state_string(&state, "id").as_deref(), Some("0717-bms/0717-nic"));
        assert_eq!(state_string(&state, "interface_type").as_deref(), Some("vlan"));
        assert_eq!(state.get_number(&path("vlan")).unwrap(), 100.0);
        assert!(state.get_bool(&path("allow_interface_to_float")).unwrap());
        assert!(state.get_list(&path("allowed_vlans")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn pci_create_stops_and_restarts_server() {
        crate::test_helpers::init_tracing();
        let mut server = Server::new_async().await;

        // server reads: running, then stopped twice (stop waiter and the
        // pci_pending check), then running for the start waiter
        server
            .mock("GET", SERVER_PATH)
            .match_query(Matcher::Any)
            .with_body(server_json("running"))
            .expect(1)
            .create_async()
            .await;
        server
            .mock("GET", SERVER_PATH)
            .match_query(Matcher::Any)
            .with_body(server_json("stopped"))
            .expect(2)
            .create_async()
            .await;
        server
            .mock("GET", SERVER_PATH)
            .match_query(Matcher::Any)
            .with_body(server_json("running"))
            .create_async()
            .await;
        let stop = server
            .mock("POST", format!("{}/stop", SERVER_PATH).as_str())
            .match_query(Matcher::Any)
            .match_body(Matcher::Json(serde_json::json!({"type": "hard"})))
            .with_status(204)
            .create_async()
            .await;
        let start = server
            .mock("POST", format!("{}/start", SERVER_PATH).as_str())
            .match_query(Matcher::Any)
            .with_status(204)
            .create_async()
            .await;
        let create = server
            .mock("POST", NICS_PATH)
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "interface_type": "pci",
                "allowed_vlans": [100, 102],
                "subnet": {"id": "0717-subnet"}
            })))
            .with_status(201)
            .with_body(pci_json("pending"))
            .create_async()
            .await;
        server
            .mock("GET", NIC_PATH)
            .match_query(Matcher::Any)
            .with_body(pci_json("pending"))
            .create_async()
            .await;

        let resource = configured(&server).await;
        let config = pci_config();
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "vpc_bare_metal_server_network_interface".to_string(),
                    planned_state: config.clone(),
                    config,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state;
        assert_eq!(state_string(&state, "id").as_deref(), Some("0717-bms/0717-nic"));
        assert_eq!(state_string(&state, "interface_type").as_deref(), Some("pci"));
        assert_eq!(
            state.get_string_list(&path("security_groups")).unwrap(),
            vec!["0717-sg".to_string()]
        );
        create.assert_async().await;
        stop.assert_async().await;
        start.assert_async().await;
    }

    #[tokio::test]
    async fn vlan_create_leaves_server_running() {
        let mut server = Server::new_async().await;
        let stop = server
            .mock("POST", format!("{}/stop", SERVER_PATH).as_str())
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        server
            .mock("POST", NICS_PATH)
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "interface_type": "vlan",
                "vlan": 100
            })))
            .with_status(201)
            .with_body(vlan_json("pending"))
            .create_async()
            .await;
        server
            .mock("GET", NIC_PATH)
            .match_query(Matcher::Any)
            .with_body(vlan_json("available"))
            .create_async()
            .await;

        let resource = configured(&server).await;
        let config = vlan_config();
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "vpc_bare_metal_server_network_interface".to_string(),
                    planned_state: config.clone(),
                    config,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(
            state_string(&response.new_state, "status").as_deref(),
            Some("available")
        );
        stop.assert_async().await;
    }

    #[tokio::test]
    async fn failed_server_blocks_pci_create() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", SERVER_PATH)
            .match_query(Matcher::Any)
            .with_body(server_json("failed"))
            .create_async()
            .await;
        let create = server
            .mock("POST", NICS_PATH)
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let resource = configured(&server).await;
        let config = pci_config();
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "vpc_bare_metal_server_network_interface".to_string(),
                    planned_state: config.clone(),
                    config,
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(
            response.diagnostics[0].detail,
            "cannot attach network interface to a failed bare metal server"
        );
        assert!(state_string(&response.new_state, "network_interface").is_none());
        create.assert_async().await;
    }

    #[tokio::test]
    async fn vlan_delete_on_stopped_server_fails() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", NIC_PATH)
            .match_query(Matcher::Any)
            .with_body(vlan_json("deleting"))
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", NIC_PATH)
            .match_query(Matcher::Any)
            .with_status(202)
            .create_async()
            .await;
        server
            .mock("GET", SERVER_PATH)
            .match_query(Matcher::Any)
            .with_body(server_json("stopped"))
            .create_async()
            .await;

        let resource = configured(&server).await;
        let mut prior = vlan_config();
        put_string(&mut prior, "id", "0717-bms/0717-nic");

        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "vpc_bare_metal_server_network_interface".to_string(),
                    prior_state: prior,
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].detail.contains("is stopped"));
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn delete_of_missing_interface_succeeds() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", NIC_PATH)
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"errors":[{"code":"not_found","message":"gone"}]}"#)
            .create_async()
            .await;

        let resource = configured(&server).await;
        let mut prior = pci_config();
        put_string(&mut prior, "id", "0717-bms/0717-nic");

        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "vpc_bare_metal_server_network_interface".to_string(),
                    prior_state: prior,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    }

    #[tokio::test]
    async fn import_needs_server_and_interface() {
        let resource = BareMetalServerNetworkInterfaceResource::new();
        let response = resource
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: "vpc_bare_metal_server_network_interface".to_string(),
                    id: "0717-nic".to_string(),
                },
            )
            .await;
        assert!(response.imported_resources.is_empty());
        assert_eq!(response.diagnostics[0].summary, "Invalid import ID");

        let response = resource
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: "vpc_bare_metal_server_network_interface".to_string(),
                    id: "0717-bms/0717-nic".to_string(),
                },
            )
            .await;
        let state = &response.imported_resources[0].state;
        assert_eq!(state_string(state, "bare_metal_server").as_deref(), Some("0717-bms"));
    }
}
