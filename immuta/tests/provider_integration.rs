use immuta::{ImmutaProvider, API_KEY_ENV, HOST_ENV};
use mockito::{Matcher, Server};
use serial_test::serial;
use tfplug::context::Context;
use tfplug::provider::{ConfigureProviderRequest, Provider};
use tfplug::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ManagedResource, ReadResourceRequest, Resource,
    ResourceWithConfigure, ResourceWithImportState,
};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};

fn provider_config(host: &str) -> DynamicValue {
    let mut config = DynamicValue::object();
    config
        .set_string(&AttributePath::new("host"), host.to_string())
        .unwrap();
    config
        .set_string(&AttributePath::new("api_key"), "secret".to_string())
        .unwrap();
    config
}

/// Configures the provider against `host` and hands a configured instance
/// of `type_name` back, the way the gRPC server does
async fn configured_resource(host: &str, type_name: &str) -> Box<dyn ManagedResource> {
    let mut provider = ImmutaProvider::new();
    let response = provider
        .configure(
            Context::new(),
            ConfigureProviderRequest {
                terraform_version: "1.9.0".to_string(),
                config: provider_config(host),
                client_capabilities: Default::default(),
            },
        )
        .await;
    assert!(response.diagnostics.is_empty());

    let factories = provider.resources();
    let mut resource = factories.get(type_name).unwrap()();
    let configured = resource
        .configure(
            Context::new(),
            ConfigureResourceRequest {
                provider_data: response.provider_data,
            },
        )
        .await;
    assert!(configured.diagnostics.is_empty());
    resource
}

fn read_request(type_name: &str, state: DynamicValue) -> ReadResourceRequest {
    ReadResourceRequest {
        type_name: type_name.to_string(),
        current_state: state,
        private: vec![],
        provider_meta: None,
        client_capabilities: Default::default(),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn tag_lifecycle_with_mock_server() {
    let mut server = Server::new_async().await;

    let create = server
        .mock("POST", "/tag")
        .match_header("authorization", "Bearer secret")
        .with_body(r#"[{"id":42,"name":"pii"}]"#)
        .create_async()
        .await;
    let search = server
        .mock("GET", "/tag")
        .match_query(Matcher::UrlEncoded("searchText".into(), "pii".into()))
        .with_body(r#"[{"id":42,"name":"pii"}]"#)
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/tag/pii")
        .create_async()
        .await;

    let resource = configured_resource(&server.url(), "immuta_tag").await;
    assert_eq!(resource.type_name(), "immuta_tag");

    let mut planned = DynamicValue::object();
    planned
        .set_value(&AttributePath::new("id"), Dynamic::Unknown)
        .unwrap();
    planned
        .set_string(&AttributePath::new("name"), "pii".to_string())
        .unwrap();
    planned.set_null(&AttributePath::new("root_tag")).unwrap();

    let created = resource
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: "immuta_tag".to_string(),
                config: planned.clone(),
                planned_state: planned,
                planned_private: vec![],
                provider_meta: None,
            },
        )
        .await;
    assert!(created.diagnostics.is_empty());
    assert_eq!(
        created.new_state.get_string(&AttributePath::new("id")).unwrap(),
        "42"
    );

    let read = resource
        .read(
            Context::new(),
            read_request("immuta_tag", created.new_state.clone()),
        )
        .await;
    assert!(read.diagnostics.is_empty());
    assert_eq!(read.new_state, Some(created.new_state.clone()));

    let deleted = resource
        .delete(
            Context::new(),
            DeleteResourceRequest {
                type_name: "immuta_tag".to_string(),
                prior_state: created.new_state,
                planned_private: vec![],
                provider_meta: None,
            },
        )
        .await;
    assert!(deleted.diagnostics.is_empty());

    create.assert_async().await;
    search.assert_async().await;
    delete.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn imported_group_is_filled_in_by_read() {
    let mut server = Server::new_async().await;

    let _group = server
        .mock("GET", "/bim/group/7")
        .with_body(
            r#"{"id":7,"iamid":"bim","name":"stewards","email":"stewards@example.com",
                "description":"Data stewards","authorizations":{"team":"data"}}"#,
        )
        .create_async()
        .await;

    let resource = configured_resource(&server.url(), "immuta_bim_group").await;

    let imported = resource
        .import_state(
            Context::new(),
            ImportResourceStateRequest {
                type_name: "immuta_bim_group".to_string(),
                id: "7".to_string(),
                client_capabilities: Default::default(),
            },
        )
        .await;
    assert!(imported.diagnostics.is_empty());

    let state = imported.imported_resources[0].state.clone();
    let read = resource
        .read(Context::new(), read_request("immuta_bim_group", state))
        .await;
    assert!(read.diagnostics.is_empty());

    let state = read.new_state.unwrap();
    assert_eq!(
        state.get_string(&AttributePath::new("name")).unwrap(),
        "stewards"
    );
    assert_eq!(
        state
            .get_string(&AttributePath::new("authorizations").key("team"))
            .unwrap(),
        "data"
    );
}

#[tokio::test]
#[serial]
async fn provider_uses_env_vars_when_config_empty() {
    std::env::set_var(HOST_ENV, "env.immuta.example.com");
    std::env::set_var(API_KEY_ENV, "env-key");

    let mut provider = ImmutaProvider::new();
    let response = provider
        .configure(
            Context::new(),
            ConfigureProviderRequest {
                terraform_version: "1.9.0".to_string(),
                config: DynamicValue::object(),
                client_capabilities: Default::default(),
            },
        )
        .await;

    std::env::remove_var(HOST_ENV);
    std::env::remove_var(API_KEY_ENV);

    assert!(response.diagnostics.is_empty());
    assert!(provider.is_configured());
    assert!(response.provider_data.is_some());
}

#[tokio::test]
#[serial]
async fn provider_without_host_reports_diagnostic() {
    std::env::remove_var(HOST_ENV);
    std::env::remove_var(API_KEY_ENV);

    let mut config = DynamicValue::object();
    config
        .set_string(&AttributePath::new("api_key"), "secret".to_string())
        .unwrap();

    let mut provider = ImmutaProvider::new();
    let response = provider
        .configure(
            Context::new(),
            ConfigureProviderRequest {
                terraform_version: "1.9.0".to_string(),
                config,
                client_capabilities: Default::default(),
            },
        )
        .await;

    assert!(response.diagnostics[0].summary.contains("host is required"));
    assert!(response.provider_data.is_none());
    assert!(!provider.is_configured());
}
