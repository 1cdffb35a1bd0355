use flowrr::client::{self, ClientConfig, DEFAULT_PROBE};
use flowrr::fabric::{Fabric, Registration};
use flowrr::name::EndpointName;
use flowrr::server::{EchoServer, ServerConfig};
use flowrr::{FlowrrError, UnixFabric};
use std::time::Duration;

fn registration(name: &EndpointName) -> Registration {
    Registration {
        dif: None,
        ipcp: EndpointName::unset(),
        name: name.clone(),
    }
}

#[tokio::test]
async fn test_echo_round_trip_over_unix_sockets() {
    let root = tempfile::tempdir().unwrap();
    let fabric = UnixFabric::open(root.path()).unwrap();
    let name = EndpointName::new(Some("rlite_rr-data"), Some("server"));

    let server = EchoServer::new(
        fabric.clone(),
        ServerConfig {
            name: name.clone(),
            ..ServerConfig::default()
        },
    );
    let shutdown = server.shutdown_signal();
    let handle = tokio::spawn(async move { server.run().await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let config = ClientConfig {
        remote: name,
        read_timeout: Duration::from_millis(500),
        ..ClientConfig::default()
    };
    let response = client::run_text(&fabric, &config)
        .await
        .expect("probe should succeed");
    assert_eq!(response, DEFAULT_PROBE);

    shutdown.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_registration_conflict_on_bound_path() {
    let root = tempfile::tempdir().unwrap();
    let fabric = UnixFabric::open(root.path()).unwrap();
    let name = EndpointName::new(Some("svc"), Some("1"));

    let _listener = fabric.register(&registration(&name)).await.unwrap();
    let err = fabric.register(&registration(&name)).await.unwrap_err();
    assert!(matches!(err, FlowrrError::Registration(_)), "got {err:?}");
}

#[tokio::test]
async fn test_listener_drop_frees_the_name() {
    let root = tempfile::tempdir().unwrap();
    let fabric = UnixFabric::open(root.path()).unwrap();
    let name = EndpointName::new(Some("svc"), Some("1"));

    let listener = fabric.register(&registration(&name)).await.unwrap();
    drop(listener);

    // The socket file is unlinked on drop, so a restarted server can bind.
    fabric
        .register(&registration(&name))
        .await
        .expect("name should be free again");
}

#[tokio::test]
async fn test_startup_fails_when_root_is_not_a_directory() {
    let root = tempfile::tempdir().unwrap();
    let file = root.path().join("occupied");
    std::fs::write(&file, b"not a directory").unwrap();

    let err = UnixFabric::open(&file).unwrap_err();
    assert!(matches!(err, FlowrrError::Startup(_)), "got {err:?}");
}
