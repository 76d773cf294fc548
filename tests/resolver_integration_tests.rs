//! # Resolver Integration Tests
//!
//! Runs the resolver against a mocked Consul agent and feeds the resolved
//! addresses into the picker, the way a connection runtime would.

use async_trait::async_trait;
use consul_traffic::load_balancing::attach_traffic_tags;
use consul_traffic::{
    AddressList, AddressSink, ConsulResolverBuilder, PriorityPickerBuilder, Target, TrafficResult,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tonic::metadata::MetadataMap;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Forwards every update into a channel so tests see each one
struct ChannelSink(mpsc::UnboundedSender<AddressList>);

#[async_trait]
impl AddressSink for ChannelSink {
    async fn update_addresses(&self, addresses: AddressList) -> TrafficResult<()> {
        let _ = self.0.send(addresses);
        Ok(())
    }
}

fn entry(address: &str, port: u16, tags: &[&str]) -> Value {
    json!({
        "Node": {"Node": "node", "Address": "10.255.0.1", "Datacenter": "dc1"},
        "Service": {"ID": format!("{}:{}", address, port), "Service": "billing", "Tags": tags, "Address": address, "Port": port}
    })
}

fn health_response(index: u64, entries: Vec<Value>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("x-consul-index", index.to_string().as_str())
        .set_body_json(Value::Array(entries))
}

async fn next_update(rx: &mut mpsc::UnboundedReceiver<AddressList>) -> AddressList {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for address update")
        .expect("sink channel closed")
}

#[tokio::test]
async fn test_resolver_tracks_changes_and_feeds_picker() {
    let server = MockServer::start().await;

    // Most specific mocks first: the first registered match wins
    Mock::given(method("GET"))
        .and(path("/v1/health/service/billing"))
        .and(query_param("index", "2"))
        .respond_with(
            health_response(2, vec![entry("10.0.0.2", 7000, &["canary"]), entry("10.0.0.1", 7000, &[])])
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/health/service/billing"))
        .and(query_param("index", "1"))
        .respond_with(
            health_response(2, vec![entry("10.0.0.2", 7000, &["canary"]), entry("10.0.0.1", 7000, &[])])
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/health/service/billing"))
        .and(query_param("passing", "1"))
        .respond_with(health_response(1, vec![entry("10.0.0.1", 7000, &[])]))
        .mount(&server)
        .await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let url = format!(
        "consul://{}/billing?wait=30s&healthy=true",
        server.address()
    );
    let resolver = ConsulResolverBuilder::new()
        .build(&url, Arc::new(ChannelSink(tx)))
        .unwrap();
    assert_eq!(resolver.target().service, "billing");

    let first = next_update(&mut rx).await;
    assert_eq!(first.addrs(), vec!["10.0.0.1:7000"]);

    let second = next_update(&mut rx).await;
    assert_eq!(second.addrs(), vec!["10.0.0.1:7000", "10.0.0.2:7000"]);

    // The runtime connects to every address and rebuilds its picker
    let ready = second.iter().map(|a| (a.addr.clone(), a.clone()));
    let picker = PriorityPickerBuilder::new().build(ready);

    let mut metadata = MetadataMap::new();
    attach_traffic_tags(&mut metadata, &["canary"]).unwrap();
    assert_eq!(picker.pick(&metadata).unwrap(), "10.0.0.2:7000");

    // The pending 30s blocking query must not hold up shutdown
    tokio::time::timeout(Duration::from_secs(2), resolver.shutdown())
        .await
        .expect("resolver did not shut down");
}

#[tokio::test]
async fn test_resolver_recovers_from_agent_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/health/service/billing"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/health/service/billing"))
        .and(query_param("index", "4"))
        .respond_with(health_response(4, Vec::new()).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/health/service/billing"))
        .respond_with(health_response(4, Vec::new()))
        .mount(&server)
        .await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let target = Target {
        addr: server.uri(),
        service: "billing".to_string(),
        max_backoff: Duration::from_millis(50),
        ..Target::default()
    };
    let resolver = ConsulResolverBuilder::new()
        .build_target(target, Arc::new(ChannelSink(tx)))
        .unwrap();

    // An empty service still produces an (empty) update
    let update = next_update(&mut rx).await;
    assert!(update.is_empty());

    resolver.shutdown().await;
    server.verify().await;
}

#[tokio::test]
async fn test_limit_truncates_resolved_addresses() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/health/service/billing"))
        .and(query_param("index", "9"))
        .respond_with(health_response(9, Vec::new()).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/health/service/billing"))
        .respond_with(health_response(
            9,
            vec![
                entry("10.0.0.3", 80, &[]),
                entry("10.0.0.1", 80, &[]),
                entry("10.0.0.2", 80, &[]),
            ],
        ))
        .mount(&server)
        .await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let url = format!("consul://{}/billing?limit=2", server.address());
    let resolver = ConsulResolverBuilder::new()
        .build(&url, Arc::new(ChannelSink(tx)))
        .unwrap();

    let update = next_update(&mut rx).await;
    assert_eq!(update.addrs(), vec!["10.0.0.1:80", "10.0.0.2:80"]);

    resolver.close();
}
