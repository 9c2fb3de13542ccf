//! Shared fixtures: a model set backed by the in-memory store.

#![allow(dead_code)]

use quadra_sdk::{
    parse_config, resolve, Command, CommandGateway, FunctionHandlers, MemoryStore, ModelRegistry,
    RepositoryFactory, DEFAULT_MAX_MAPPING_DEPTH, MEMORY_BACKEND,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

pub const MODELS: &str = r#"{
    "process_flow": { "backend": "memory" },
    "models": [
        { "alias": "address", "type": "Address", "params": [
            { "name": "city", "type": "string" },
            { "name": "zip", "type": "string" } ] },
        { "alias": "widget", "type": "Widget", "repo": { "backend": "memory", "alias": "widgets" }, "params": [
            { "name": "id", "type": "string" },
            { "name": "name", "type": "string" },
            { "name": "size", "type": "integer", "default": 1 },
            { "name": "price", "type": "decimal" },
            { "name": "home", "type": "nested", "model": "address" },
            { "name": "tags", "type": "collection", "element": "string" },
            { "name": "secret", "type": "string",
              "access": [ { "when_authorities": ["guest"], "mode": "hidden" } ] } ] },
        { "alias": "widgetView", "type": "WidgetView", "maps_to": "widget", "params": [
            { "name": "label", "type": "string", "maps_to": "/name" },
            { "name": "city", "type": "string", "maps_to": "/home/city" },
            { "name": "note", "type": "string" } ] },
        { "alias": "order", "type": "Order", "repo": { "backend": "memory", "alias": "orders" },
          "lifecycle": "fulfilment", "params": [
            { "name": "id", "type": "string" },
            { "name": "status", "type": "string" } ] },
        { "alias": "note", "type": "Note", "params": [ { "name": "text", "type": "string" } ] }
    ]
}"#;

pub fn registry() -> Arc<ModelRegistry> {
    Arc::new(resolve(&parse_config(MODELS).unwrap()).unwrap())
}

/// Twelve widgets (ids "01".."12"); widget `n` has size `n`, odd ones live in Oslo.
pub fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for n in 1..=12u32 {
        let id = format!("{:02}", n);
        let city = if n % 2 == 1 { "Oslo" } else { "Bergen" };
        store
            .insert(
                "widgets",
                &id,
                json!({
                    "id": id,
                    "name": format!("bolt-{}", n),
                    "size": n,
                    "price": f64::from(n) * 1.5,
                    "home": { "city": city, "zip": null },
                    "tags": ["steel"],
                    "secret": "s3cret"
                }),
            )
            .unwrap();
    }
    store
        .insert("orders", "1", json!({"id": "1", "status": "open"}))
        .unwrap();
    store
        .insert("orders", "2", json!({"id": "2", "status": "shipped"}))
        .unwrap();
    store
        .insert("orders", "3", json!({"id": "3", "status": "new"}))
        .unwrap();
    store
        .insert(
            "orders_processFlow",
            "1",
            json!({"id": "1", "processExecutionId": "px-1", "state": "picking", "activeTasks": ["pick"]}),
        )
        .unwrap();
    store
        .insert(
            "orders_processFlow",
            "2",
            json!({"id": "2", "processExecutionId": "px-2", "state": "done", "activeTasks": []}),
        )
        .unwrap();
    store
}

pub fn repos(store: Arc<MemoryStore>) -> Arc<RepositoryFactory> {
    Arc::new(RepositoryFactory::new().with_store(MEMORY_BACKEND, store))
}

pub fn gateway_with(store: Arc<MemoryStore>, handlers: FunctionHandlers) -> Arc<CommandGateway> {
    CommandGateway::new(registry(), repos(store), handlers, DEFAULT_MAX_MAPPING_DEPTH)
}

pub fn gateway() -> Arc<CommandGateway> {
    gateway_with(seeded_store(), FunctionHandlers::new())
}

pub fn command(uri: &str) -> Command {
    Command::parse(uri, &HashMap::new()).unwrap()
}

pub fn command_with(uri: &str, pairs: &[(&str, &str)]) -> Command {
    let params: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Command::parse(uri, &params).unwrap()
}
