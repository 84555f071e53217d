//! Scripted transport for client tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use platform_core::{Error, Result};
use serde_json::Value;

use crate::transport::{HttpClient, Query};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Get {
        service: String,
        endpoint: String,
        query: Query,
    },
    Post {
        service: String,
        endpoint: String,
        body: Value,
    },
}

/// Replays queued responses in order and records every request
#[derive(Default)]
pub struct MockHttpClient {
    responses: Mutex<VecDeque<Result<Value>>>,
    calls: Mutex<Vec<Call>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, body: Value) -> Self {
        self.responses.lock().unwrap().push_back(Ok(body));
        self
    }

    pub fn fail(self, error: Error) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn next_response(&self) -> Result<Value> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(Error::Transport {
                    message: "no response queued".to_string(),
                })
            })
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, service: &str, endpoint: &str, query: &[(String, String)]) -> Result<Value> {
        self.calls.lock().unwrap().push(Call::Get {
            service: service.to_string(),
            endpoint: endpoint.to_string(),
            query: query.to_vec(),
        });
        self.next_response()
    }

    async fn post(&self, service: &str, endpoint: &str, body: &Value) -> Result<Value> {
        self.calls.lock().unwrap().push(Call::Post {
            service: service.to_string(),
            endpoint: endpoint.to_string(),
            body: body.clone(),
        });
        self.next_response()
    }
}

/// Build a query from string pairs
pub fn query(pairs: &[(&str, &str)]) -> Query {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
