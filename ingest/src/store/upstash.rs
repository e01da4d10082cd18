use super::{StateStore, StoreError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

#[derive(Deserialize)]
struct Reply {
    result: Option<Value>,
    error: Option<String>,
}

/// Redis-compatible REST store. Each command is one POST of a JSON array.
pub struct UpstashStore {
    client: reqwest::Client,
    url: Url,
    token: String,
}

impl UpstashStore {
    pub fn new(url: Url, token: &str, timeout_ms: u64) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;

        Ok(UpstashStore {
            client,
            url,
            token: token.to_string(),
        })
    }

    async fn command(&self, name: &'static str, args: Vec<Value>) -> Result<Value, StoreError> {
        let mut body = Vec::with_capacity(args.len() + 1);
        body.push(Value::from(name));
        body.extend(args);

        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let reply = match response.json::<Reply>().await {
            Ok(reply) => reply,
            Err(_) if !status.is_success() => return Err(StoreError::Status(status.as_u16())),
            Err(err) => return Err(err.into()),
        };

        if let Some(message) = reply.error {
            return Err(StoreError::Command {
                command: name,
                message,
            });
        }
        if !status.is_success() {
            return Err(StoreError::Status(status.as_u16()));
        }
        Ok(reply.result.unwrap_or(Value::Null))
    }

    async fn integer(&self, name: &'static str, args: Vec<Value>) -> Result<i64, StoreError> {
        let reply = self.command(name, args).await?;
        as_integer(&reply).ok_or(StoreError::UnexpectedReply(name))
    }

    async fn strings(&self, name: &'static str, args: Vec<Value>) -> Result<Vec<String>, StoreError> {
        match self.command(name, args).await? {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    _ => Err(StoreError::UnexpectedReply(name)),
                })
                .collect(),
            _ => Err(StoreError::UnexpectedReply(name)),
        }
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl StateStore for UpstashStore {
    async fn ping(&self) -> Result<(), StoreError> {
        match self.command("PING", Vec::new()).await? {
            Value::String(pong) if pong.eq_ignore_ascii_case("pong") => Ok(()),
            _ => Err(StoreError::UnexpectedReply("PING")),
        }
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        Ok(self.integer("SADD", vec![json!(key), json!(member)]).await? > 0)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.strings("SMEMBERS", vec![json!(key)]).await
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError> {
        Ok(self
            .integer("HSET", vec![json!(key), json!(field), json!(value)])
            .await?
            > 0)
    }

    async fn hash_get_all(&self, key: &str) -> Result<Vec<(String, String)>, StoreError> {
        let flat = self.strings("HGETALL", vec![json!(key)]).await?;
        if flat.len() % 2 != 0 {
            return Err(StoreError::UnexpectedReply("HGETALL"));
        }

        let mut pairs = Vec::with_capacity(flat.len() / 2);
        let mut items = flat.into_iter();
        while let (Some(field), Some(value)) = (items.next(), items.next()) {
            pairs.push((field, value));
        }
        Ok(pairs)
    }

    async fn hash_incr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        self.integer("HINCRBY", vec![json!(key), json!(field), json!(delta)])
            .await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        self.integer("INCRBY", vec![json!(key), json!(delta)]).await
    }

    async fn get_counter(&self, key: &str) -> Result<i64, StoreError> {
        match self.command("GET", vec![json!(key)]).await? {
            Value::Null => Ok(0),
            value => as_integer(&value).ok_or_else(|| StoreError::NotAnInteger(key.to_string())),
        }
    }

    async fn sorted_add(&self, key: &str, entries: &[(u64, String)]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut args = vec![json!(key)];
        for (score, member) in entries {
            args.push(json!(score));
            args.push(json!(member));
        }
        self.integer("ZADD", args).await.map(|_| ())
    }

    async fn sorted_range_by_score(
        &self,
        key: &str,
        min: u64,
        max: u64,
    ) -> Result<Vec<String>, StoreError> {
        self.strings("ZRANGEBYSCORE", vec![json!(key), json!(min), json!(max)])
            .await
    }

    async fn remove_scored_below(&self, key: &str, cutoff: u64) -> Result<u64, StoreError> {
        let removed = self
            .integer(
                "ZREMRANGEBYSCORE",
                vec![json!(key), json!("-inf"), json!(format!("({cutoff}"))],
            )
            .await?;
        Ok(removed.max(0) as u64)
    }
}
