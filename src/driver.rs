//! Scripted client that replays leak scenarios against a running server.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use crate::models::{Item, NewItem};
use crate::random::random_string;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("no function found for endpoint \"{0}\"")]
    UnknownScenario(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("random source unavailable: {0}")]
    Random(#[from] rand::Error),
    #[error("invalid response payload: {0}")]
    Payload(#[from] serde_json::Error),
}

pub type DriverResult<T> = Result<T, DriverError>;

/// The remote calls a scenario can issue.
#[async_trait]
pub trait LeakApi: Send + Sync {
    async fn root(&self) -> DriverResult<String>;
    async fn leak(&self) -> DriverResult<String>;
    async fn snap(&self) -> DriverResult<String>;
    async fn snap_gc(&self) -> DriverResult<String>;
    async fn list_items(&self) -> DriverResult<Vec<Item>>;
    async fn create_item(&self, payload: NewItem) -> DriverResult<Item>;
}

#[derive(Debug, Clone)]
pub struct HttpLeakApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLeakApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_text(&self, path: &str) -> DriverResult<String> {
        let response = self.client.get(self.url(path)).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.text().await?)
    }
}

async fn ensure_success(response: reqwest::Response) -> DriverResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(DriverError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl LeakApi for HttpLeakApi {
    async fn root(&self) -> DriverResult<String> {
        self.get_text("/").await
    }

    async fn leak(&self) -> DriverResult<String> {
        self.get_text("/leak").await
    }

    async fn snap(&self) -> DriverResult<String> {
        self.get_text("/snap").await
    }

    async fn snap_gc(&self) -> DriverResult<String> {
        self.get_text("/snap-gc").await
    }

    async fn list_items(&self) -> DriverResult<Vec<Item>> {
        let response = self.client.get(self.url("/items")).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<Vec<Item>>().await?)
    }

    async fn create_item(&self, payload: NewItem) -> DriverResult<Item> {
        let response = self
            .client
            .post(self.url("/items"))
            .json(&serde_json::json!({
                "name": payload.name,
                "description": payload.description,
            }))
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<Item>().await?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Root,
    Leak,
    Snap,
    SnapGc,
    List,
    Create,
}

impl Scenario {
    pub const ALL: [Scenario; 6] = [
        Scenario::Root,
        Scenario::Leak,
        Scenario::Snap,
        Scenario::SnapGc,
        Scenario::List,
        Scenario::Create,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Scenario::Root => "root",
            Scenario::Leak => "leak",
            Scenario::Snap => "snap",
            Scenario::SnapGc => "snap-gc",
            Scenario::List => "list",
            Scenario::Create => "create",
        }
    }

    /// Issues the single call this scenario stands for.
    pub async fn call(self, api: &dyn LeakApi) -> DriverResult<Value> {
        match self {
            Scenario::Root => api.root().await.map(Value::String),
            Scenario::Leak => api.leak().await.map(Value::String),
            Scenario::Snap => api.snap().await.map(Value::String),
            Scenario::SnapGc => api.snap_gc().await.map(Value::String),
            Scenario::List => {
                let items = api.list_items().await?;
                Ok(serde_json::to_value(items)?)
            }
            Scenario::Create => {
                let payload = NewItem::new(random_string(5)?, random_string(20)?);
                let item = api.create_item(payload).await?;
                Ok(serde_json::to_value(item)?)
            }
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.as_str() == s)
            .ok_or_else(|| DriverError::UnknownScenario(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScenarioReport {
    pub succeeded: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStep {
    Run {
        scenario: String,
        times: u32,
        delay: Duration,
    },
    Wait(Duration),
}

impl PlanStep {
    pub fn run(scenario: impl Into<String>, times: u32, delay_secs: u64) -> Self {
        Self::Run {
            scenario: scenario.into(),
            times,
            delay: Duration::from_secs(delay_secs),
        }
    }

    pub fn wait(secs: u64) -> Self {
        Self::Wait(Duration::from_secs(secs))
    }
}

/// The timeline used to watch a leak grow between two gc snapshots.
pub fn default_plan() -> Vec<PlanStep> {
    vec![
        PlanStep::run("root", 10, 2),
        PlanStep::run("snap-gc", 1, 1),
        PlanStep::run("leak", 20, 1),
        PlanStep::run("create", 20, 1),
        PlanStep::run("list", 5, 1),
        PlanStep::run("create", 5, 1),
        PlanStep::wait(10),
        PlanStep::run("snap-gc", 1, 1),
        PlanStep::wait(30),
        PlanStep::run("snap-gc", 1, 1),
    ]
}

pub struct Driver<A> {
    api: A,
}

impl<A: LeakApi> Driver<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Calls `name` `times` times, one after the other, sleeping `delay`
    /// after every call. Failed calls are logged and do not stop the run.
    pub async fn run_scenario(
        &self,
        name: &str,
        times: u32,
        delay: Duration,
    ) -> DriverResult<ScenarioReport> {
        info!(
            scenario = name,
            times,
            delay_secs = delay.as_secs_f64(),
            "calling endpoint"
        );

        let scenario = match name.parse::<Scenario>() {
            Ok(scenario) => scenario,
            Err(err) => {
                error!(error = %err, "unknown scenario");
                return Err(err);
            }
        };

        let mut report = ScenarioReport::default();
        for i in 1..=times {
            match scenario.call(&self.api).await {
                Ok(body) => {
                    report.succeeded += 1;
                    info!(scenario = name, call = i, of = times, response = %body, "response");
                }
                Err(err) => {
                    report.failed += 1;
                    error!(scenario = name, call = i, of = times, error = %err, "call failed");
                }
            }
            tokio::time::sleep(delay).await;
        }

        info!(
            scenario = name,
            times,
            succeeded = report.succeeded,
            failed = report.failed,
            "completed calling endpoint"
        );
        Ok(report)
    }

    /// Runs every step in order. Steps naming an unknown scenario are skipped.
    pub async fn run_plan(&self, steps: &[PlanStep]) -> Vec<DriverResult<ScenarioReport>> {
        let mut results = Vec::new();
        for step in steps {
            match step {
                PlanStep::Run {
                    scenario,
                    times,
                    delay,
                } => results.push(self.run_scenario(scenario, *times, *delay).await),
                PlanStep::Wait(duration) => {
                    info!(secs = duration.as_secs_f64(), "waiting");
                    tokio::time::sleep(*duration).await;
                }
            }
        }
        results
    }
}
