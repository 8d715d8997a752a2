//! HTTP batch source.
//!
//! Polls `GET {base}/api/solve-cvrp?action=poll` (`204` = nothing waiting, `200` =
//! `{request_id, data: {customers: [{id, demand, x, y}]}}`) and submits results with
//! `POST {base}/api/solve-cvrp?action=response`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::BatchSource;
use crate::error::SourceError;
use crate::model::{Batch, Demand, DemandRecord, Location, SolutionReport};

const ENDPOINT: &str = "/api/solve-cvrp";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct PollBody {
    request_id: String,
    data: PollData,
}

#[derive(Deserialize)]
struct PollData {
    customers: Vec<Customer>,
}

/// Backends send ids either as numbers or as numeric strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Number(u64),
    Text(String),
}

#[derive(Deserialize)]
struct Customer {
    id: WireId,
    demand: u32,
    x: f64,
    y: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResponseBody<'a> {
    #[serde(rename = "request_id")]
    request_id: &'a str,
    timestamp: u64,
    config_name: &'a str,
    solve_time_ms: u64,
    summary: Summary,
    routes: Vec<WireRoute<'a>>,
    unserved_customers: Vec<WireCustomer<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary {
    total_items_requested: u64,
    total_items_delivered: u64,
    total_distance: f64,
    number_of_routes: usize,
    delivery_rate: f64,
    unserved_customers: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRoute<'a> {
    route_id: u64,
    vehicle_name: &'a str,
    total_demand: u32,
    total_distance: f64,
    customers: Vec<WireCustomer<'a>>,
}

#[derive(Serialize)]
struct WireCustomer<'a> {
    id: String,
    name: &'a str,
    x: f64,
    y: f64,
    demand: u32,
}

impl<'a> From<&'a DemandRecord> for WireCustomer<'a> {
    fn from(d: &'a DemandRecord) -> Self {
        Self {
            id: d.id.to_string(),
            name: &d.name,
            x: d.x,
            y: d.y,
            demand: d.qty,
        }
    }
}

fn decode_batch(body: PollBody) -> Result<Batch, SourceError> {
    let demands = body
        .data
        .customers
        .into_iter()
        .map(|c| {
            let id = match c.id {
                WireId::Number(n) => n,
                WireId::Text(s) => s.trim().parse().map_err(|_| SourceError::Decode {
                    reason: format!("customer id {s:?} is not numeric"),
                })?,
            };
            Ok(Demand::new(id, c.demand, Location::new(c.x, c.y)))
        })
        .collect::<Result<Vec<_>, SourceError>>()?;
    Ok(Batch::fresh(body.request_id, demands))
}

fn encode_report<'a>(report: &'a SolutionReport, config_name: &'a str) -> ResponseBody<'a> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    ResponseBody {
        request_id: report.batch_id.as_str(),
        timestamp,
        config_name,
        solve_time_ms: report.solve_time_ms,
        summary: Summary {
            total_items_requested: report.total_qty,
            total_items_delivered: report.served_qty,
            total_distance: report.total_distance,
            number_of_routes: report.routes.len(),
            delivery_rate: report.delivery_rate(),
            unserved_customers: report.unplaced.len() + report.infeasible.len(),
        },
        routes: report
            .routes
            .iter()
            .map(|r| WireRoute {
                route_id: r.route_id,
                vehicle_name: &r.worker,
                total_demand: r.total_qty,
                total_distance: r.total_distance,
                customers: r.demands.iter().map(WireCustomer::from).collect(),
            })
            .collect(),
        unserved_customers: report
            .unplaced
            .iter()
            .chain(report.infeasible.iter())
            .map(WireCustomer::from)
            .collect(),
    }
}

/// Batch source backed by a solve-request HTTP backend.
pub struct HttpSource {
    http: reqwest::Client,
    base: String,
    config_name: String,
}

impl HttpSource {
    /// Client for `base` (scheme and host, no trailing path).
    pub fn new(base: impl Into<String>) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| SourceError::Transport {
                reason: e.to_string(),
            })?;
        Ok(Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
            config_name: "routevisor".to_string(),
        })
    }

    /// Name reported as `configName` in submitted results.
    pub fn with_config_name(mut self, name: impl Into<String>) -> Self {
        self.config_name = name.into();
        self
    }

    fn url(&self, action: &str) -> String {
        format!("{}{ENDPOINT}?action={action}", self.base)
    }
}

fn transport(e: reqwest::Error) -> SourceError {
    SourceError::Transport {
        reason: e.to_string(),
    }
}

#[async_trait]
impl BatchSource for HttpSource {
    async fn poll_next_batch(&self) -> Result<Option<Batch>, SourceError> {
        let response = self.http.get(self.url("poll")).send().await.map_err(transport)?;
        match response.status() {
            StatusCode::NO_CONTENT => return Ok(None),
            StatusCode::OK => {}
            other => {
                return Err(SourceError::Status {
                    status: other.as_u16(),
                });
            }
        }

        let bytes = response.bytes().await.map_err(transport)?;
        let body: PollBody = serde_json::from_slice(&bytes).map_err(|e| SourceError::Decode {
            reason: e.to_string(),
        })?;
        tracing::debug!(request = %body.request_id, customers = body.data.customers.len(), "batch polled");
        decode_batch(body).map(Some)
    }

    async fn submit_solution(&self, report: &SolutionReport) -> Result<(), SourceError> {
        let body = encode_report(report, &self.config_name);
        let response = self
            .http
            .post(self.url("response"))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(SourceError::Status {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
