use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::client::{ApiError, ApiRequest, Backend};
use crate::models::lenient_number;
use crate::table::Tone;
use crate::utils::{format_grouped, format_trend, EMPTY_CELL};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum KpiMetric {
    TotalRevenue,
    NetProfit,
    TotalQuantityOrdered,
    NewCustomers,
    TotalQuantityReceived,
    AverageDiscount,
}

impl KpiMetric {
    pub const ALL: [KpiMetric; 6] = [
        KpiMetric::TotalRevenue,
        KpiMetric::NetProfit,
        KpiMetric::TotalQuantityOrdered,
        KpiMetric::NewCustomers,
        KpiMetric::TotalQuantityReceived,
        KpiMetric::AverageDiscount,
    ];

    pub fn endpoint(self) -> &'static str {
        match self {
            Self::TotalRevenue => "total-revenue",
            Self::NetProfit => "net-profit",
            Self::TotalQuantityOrdered => "total-quantity-ordered",
            Self::NewCustomers => "new-customers",
            Self::TotalQuantityReceived => "total-quantity-received",
            Self::AverageDiscount => "average-discount",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::TotalRevenue => "Total revenue",
            Self::NetProfit => "Net profit",
            Self::TotalQuantityOrdered => "Quantity ordered",
            Self::NewCustomers => "New customers",
            Self::TotalQuantityReceived => "Quantity received",
            Self::AverageDiscount => "Average discount",
        }
    }

    pub fn format_value(self, value: f64) -> String {
        match self {
            Self::TotalRevenue | Self::NetProfit => format!("฿{}", format_grouped(value, 2)),
            Self::TotalQuantityOrdered | Self::TotalQuantityReceived => {
                format!("{} units", format_grouped(value.round(), 0))
            }
            Self::NewCustomers => format_grouped(value.trunc(), 0),
            Self::AverageDiscount => format!("{:.1}%", value * 100.0),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KpiReading {
    pub metric: KpiMetric,
    pub label: &'static str,
    pub value: Option<f64>,
    pub trend: Option<f64>,
    pub display_value: String,
    pub display_trend: String,
    pub trend_tone: Tone,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl KpiReading {
    fn failed(metric: KpiMetric, error: &ApiError) -> Self {
        Self {
            metric,
            label: metric.label(),
            value: None,
            trend: None,
            display_value: "Error".to_string(),
            display_trend: EMPTY_CELL.to_string(),
            trend_tone: Tone::Plain,
            error: Some(error.message().to_string()),
        }
    }
}

fn trend_tone(trend: Option<f64>) -> Tone {
    match trend {
        Some(t) if t > 0.0 => Tone::Positive,
        Some(t) if t < 0.0 => Tone::Negative,
        _ => Tone::Plain,
    }
}

pub fn parse_reading(metric: KpiMetric, payload: Option<&Value>) -> KpiReading {
    let value = payload.and_then(|p| p.get("value")).and_then(lenient_number);
    let trend = payload.and_then(|p| p.get("trend")).and_then(lenient_number);
    KpiReading {
        metric,
        label: metric.label(),
        value,
        trend,
        display_value: value
            .map(|v| metric.format_value(v))
            .unwrap_or_else(|| EMPTY_CELL.to_string()),
        display_trend: trend
            .map(format_trend)
            .unwrap_or_else(|| EMPTY_CELL.to_string()),
        trend_tone: trend_tone(trend),
        error: None,
    }
}

pub async fn fetch_metric<B: Backend>(backend: &B, metric: KpiMetric) -> KpiReading {
    match backend.send(ApiRequest::get([metric.endpoint()])).await {
        Ok(payload) => parse_reading(metric, payload.as_ref()),
        Err(e) => {
            warn!(
                metric = metric.endpoint(),
                kind = e.kind().label(),
                "kpi fetch failed: {}",
                e.message()
            );
            KpiReading::failed(metric, &e)
        }
    }
}

pub async fn fetch_all<B: Backend>(backend: &B) -> Vec<KpiReading> {
    join_all(
        KpiMetric::ALL
            .iter()
            .map(|metric| fetch_metric(backend, *metric)),
    )
    .await
}
