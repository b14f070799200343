//! Core data structures for the trade analytics layer
//!
//! `FlowType` and `Dimension` are the closed allow-lists for every SQL
//! identifier the store uses. Nothing else ever reaches query text.

use super::error::AnalyticsError;
use serde::{Deserialize, Serialize};

/// Kilograms per metric tonne
pub const KG_PER_TONNE: f64 = 1_000.0;

/// US dollars per million (presentation unit for trade value)
pub const USD_PER_MILLION: f64 = 1_000_000.0;

/// Label substituted for NULL categorical keys
pub const NOT_INFORMED: &str = "Not informed";

/// Label of the synthetic roll-up bucket
pub const OTHER_LABEL: &str = "Other";

/// Longest trend window, in years before the selected year
pub const MAX_HISTORY_YEARS: i32 = 50;

/// First year of a trend window ending at `year`
pub fn window_start(year: i32, history_years: i32) -> i32 {
    year.saturating_sub(history_years.clamp(0, MAX_HISTORY_YEARS))
}

/// Trade flow partition: one logical table per variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    #[default]
    Import,
    Export,
}

impl FlowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowType::Import => "import",
            FlowType::Export => "export",
        }
    }

    /// Table identifier for this flow
    pub fn table(&self) -> &'static str {
        match self {
            FlowType::Import => "trade_imports",
            FlowType::Export => "trade_exports",
        }
    }

    /// Parse a request parameter; accepts the legacy `impo`/`expo` codes
    pub fn parse(s: &str) -> Result<Self, AnalyticsError> {
        match s.trim().to_lowercase().as_str() {
            "import" | "impo" => Ok(FlowType::Import),
            "export" | "expo" => Ok(FlowType::Export),
            _ => Err(AnalyticsError::InvalidFlowType(s.to_string())),
        }
    }

    pub fn all() -> [FlowType; 2] {
        [FlowType::Import, FlowType::Export]
    }
}

/// Categorical column a distribution can be grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Country,
    #[default]
    State,
    TariffCode,
    Species,
    Category,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Country => "country",
            Dimension::State => "state",
            Dimension::TariffCode => "tariff_code",
            Dimension::Species => "species",
            Dimension::Category => "category",
        }
    }

    /// Column identifier in the trade tables
    pub fn column(&self) -> &'static str {
        match self {
            Dimension::Country => "country",
            Dimension::State => "state",
            Dimension::TariffCode => "tariff_code",
            Dimension::Species => "species",
            Dimension::Category => "category",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Country => "Country",
            Dimension::State => "State",
            Dimension::TariffCode => "Tariff code",
            Dimension::Species => "Species",
            Dimension::Category => "Category",
        }
    }

    /// Parse a request parameter; accepts the legacy column names
    /// (`paises`, `uf`, `ncm`, `especie`, `categoria`)
    pub fn parse(s: &str) -> Result<Self, AnalyticsError> {
        match s.trim().to_lowercase().as_str() {
            "country" | "paises" => Ok(Dimension::Country),
            "state" | "uf" => Ok(Dimension::State),
            "tariff_code" | "ncm" => Ok(Dimension::TariffCode),
            "species" | "especie" => Ok(Dimension::Species),
            "category" | "categoria" => Ok(Dimension::Category),
            _ => Err(AnalyticsError::InvalidDimension(s.to_string())),
        }
    }

    pub fn all() -> [Dimension; 5] {
        [
            Dimension::Country,
            Dimension::State,
            Dimension::TariffCode,
            Dimension::Species,
            Dimension::Category,
        ]
    }
}

/// Most recent (year, month) present for a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencePeriod {
    pub latest_year: i32,
    pub latest_month: u32,
}

impl ReferencePeriod {
    /// Latest month to include when reporting `requested_year`
    ///
    /// The current (possibly partial) year and anything after it are capped
    /// at `latest_month`; a fully elapsed past year has no cap.
    pub fn month_ceiling(&self, requested_year: i32) -> u32 {
        if requested_year >= self.latest_year {
            self.latest_month
        } else {
            12
        }
    }
}

/// Summed weight and value for one (year, months <= ceiling) slice
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PeriodAggregate {
    pub volume_kg: f64,
    pub value_usd: f64,
}

/// Volume of one calendar month
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyVolume {
    pub year: i32,
    pub month: u32,
    pub volume_kg: f64,
}

/// Per-year totals within a month ceiling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearlyTotals {
    pub year: i32,
    pub volume_kg: f64,
    pub value_usd: f64,
}

/// Raw (primary, secondary, volume) row feeding a hierarchical breakdown
#[derive(Debug, Clone, PartialEq)]
pub struct BreakdownSource {
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub volume_kg: f64,
}

/// Weight and value of one tariff code for a (year, dimension key)
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSource {
    pub year: i32,
    pub key: Option<String>,
    pub volume_kg: f64,
    pub value_usd: f64,
}

/// Guarded ratio: `None` instead of a division by zero, NaN or infinity
pub fn safe_ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
        return None;
    }
    let ratio = numerator / denominator;
    ratio.is_finite().then_some(ratio)
}

/// Relative change `(current - prior) / prior` against a non-zero baseline
pub fn relative_delta(current: Option<f64>, prior: Option<f64>) -> Option<f64> {
    let (current, prior) = (current?, prior?);
    safe_ratio(current - prior, prior)
}
