//! Query-string parameters shared by the dashboard routes

use super::ApiError;
use crate::analytics::{Dimension, FlowType};
use crate::config::DashboardConfig;
use serde::Deserialize;

/// Raw query string; the legacy names `tipo`, `ano`, `filtro` and `ncm` are
/// accepted as aliases
#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    #[serde(alias = "tipo")]
    pub flow: Option<String>,
    #[serde(alias = "ano")]
    pub year: Option<String>,
    #[serde(alias = "filtro")]
    pub dimension: Option<String>,
    pub top_n: Option<String>,
    pub primary: Option<String>,
    pub secondary: Option<String>,
    #[serde(alias = "ncm")]
    pub tariff_code: Option<String>,
}

/// Longest tariff code accepted (HS/NCM codes are 8 digits, dotted forms 10)
const MAX_TARIFF_CODE_LEN: usize = 16;

/// Validated selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub flow: FlowType,
    pub year: Option<i32>,
    pub dimension: Dimension,
    pub top_n: usize,
    pub primary: Dimension,
    pub secondary: Dimension,
    pub history_years: i32,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl DashboardQuery {
    /// Selected tariff code, if any: ASCII digits, letters and dots only
    pub fn tariff_code(&self) -> Result<Option<String>, ApiError> {
        let Some(code) = present(&self.tariff_code) else {
            return Ok(None);
        };
        let valid = code.len() <= MAX_TARIFF_CODE_LEN
            && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '.');
        if !valid {
            return Err(ApiError::BadParameter(format!(
                "Invalid tariff_code: '{}'",
                code
            )));
        }
        Ok(Some(code.to_string()))
    }

    /// Validate against the allow-lists, filling defaults from `config`
    pub fn resolve(&self, config: &DashboardConfig) -> Result<Selection, ApiError> {
        let flow = present(&self.flow)
            .map(FlowType::parse)
            .transpose()?
            .unwrap_or_default();

        let dimension = present(&self.dimension)
            .map(Dimension::parse)
            .transpose()?
            .unwrap_or_default();

        let year = present(&self.year)
            .map(|y| {
                y.parse::<i32>()
                    .ok()
                    .filter(|y| (1900..=9999).contains(y))
                    .ok_or_else(|| ApiError::BadParameter(format!("Invalid year: '{}'", y)))
            })
            .transpose()?;

        let top_n = present(&self.top_n)
            .map(|n| {
                n.parse::<usize>()
                    .ok()
                    .filter(|n| (1..=50).contains(n))
                    .ok_or_else(|| ApiError::BadParameter(format!("Invalid top_n: '{}'", n)))
            })
            .transpose()?
            .unwrap_or(config.top_n);

        let primary = present(&self.primary)
            .map(Dimension::parse)
            .transpose()?
            .unwrap_or(Dimension::Country);
        let secondary = present(&self.secondary)
            .map(Dimension::parse)
            .transpose()?
            .unwrap_or(Dimension::Species);

        Ok(Selection {
            flow,
            year,
            dimension,
            top_n,
            primary,
            secondary,
            history_years: config.history_years,
        })
    }
}
