//! Error taxonomy for the analytics layer
//!
//! "No data for the period" is not an error: it travels as `None` or an empty
//! collection. Division by zero never surfaces either; guarded ratios return
//! `None`.

#[derive(Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    /// Flow type outside the import/export allow-list
    InvalidFlowType(String),
    /// Dimension outside the categorical column allow-list
    InvalidDimension(String),
    /// Connection, lock timeout or query execution failure
    StoreUnavailable(String),
}

impl AnalyticsError {
    /// Request-parameter errors, rejected before any query runs
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            AnalyticsError::InvalidFlowType(_) | AnalyticsError::InvalidDimension(_)
        )
    }
}

impl From<rusqlite::Error> for AnalyticsError {
    fn from(err: rusqlite::Error) -> Self {
        AnalyticsError::StoreUnavailable(err.to_string())
    }
}

impl std::fmt::Display for AnalyticsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalyticsError::InvalidFlowType(t) => {
                write!(f, "Invalid flow type: '{}' (expected import or export)", t)
            }
            AnalyticsError::InvalidDimension(d) => write!(
                f,
                "Invalid dimension: '{}' (expected country, state, tariff_code, species or category)",
                d
            ),
            AnalyticsError::StoreUnavailable(e) => write!(f, "Store unavailable: {}", e),
        }
    }
}

impl std::error::Error for AnalyticsError {}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_errors_map_to_store_unavailable() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err: AnalyticsError = conn
            .query_row("SELECT MAX(year) FROM missing_table", [], |row| {
                row.get::<_, Option<i32>>(0)
            })
            .unwrap_err()
            .into();

        assert!(matches!(err, AnalyticsError::StoreUnavailable(_)));
        assert!(!err.is_invalid_input());
        assert!(err.to_string().contains("missing_table"));
    }

    #[test]
    fn test_invalid_input_classification() {
        assert!(AnalyticsError::InvalidFlowType("x".into()).is_invalid_input());
        assert!(AnalyticsError::InvalidDimension("y".into()).is_invalid_input());
    }
}
