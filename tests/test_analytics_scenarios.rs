//! End-to-end analytics scenarios over a seeded SQLite store
//!
//! Covers the reference-period flow: resolver picks the latest (year, month),
//! every service compares the same months across years, and the top-N
//! reducer keeps the period total intact.

mod common;

#[cfg(test)]
mod analytics_scenario_tests {
    use super::common::{monthly, reference_store, store_with, trade, TradeRow};
    use comexflow::analytics::{
        DistributionService, KpiEngine, PeriodResolver, SeriesService, TrendService,
    };
    use comexflow::{Dimension, FlowType, ReferencePeriod};
    use std::sync::Arc;

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.map(|a| (a - b).abs() < 1e-9).unwrap_or(false)
    }

    #[tokio::test]
    async fn test_reference_period_and_half_year_kpis() {
        let store = Arc::new(reference_store());
        let resolver = PeriodResolver::new(store.clone());

        let period = resolver.resolve(FlowType::Import).await.unwrap().unwrap();
        assert_eq!(
            period,
            ReferencePeriod {
                latest_year: 2024,
                latest_month: 6
            }
        );

        let kpis = KpiEngine::new(store)
            .compute(FlowType::Import, 2024)
            .await
            .unwrap();

        // H1 2024: 9 t, 21.6k USD; H1 2023: 6 t, 12k USD
        assert_eq!(kpis.month_ceiling, Some(6));
        assert!(approx(kpis.volume_t, 9.0));
        assert!(approx(kpis.prior_volume_t, 6.0));
        assert!(approx(kpis.value_musd, 0.0216));
        assert!(approx(kpis.delta_volume, 0.5));
        assert!(approx(kpis.delta_value, 0.8));
        assert!(approx(kpis.price_usd_per_t, 2_400.0));
        assert!(approx(kpis.delta_price, 0.2));
    }

    #[tokio::test]
    async fn test_flows_resolve_independently() {
        let store = Arc::new(reference_store());
        let resolver = PeriodResolver::new(store.clone());

        let export = resolver.resolve(FlowType::Export).await.unwrap().unwrap();
        assert_eq!((export.latest_year, export.latest_month), (2023, 12));

        // 2023 exports against an empty 2022: no baseline, no deltas
        let kpis = KpiEngine::new(store)
            .compute(FlowType::Export, 2023)
            .await
            .unwrap();
        assert!(approx(kpis.volume_t, 6.0));
        assert_eq!(kpis.delta_volume, None);
        assert_eq!(kpis.delta_price, None);
        assert!(approx(kpis.price_usd_per_t, 10_000.0));
    }

    #[tokio::test]
    async fn test_top_five_countries_with_other() {
        let countries = [
            ("BR", 50.0),
            ("CL", 40.0),
            ("NO", 30.0),
            ("PE", 20.0),
            ("AR", 10.0),
            ("CN", 5.0),
            ("VN", 3.0),
            ("EC", 2.0),
        ];
        let rows: Vec<TradeRow> = countries
            .iter()
            .map(|(c, v)| TradeRow {
                country: Some(*c),
                ..trade(2024, 3, *v, 0.0)
            })
            .collect();
        let service = DistributionService::new(Arc::new(store_with(&rows, &[])));

        let report = service
            .distribution(FlowType::Import, None, Dimension::Country, 5)
            .await
            .unwrap()
            .unwrap();

        let volumes: Vec<f64> = report.rows.iter().map(|r| r.volume_kg).collect();
        assert_eq!(volumes, vec![50.0, 40.0, 30.0, 20.0, 10.0, 10.0]);
        assert_eq!(report.rows.last().unwrap().key, "Other");
        assert_eq!(volumes.iter().sum::<f64>(), report.total_kg);
    }

    #[tokio::test]
    async fn test_cumulative_series_resets_each_year() {
        let service = SeriesService::new(Arc::new(reference_store()));

        let report = service
            .cumulative(FlowType::Import, None, 5)
            .await
            .unwrap()
            .unwrap();

        let current = report.current.unwrap();
        let prior = report.prior.unwrap();
        assert_eq!(current.points[0].cumulative_kg, 1_500.0);
        assert_eq!(prior.points[0].cumulative_kg, 1_000.0);
        assert_eq!(prior.points.last().unwrap().cumulative_kg, 12_000.0);
        for series in [&current, &prior] {
            assert!(series
                .points
                .windows(2)
                .all(|w| w[1].cumulative_kg >= w[0].cumulative_kg));
        }
        // Only 2023 precedes 2024 in the store
        assert!(report.envelope.iter().all(|e| e.sample_years == 1));
    }

    #[tokio::test]
    async fn test_history_and_evolution_respect_ceiling() {
        let mut imports = monthly(2023, 1..=12, 1_000.0, 2_000.0);
        imports.extend(monthly(2024, 1..=6, 1_500.0, 3_600.0));
        imports.push(TradeRow {
            species: Some("Salmon"),
            ..trade(2024, 2, 100.0, 0.0)
        });
        let service = TrendService::new(Arc::new(store_with(&imports, &[])));

        let history = service
            .volume_price_history(FlowType::Import, None, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(history.points.len(), 2);
        assert_eq!(history.points[0].volume_t, 6.0);
        assert_eq!(history.points[1].volume_t, 9.1);

        let evolution = service
            .dimension_evolution(FlowType::Import, None, 1, Dimension::Species, 1)
            .await
            .unwrap()
            .unwrap();
        // "Not informed" dominates 2024, Salmon rolls into Other
        assert_eq!(evolution.keys, vec!["Not informed", "Other"]);
        let total: f64 = evolution.points.iter().map(|p| p.volume_kg).sum();
        assert_eq!(total, 6_000.0 + 9_100.0);
    }

    #[test]
    fn test_invalid_parameters_rejected_before_querying() {
        assert!(FlowType::parse("reexport").is_err());
        assert!(Dimension::parse("weight_kg").is_err());
        assert_eq!(FlowType::parse("EXPO").unwrap(), FlowType::Export);
        assert_eq!(Dimension::parse("uf").unwrap(), Dimension::State);
    }
}
