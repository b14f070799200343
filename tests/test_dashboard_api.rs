//! Router tests driven through `tower::ServiceExt::oneshot`

mod common;

#[cfg(test)]
mod dashboard_api_tests {
    use super::common::{
        app_state, app_state_with, broken_store, reference_store, store_with, tariff_store,
    };
    use axum::body::{self, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use comexflow::web::router;
    use comexflow::DashboardConfig;
    use serde_json::Value;
    use tower::ServiceExt; // for `oneshot`

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(resp: Response) -> Value {
        let bytes = body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn etag(resp: &Response) -> String {
        resp.headers()
            .get(header::ETAG)
            .expect("missing ETag")
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_health_and_version() {
        let app = router(app_state(reference_store(), "20240701T000000Z"));

        let resp = app.clone().oneshot(get("/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["status"], "ok");

        let resp = app.oneshot(get("/__version__")).await.unwrap();
        let body = json_body(resp).await;
        assert_eq!(body["build_tag"], "dev");
        assert_eq!(body["cache_version"], "20240701T000000Z");
    }

    #[tokio::test]
    async fn test_max_period_per_flow() {
        let app = router(app_state(reference_store(), "v1"));

        let resp = app.oneshot(get("/health/maxperiod")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["import"]["latest_year"], 2024);
        assert_eq!(body["import"]["latest_month"], 6);
        assert_eq!(body["export"]["latest_month"], 12);
    }

    #[tokio::test]
    async fn test_index_redirects_to_overview() {
        let app = router(app_state(reference_store(), "v1"));

        let resp = app.oneshot(get("/")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(resp.headers()[header::LOCATION], "/api/overview");
    }

    #[tokio::test]
    async fn test_kpis_etag_and_not_modified() {
        let app = router(app_state(reference_store(), "v1"));

        let resp = app.clone().oneshot(get("/api/kpis")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CACHE_CONTROL], "no-cache");
        let tag = etag(&resp);
        let body = json_body(resp).await;
        assert_eq!(body["data"]["year"], 2024);
        assert_eq!(body["data"]["month_ceiling"], 6);
        assert!((body["data"]["delta_volume"].as_f64().unwrap() - 0.5).abs() < 1e-9);

        let revalidate = Request::builder()
            .uri("/api/kpis")
            .header(header::IF_NONE_MATCH, &tag)
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(revalidate).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(etag(&resp), tag);
        let bytes = body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());

        // A different selection does not match the old validator
        let other_year = Request::builder()
            .uri("/api/kpis?year=2023")
            .header(header::IF_NONE_MATCH, &tag)
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(other_year).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_ne!(etag(&resp), tag);
    }

    #[tokio::test]
    async fn test_version_bump_changes_etag() {
        let before = router(app_state(reference_store(), "v1"))
            .oneshot(get("/api/distribution"))
            .await
            .unwrap();
        let after = router(app_state(reference_store(), "v2"))
            .oneshot(get("/api/distribution"))
            .await
            .unwrap();

        assert_ne!(etag(&before), etag(&after));
    }

    #[tokio::test]
    async fn test_invalid_parameters_are_bad_requests() {
        let app = router(app_state(reference_store(), "v1"));

        for uri in [
            "/api/kpis?flow=transit",
            "/api/distribution?dimension=value_usd",
            "/api/overview?year=abc",
            "/api/breakdown?secondary=nope",
        ] {
            let resp = app.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", uri);
            assert!(json_body(resp).await["error"].is_string());
        }
    }

    #[tokio::test]
    async fn test_legacy_parameters() {
        let app = router(app_state(reference_store(), "v1"));

        let resp = app
            .oneshot(get("/api/distribution?tipo=expo&filtro=uf"))
            .await
            .unwrap();
        let body = json_body(resp).await;
        assert_eq!(body["data"]["flow"], "export");
        assert_eq!(body["data"]["dimension"], "state");
        assert_eq!(body["data"]["year"], 2023);
    }

    #[tokio::test]
    async fn test_store_failure_is_service_unavailable() {
        let app = router(app_state(broken_store(), "v1"));

        for uri in ["/api/kpis", "/api/overview", "/health/maxperiod", "/debug/db"] {
            let resp = app.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_empty_store_reports_no_data() {
        let app = router(app_state(store_with(&[], &[]), "v1"));

        let resp = app.clone().oneshot(get("/api/overview")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["message"], "no data for this selection");
        assert!(body["kpis"].is_null());

        let resp = app.oneshot(get("/api/series")).await.unwrap();
        let body = json_body(resp).await;
        assert!(body["data"].is_null());
        assert_eq!(body["message"], "no data for this selection");
    }

    #[tokio::test]
    async fn test_charts_render_figures() {
        let app = router(app_state(reference_store(), "v1"));

        let resp = app.oneshot(get("/api/charts")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        let figures = &body["figures"];
        assert_eq!(figures["history"]["data"][0]["type"], "bar");
        assert_eq!(figures["distribution"]["data"][0]["type"], "pie");
        assert_eq!(figures["cumulative"]["data"][0]["type"], "box");
        // Jan 2024 cumulative: 1 500 kg plotted as 1.5 t
        let current = &figures["cumulative"]["data"][2];
        assert_eq!(current["name"], "2024");
        assert_eq!(current["y"][0], 1.5);
        // Seeded rows carry no country or species
        assert_eq!(figures["breakdown"]["data"][0]["labels"][0], "Not informed");
    }

    #[tokio::test]
    async fn test_tariff_drill_down() {
        let app = router(app_state(tariff_store(), "v1"));

        let resp = app.clone().oneshot(get("/api/tariff")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(
            body["data"]["tariff_codes"],
            serde_json::json!(["03021100", "03061711"])
        );
        assert!(body["figure"]["placeholder"].is_string());

        let resp = app
            .clone()
            .oneshot(get("/api/tariff?ncm=03021100&dimension=country"))
            .await
            .unwrap();
        let tag = etag(&resp);
        let body = json_body(resp).await;
        assert_eq!(body["data"]["keys"], serde_json::json!(["CL", "NO"]));
        let points = body["data"]["points"].as_array().unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0]["price_usd_per_t"], 5_000.0);
        assert_eq!(body["figure"]["data"][0]["name"], "CL");
        assert_eq!(body["figure"]["layout"]["yaxis"]["title"]["text"], "USD/t");

        // Another code is another validator
        let resp = app
            .clone()
            .oneshot(get("/api/tariff?ncm=03061711&dimension=country"))
            .await
            .unwrap();
        assert_ne!(etag(&resp), tag);

        let resp = app
            .oneshot(get("/api/tariff?tariff_code=0302%27%20OR%201%3D1"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_charts_include_tariff_figure() {
        let app = router(app_state(tariff_store(), "v1"));

        let resp = app
            .clone()
            .oneshot(get("/api/charts?ncm=03021100&dimension=country"))
            .await
            .unwrap();
        let body = json_body(resp).await;
        assert_eq!(body["figures"]["tariff"]["data"][0]["type"], "scatter");

        let resp = app.oneshot(get("/api/charts")).await.unwrap();
        let body = json_body(resp).await;
        assert!(body["figures"]["tariff"]["placeholder"].is_string());
    }

    #[tokio::test]
    async fn test_frame_ancestors_header() {
        let config = DashboardConfig {
            frame_ancestors: Some("https://example.org".to_string()),
            ..DashboardConfig::default()
        };
        let app = router(app_state_with(reference_store(), "v1", config));

        let resp = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(
            resp.headers()[header::CONTENT_SECURITY_POLICY],
            "frame-ancestors https://example.org"
        );

        let resp = router(app_state(reference_store(), "v1"))
            .oneshot(get("/health"))
            .await
            .unwrap();
        assert!(resp.headers().get(header::CONTENT_SECURITY_POLICY).is_none());
    }

    #[tokio::test]
    async fn test_debug_db_counts_rows() {
        let app = router(app_state(reference_store(), "v1"));

        let resp = app.oneshot(get("/debug/db")).await.unwrap();
        let body = json_body(resp).await;
        assert_eq!(body["tables"]["trade_imports"]["rows"], 18);
        assert_eq!(body["tables"]["trade_exports"]["rows"], 12);
    }
}
