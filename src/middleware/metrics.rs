use crate::state::AppState;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error,
};
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    time::Instant,
};

pub struct MetricsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = MetricsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService { service }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: S,
}

/// Metric key for a request.
///
/// WebSocket upgrades get their own `WS` label: the measured duration covers
/// only the upgrade handshake, not the relay session behind it, and mixing
/// that with REST latency stats would make both unreadable.
fn endpoint_label(req: &ServiceRequest) -> String {
    if req.headers().contains_key("upgrade") {
        format!("WS {}", req.uri().path())
    } else {
        format!("{} {}", req.method(), req.uri().path())
    }
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let endpoint = endpoint_label(&req);

        if let Some(app_state) = req.app_data::<web::Data<AppState>>() {
            app_state.increment_request_count();
        }

        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;
            let duration_ms = start_time.elapsed().as_millis() as u64;

            let is_error = match &result {
                Ok(response) => {
                    response.status().is_client_error() || response.status().is_server_error()
                }
                Err(_) => true,
            };

            if let Ok(response) = &result {
                if let Some(app_state) = response.request().app_data::<web::Data<AppState>>() {
                    app_state.record_endpoint_request(&endpoint, duration_ms, is_error);

                    if is_error {
                        app_state.increment_error_count();
                    }
                }
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use actix_web::{test, App, HttpResponse};

    #[actix_web::test]
    async fn test_upgrade_requests_get_ws_label() {
        let state = web::Data::new(AppState::new(AppConfig::default()));

        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .wrap(MetricsMiddleware)
                .route("/ws/voice", web::get().to(HttpResponse::Ok))
                .route("/api/v1/health", web::get().to(HttpResponse::Ok)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/ws/voice")
            .insert_header(("upgrade", "websocket"))
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::get().uri("/api/v1/health").to_request();
        test::call_service(&app, req).await;

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.request_count, 2);
        assert!(snapshot.endpoint_metrics.contains_key("WS /ws/voice"));
        assert!(snapshot.endpoint_metrics.contains_key("GET /api/v1/health"));
        assert!(!snapshot.endpoint_metrics.contains_key("GET /ws/voice"));
    }

    #[actix_web::test]
    async fn test_error_responses_counted() {
        let state = web::Data::new(AppState::new(AppConfig::default()));

        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .wrap(MetricsMiddleware)
                .route("/missing", web::get().to(HttpResponse::NotFound)),
        )
        .await;

        let req = test::TestRequest::get().uri("/missing").to_request();
        test::call_service(&app, req).await;

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.error_count, 1);
        let metric = snapshot.endpoint_metrics.get("GET /missing").unwrap();
        assert_eq!(metric.error_count, 1);
    }
}
