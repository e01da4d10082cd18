use crate::http::{full_body, make_boxed_error_response};
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

/// Serves `/health` (process is up) and `/ready` (the readiness probe passes).
///
/// The probe is asynchronous so it can check remote dependencies such as the
/// backing store. It is only invoked for `/ready`.
pub struct AdminService<F, E> {
    is_ready: F,
    _error: PhantomData<fn() -> E>,
}

impl<F, Fut, E> AdminService<F, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    pub fn new(is_ready: F) -> Self {
        Self {
            is_ready,
            _error: PhantomData,
        }
    }
}

impl<F, Fut, E> Service<Request<Incoming>> for AdminService<F, E>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
    E: Send + 'static,
{
    type Response = Response<BoxBody<Bytes, E>>;
    type Error = E;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let route = AdminRoute::from_path(req.uri().path());
        let probe = match route {
            AdminRoute::Ready => Some((self.is_ready)()),
            _ => None,
        };

        Box::pin(async move { Ok(respond(route, probe).await) })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AdminRoute {
    Health,
    Ready,
    Unknown,
}

impl AdminRoute {
    fn from_path(path: &str) -> Self {
        match path {
            "/health" => AdminRoute::Health,
            "/ready" => AdminRoute::Ready,
            _ => AdminRoute::Unknown,
        }
    }
}

async fn respond<Fut, E>(route: AdminRoute, probe: Option<Fut>) -> Response<BoxBody<Bytes, E>>
where
    Fut: Future<Output = bool>,
    E: 'static,
{
    match (route, probe) {
        (AdminRoute::Health, _) => Response::new(full_body("ok\n")),
        (AdminRoute::Ready, Some(probe)) => match probe.await {
            true => Response::new(full_body("ok\n")),
            false => make_boxed_error_response(StatusCode::SERVICE_UNAVAILABLE),
        },
        _ => make_boxed_error_response(StatusCode::NOT_FOUND),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::run_http_service;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn test_route_from_path() {
        assert_eq!(AdminRoute::from_path("/health"), AdminRoute::Health);
        assert_eq!(AdminRoute::from_path("/ready"), AdminRoute::Ready);
        assert_eq!(AdminRoute::from_path("/metrics"), AdminRoute::Unknown);
    }

    #[tokio::test]
    async fn test_admin_endpoints() {
        let ready = Arc::new(AtomicBool::new(false));
        let flag = ready.clone();
        let service = AdminService::<_, std::io::Error>::new(move || {
            let flag = flag.clone();
            async move { flag.load(Ordering::Relaxed) }
        });

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        tokio::spawn(run_http_service("127.0.0.1", port, service));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let base = format!("http://127.0.0.1:{port}");
        let client = reqwest::Client::new();

        let health = client.get(format!("{base}/health")).send().await.unwrap();
        assert_eq!(health.status(), 200);

        let not_ready = client.get(format!("{base}/ready")).send().await.unwrap();
        assert_eq!(not_ready.status(), 503);

        ready.store(true, Ordering::Relaxed);
        let now_ready = client.get(format!("{base}/ready")).send().await.unwrap();
        assert_eq!(now_ready.status(), 200);

        let missing = client.get(format!("{base}/nope")).send().await.unwrap();
        assert_eq!(missing.status(), 404);
    }
}
