use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::Extension;
use axum::Form;
use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::extract::Query;
use axum::extract::State;
use axum::extract::rejection::FormRejection;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::MethodRouter;
use axum::routing::get;
use tower::BoxError;
use tower::ServiceBuilder;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::Admitted;
use crate::AdmissionLayer;
use crate::BucketConfig;
use crate::BucketKind;
use crate::LimiterSlot;
use crate::Reply;
use crate::ThrottleError;

/// The limiters held by a running server, one slot per endpoint.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub leaky: Arc<LimiterSlot>,
    pub token: Arc<LimiterSlot>,
}

impl AppState {
    pub fn slot(&self, kind: BucketKind) -> &Arc<LimiterSlot> {
        match kind {
            BucketKind::Leaky => &self.leaky,
            BucketKind::Token => &self.token,
        }
    }

    /// Replace the limiter guarding `kind` with a fresh one built from `config`.
    pub fn configure(&self, kind: BucketKind, config: BucketConfig) {
        self.slot(kind).store(kind.build(config));
        info!(
            bucket = %kind,
            capacity = config.capacity.get(),
            rate = config.rate.get(),
            "bucket configured"
        );
    }
}

#[derive(Debug, Clone)]
struct BucketState {
    kind: BucketKind,
    app: AppState,
}

/// Build the HTTP surface: one admission and configuration route per bucket.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            BucketKind::Leaky.path(),
            bucket_routes(BucketKind::Leaky, state.clone()),
        )
        .route(
            BucketKind::Token.path(),
            bucket_routes(BucketKind::Token, state),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors())
}

fn bucket_routes<S>(kind: BucketKind, app: AppState) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    let admission = ServiceBuilder::new()
        // Renders the BoxError produced by the admission layer
        .layer(HandleErrorLayer::new(handle_throttle_error))
        .layer(AdmissionLayer::new(Arc::clone(app.slot(kind)), kind))
        // Route is infallible; the admission layer wants a BoxError
        .map_err(BoxError::from);

    let admit_route: MethodRouter<BucketState> = get(admit).layer(admission);

    admit_route
        .post(configure)
        .with_state(BucketState { kind, app })
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS, Method::HEAD])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}

async fn admit(
    State(bucket): State<BucketState>,
    Extension(admitted): Extension<Admitted>,
) -> Reply {
    Reply::success("Request processed.").with(bucket.kind.level_field(), admitted.level)
}

async fn configure(
    State(bucket): State<BucketState>,
    Query(mut params): Query<HashMap<String, String>>,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> Result<Reply, ThrottleError> {
    // Body parameters take precedence over the query string
    if let Ok(Form(body)) = form {
        params.extend(body);
    }

    let kind = bucket.kind;
    let config = BucketConfig::from_params(kind, &params).inspect_err(|err| {
        warn!(bucket = %kind, %err, "configuration rejected");
    })?;
    bucket.app.configure(kind, config);

    Ok(
        Reply::success(format!("{} configured successfully.", kind.name()))
            .with("capacity", config.capacity.get())
            .with(kind.rate_param(), config.rate.get()),
    )
}

async fn handle_throttle_error(err: BoxError) -> Response {
    match err.downcast::<ThrottleError>() {
        Ok(err) => (*err).into_response(),
        Err(err) => {
            error!(%err, "admission failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Reply::error("Internal Service Error"),
            )
                .into_response()
        }
    }
}
