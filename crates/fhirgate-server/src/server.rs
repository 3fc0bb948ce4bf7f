use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, header},
    middleware,
    routing::{MethodRouter, get, post},
};
use fhirgate_api::FHIR_JSON_CONTENT_TYPE;
use fhirgate_client::{AttributionClient, ClientResult, DataClient, JobClient, ServiceClient};
use fhirgate_core::{ResourceValidator, SchemaValidator};
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::middleware::{RequestId, request_id};
use crate::operations::{data, export, group, jobs, organization};
use crate::pipeline::{
    AuthCtx, ExportSinceParamCtx, ExportTypesParamCtx, FileNameCtx, GroupCtx, JobCtx,
    OrganizationCtx, Pipeline, ProvenanceHeaderValidator, RequestIpCtx, RequestUrlCtx,
    run_pipeline,
};
use crate::handlers;

/// Collaborators and configuration shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub attribution: Arc<dyn AttributionClient>,
    pub jobs: Arc<dyn JobClient>,
    pub data: Arc<dyn DataClient>,
    pub group_validator: Arc<dyn ResourceValidator>,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    pub fn new(
        config: GatewayConfig,
        attribution: Arc<dyn AttributionClient>,
        jobs: Arc<dyn JobClient>,
        data: Arc<dyn DataClient>,
    ) -> Self {
        Self {
            attribution,
            jobs,
            data,
            group_validator: Arc::new(SchemaValidator::r4()),
            config: Arc::new(config),
        }
    }

    /// One HTTP client serves all three collaborators; they share a base url.
    pub fn from_config(config: GatewayConfig) -> ClientResult<Self> {
        let client = Arc::new(ServiceClient::new(config.client_config())?);
        Ok(Self::new(config, client.clone(), client.clone(), client))
    }

    pub fn with_group_validator(mut self, validator: Arc<dyn ResourceValidator>) -> Self {
        self.group_validator = validator;
        self
    }
}

fn staged(route: MethodRouter<AppState>, pipeline: Pipeline) -> MethodRouter<AppState> {
    route.layer(middleware::from_fn_with_state(pipeline, run_pipeline))
}

fn api_routes(config: &GatewayConfig) -> Router<AppState> {
    let strict = config.api.strict_provenance;

    Router::new()
        .route("/metadata", get(handlers::metadata))
        .route(
            "/Organization/{organizationID}",
            staged(
                get(organization::read),
                Pipeline::new().stage(RequestIpCtx).stage(OrganizationCtx),
            ),
        )
        .route(
            "/Group",
            staged(
                post(group::create),
                Pipeline::new()
                    .stage(RequestIpCtx)
                    .stage(AuthCtx)
                    .stage(ProvenanceHeaderValidator::new(strict)),
            ),
        )
        .route(
            "/Group/{groupID}",
            get(group::read).put(group::update).delete(group::delete),
        )
        .route(
            "/Group/{groupID}/$export",
            staged(
                get(export::group_export),
                Pipeline::new()
                    .stage(RequestIpCtx)
                    .stage(AuthCtx)
                    .stage(RequestUrlCtx)
                    .stage(GroupCtx)
                    .stage(ExportTypesParamCtx)
                    .stage(ExportSinceParamCtx),
            ),
        )
        .route(
            "/Jobs/{jobID}",
            staged(
                get(jobs::status),
                Pipeline::new().stage(RequestIpCtx).stage(AuthCtx).stage(JobCtx),
            ),
        )
        .route(
            "/Data/{fileName}",
            staged(
                get(data::get_file),
                Pipeline::new()
                    .stage(RequestIpCtx)
                    .stage(AuthCtx)
                    .stage(FileNameCtx),
            ),
        )
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_TYPE,
            HeaderValue::from_static(FHIR_JSON_CONTENT_TYPE),
        ))
}

pub fn build_app(state: AppState) -> Router {
    let config = state.config.clone();
    let api = api_routes(&config);

    let router = Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz));
    // axum refuses to nest at the root
    let router = match config.route_prefix() {
        "" => router.merge(api),
        prefix => router.nest(prefix, api),
    };

    router
        .fallback(handlers::fallback)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let request_id = req
                        .extensions()
                        .get::<RequestId>()
                        .map(|id| id.as_str())
                        .unwrap_or("");
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = tracing::field::Empty,
                        request_id = %request_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record("http.status_code", res.status().as_u16());
                        tracing::info!(
                            http.status = res.status().as_u16(),
                            elapsed_ms = latency.as_millis() as u64,
                            "request handled"
                        );
                    },
                ),
        )
        // outermost so the trace span already sees the id
        .layer(middleware::from_fn(request_id))
        .layer(DefaultBodyLimit::max(config.server.body_limit_bytes))
}

pub struct FhirGateServer {
    addr: SocketAddr,
    app: Router,
}

#[derive(Default)]
pub struct ServerBuilder {
    config: GatewayConfig,
    state: Option<AppState>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, cfg: GatewayConfig) -> Self {
        self.config = cfg;
        self
    }

    /// Use prebuilt collaborators; the state's configuration wins.
    pub fn with_state(mut self, state: AppState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn build(self) -> anyhow::Result<FhirGateServer> {
        let state = match self.state {
            Some(state) => state,
            None => AppState::from_config(self.config)?,
        };
        Ok(FhirGateServer {
            addr: state.config.addr(),
            app: build_app(state),
        })
    }
}

impl FhirGateServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!(addr = %self.addr, "listening");
        axum::serve(
            listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
