#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use bytes::Bytes;
use fhirgate_client::{
    AttributionClient, CallContext, ClientError, ClientResult, DataClient, JobClient, ResourceKind,
};
use fhirgate_core::{ExportRequest, ResourceValidator};
use fhirgate_server::{AppState, GatewayConfig, build_app};
use serde_json::{Value, json};
use time::OffsetDateTime;
use tower::ServiceExt;

pub const ORG: &str = "c5a40867-011a-43f9-996e-aa92207fbbe2";
pub const ATTRIBUTED_PROVIDER: &str =
    "http://hl7.org/fhir/us/davinci-atr/StructureDefinition/ext-attributedProvider";

/// In-memory attribution, job and data services.
#[derive(Default)]
pub struct FakeServices {
    pub resources: Mutex<HashMap<(ResourceKind, String), Bytes>>,
    pub files: Mutex<HashMap<String, Bytes>>,
    pub jobs: Mutex<HashMap<String, Bytes>>,
    pub job_id: Mutex<Option<String>>,
    pub fail_post: Mutex<bool>,
    pub submitted: Mutex<Vec<ExportRequest>>,
    pub posted: Mutex<Vec<Bytes>>,
    pub calls: Mutex<Vec<CallContext>>,
}

fn not_found() -> ClientError {
    ClientError::Status {
        status: 404,
        body: String::new(),
    }
}

impl FakeServices {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put(&self, kind: ResourceKind, id: &str, body: Value) {
        self.resources
            .lock()
            .unwrap()
            .insert((kind, id.to_string()), Bytes::from(body.to_string()));
    }

    pub fn put_raw(&self, kind: ResourceKind, id: &str, body: &'static str) {
        self.resources
            .lock()
            .unwrap()
            .insert((kind, id.to_string()), Bytes::from_static(body.as_bytes()));
    }

    pub fn accept_jobs_as(&self, job_id: &str) {
        *self.job_id.lock().unwrap() = Some(job_id.to_string());
    }

    pub fn submitted(&self) -> Vec<ExportRequest> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<CallContext> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttributionClient for FakeServices {
    async fn get(&self, ctx: &CallContext, kind: ResourceKind, id: &str) -> ClientResult<Bytes> {
        self.calls.lock().unwrap().push(ctx.clone());
        self.resources
            .lock()
            .unwrap()
            .get(&(kind, id.to_string()))
            .cloned()
            .ok_or_else(not_found)
    }

    async fn post(
        &self,
        ctx: &CallContext,
        _kind: ResourceKind,
        body: Bytes,
    ) -> ClientResult<Bytes> {
        self.calls.lock().unwrap().push(ctx.clone());
        if *self.fail_post.lock().unwrap() {
            return Err(ClientError::Status {
                status: 500,
                body: "boom".into(),
            });
        }
        self.posted.lock().unwrap().push(body.clone());
        Ok(body)
    }
}

#[async_trait]
impl JobClient for FakeServices {
    async fn export(&self, ctx: &CallContext, request: &ExportRequest) -> ClientResult<String> {
        self.calls.lock().unwrap().push(ctx.clone());
        self.submitted.lock().unwrap().push(request.clone());
        self.job_id
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ClientError::Transport("job service down".into()))
    }

    async fn status(&self, _ctx: &CallContext, job_id: &str) -> ClientResult<Bytes> {
        self.jobs
            .lock()
            .unwrap()
            .get(job_id)
            .cloned()
            .ok_or_else(not_found)
    }
}

#[async_trait]
impl DataClient for FakeServices {
    async fn get_file(&self, _ctx: &CallContext, file_name: &str) -> ClientResult<Bytes> {
        self.files
            .lock()
            .unwrap()
            .get(file_name)
            .cloned()
            .ok_or_else(not_found)
    }
}

pub fn app_with(config: GatewayConfig, services: &Arc<FakeServices>) -> Router {
    let state = AppState::new(config, services.clone(), services.clone(), services.clone());
    build_app(state)
}

pub fn app_with_validator(
    services: &Arc<FakeServices>,
    validator: Arc<dyn ResourceValidator>,
) -> Router {
    let state = AppState::new(
        GatewayConfig::default(),
        services.clone(),
        services.clone(),
        services.clone(),
    )
    .with_group_validator(validator);
    build_app(state)
}

pub fn app(services: &Arc<FakeServices>) -> Router {
    app_with(GatewayConfig::default(), services)
}

pub async fn send(app: Router, req: Request<Body>) -> Response<Body> {
    app.oneshot(req).await.unwrap()
}

pub async fn body_bytes(res: Response<Body>) -> Bytes {
    axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap()
}

pub async fn body_json(res: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(res).await).unwrap()
}

pub fn member(npi: &str, mbi: &str) -> Value {
    json!({
        "extension": [{
            "url": ATTRIBUTED_PROVIDER,
            "valueReference": {
                "type": "Practitioner",
                "identifier": { "system": "http://hl7.org/fhir/sid/us-npi", "value": npi }
            }
        }],
        "entity": {
            "type": "Patient",
            "identifier": { "system": "http://hl7.org/fhir/sid/us-mbi", "value": mbi }
        }
    })
}

pub fn group_resource(pairs: &[(&str, &str)]) -> Value {
    json!({
        "resourceType": "Group",
        "type": "person",
        "actual": true,
        "member": pairs.iter().map(|(npi, mbi)| member(npi, mbi)).collect::<Vec<_>>()
    })
}

/// A stored group as the attribution service returns it.
pub fn stored_group(id: &str, pairs: &[(&str, &str)]) -> Value {
    json!({
        "id": id,
        "version": 1,
        "organization_id": ORG,
        "info": group_resource(pairs),
    })
}

pub fn provenance(recorded: OffsetDateTime, who: &str) -> String {
    json!({
        "resourceType": "Provenance",
        "recorded": fhirgate_core::format_since(recorded),
        "reason": [{ "coding": [{ "system": "http://hl7.org/fhir/v3/ActReason", "code": "TREAT" }] }],
        "agent": [{
            "role": [{ "coding": [{ "system": "http://hl7.org/fhir/v3/RoleClass", "code": "AGNT" }] }],
            "who": { "reference": who }
        }]
    })
    .to_string()
}
