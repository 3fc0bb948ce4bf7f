//! Context stages that bind a single request value.

use fhirgate_api::ApiError;
use fhirgate_core::params::{export_since, export_types, mbi_identifier};
use fhirgate_core::{is_valid_file_name, is_valid_id};

use super::context::{ContextKey, RequestContext};
use super::stage::{Stage, StageInput, StageOutcome, bind};

// Header names shared with existing client integrations.
pub const ORGANIZATION_HEADER: &str = "X-Org";
pub const PROVENANCE_HEADER: &str = "X-Provenance";
pub const IDENTIFIER_SYSTEM_HEADER: &str = "X-Fhir-Identifier-System";
pub const IDENTIFIER_VALUE_HEADER: &str = "X-Fhir-Identifier-Value";
pub const FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";
pub const REAL_IP_HEADER: &str = "X-Real-IP";
pub const PREFER_HEADER: &str = "Prefer";

pub const TYPE_PARAM: &str = "_type";
pub const SINCE_PARAM: &str = "_since";
pub const OUTPUT_FORMAT_PARAM: &str = "_outputFormat";

pub const ORGANIZATION_ID_PARAM: &str = "organizationID";
pub const GROUP_ID_PARAM: &str = "groupID";
pub const JOB_ID_PARAM: &str = "jobID";
pub const FILE_NAME_PARAM: &str = "fileName";

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then the peer.
pub struct RequestIpCtx;

impl Stage for RequestIpCtx {
    fn name(&self) -> &'static str {
        "RequestIPCtx"
    }

    fn process(&self, input: &StageInput<'_>, ctx: RequestContext) -> StageOutcome {
        let forwarded = input
            .header(FORWARDED_FOR_HEADER)
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        let real_ip = input
            .header(REAL_IP_HEADER)
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let ip = forwarded
            .or(real_ip)
            .map(str::to_string)
            .or_else(|| input.peer.map(|addr| addr.ip().to_string()));

        match ip {
            Some(ip) => bind(ctx, ContextKey::ClientIp, ip),
            None => StageOutcome::Continue(ctx),
        }
    }
}

/// Full inbound URL (path and query).
pub struct RequestUrlCtx;

impl Stage for RequestUrlCtx {
    fn name(&self) -> &'static str {
        "RequestURLCtx"
    }

    fn process(&self, input: &StageInput<'_>, ctx: RequestContext) -> StageOutcome {
        bind(ctx, ContextKey::RequestUrl, input.uri.to_string())
    }
}

/// Organization identity established by the upstream token layer.
pub struct AuthCtx;

impl Stage for AuthCtx {
    fn name(&self) -> &'static str {
        "AuthCtx"
    }

    fn process(&self, input: &StageInput<'_>, ctx: RequestContext) -> StageOutcome {
        match input
            .header(ORGANIZATION_HEADER)
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            Some(org) if is_valid_id(org) => bind(ctx, ContextKey::OrganizationId, org),
            Some(_) => StageOutcome::Halt(ApiError::unauthorized("Invalid organization identity")),
            None => StageOutcome::Halt(ApiError::unauthorized("Missing organization identity")),
        }
    }
}

fn bind_path_id(
    input: &StageInput<'_>,
    ctx: RequestContext,
    param: &str,
    key: ContextKey,
    what: &str,
) -> StageOutcome {
    match input.path_param(param) {
        Some(id) if is_valid_id(id) => bind(ctx, key, id),
        _ => StageOutcome::Halt(ApiError::bad_request(format!(
            "Failed to extract {what} from url, please check the url"
        ))),
    }
}

pub struct OrganizationCtx;

impl Stage for OrganizationCtx {
    fn name(&self) -> &'static str {
        "OrganizationCtx"
    }

    fn process(&self, input: &StageInput<'_>, ctx: RequestContext) -> StageOutcome {
        bind_path_id(
            input,
            ctx,
            ORGANIZATION_ID_PARAM,
            ContextKey::OrganizationId,
            "organization id",
        )
    }
}

pub struct GroupCtx;

impl Stage for GroupCtx {
    fn name(&self) -> &'static str {
        "GroupCtx"
    }

    fn process(&self, input: &StageInput<'_>, ctx: RequestContext) -> StageOutcome {
        bind_path_id(input, ctx, GROUP_ID_PARAM, ContextKey::GroupId, "group id")
    }
}

pub struct JobCtx;

impl Stage for JobCtx {
    fn name(&self) -> &'static str {
        "JobCtx"
    }

    fn process(&self, input: &StageInput<'_>, ctx: RequestContext) -> StageOutcome {
        bind_path_id(input, ctx, JOB_ID_PARAM, ContextKey::JobId, "job id")
    }
}

pub struct FileNameCtx;

impl Stage for FileNameCtx {
    fn name(&self) -> &'static str {
        "FileNameCtx"
    }

    fn process(&self, input: &StageInput<'_>, ctx: RequestContext) -> StageOutcome {
        match input.path_param(FILE_NAME_PARAM) {
            Some(name) if is_valid_file_name(name) => bind(ctx, ContextKey::FileName, name),
            _ => StageOutcome::Halt(ApiError::bad_request(
                "Failed to extract file name from url, please check the url",
            )),
        }
    }
}

/// `_type` filter. Never halts; unknown types bind the empty string.
pub struct ExportTypesParamCtx;

impl Stage for ExportTypesParamCtx {
    fn name(&self) -> &'static str {
        "ExportTypesParamCtx"
    }

    fn process(&self, input: &StageInput<'_>, ctx: RequestContext) -> StageOutcome {
        let types = export_types(input.query(TYPE_PARAM).as_deref());
        bind(ctx, ContextKey::ResourceTypes, types)
    }
}

/// `_since` lower bound. Never halts; unusable values bind the empty string.
pub struct ExportSinceParamCtx;

impl Stage for ExportSinceParamCtx {
    fn name(&self) -> &'static str {
        "ExportSinceParamCtx"
    }

    fn process(&self, input: &StageInput<'_>, ctx: RequestContext) -> StageOutcome {
        let since = export_since(input.query(SINCE_PARAM).as_deref(), input.now);
        bind(ctx, ContextKey::Since, since)
    }
}

/// Patient MBI from the identifier header pair.
pub struct MbiCtx;

impl Stage for MbiCtx {
    fn name(&self) -> &'static str {
        "MBICtx"
    }

    fn process(&self, input: &StageInput<'_>, ctx: RequestContext) -> StageOutcome {
        match mbi_identifier(
            input.header(IDENTIFIER_SYSTEM_HEADER),
            input.header(IDENTIFIER_VALUE_HEADER),
        ) {
            Ok(mbi) => bind(ctx, ContextKey::Mbi, mbi),
            Err(rejection) => StageOutcome::Halt(ApiError::bad_request(rejection.to_string())),
        }
    }
}
