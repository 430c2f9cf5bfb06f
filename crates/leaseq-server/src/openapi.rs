use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "leaseq API",
        version = "0.3.0",
        description = "Work-item lease queue: batched claims with expiring leases and atomic result submission."
    ),
    paths(
        crate::routes::claim_batch,
        crate::routes::submit_results,
        crate::routes::enqueue_items,
        crate::routes::get_item,
        crate::routes::stats,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::PayloadDto,
        crate::dto::ResultFieldsDto,
        crate::dto::ClaimRequest,
        crate::dto::ClaimedItemResponse,
        crate::dto::ClaimResponse,
        crate::dto::ResultRow,
        crate::dto::SubmitRequest,
        crate::dto::ItemErrorResponse,
        crate::dto::SubmitResponse,
        crate::dto::EnqueueRequest,
        crate::dto::EnqueueResponse,
        crate::dto::ItemResponse,
        crate::dto::StatsResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "leases", description = "Claim batches of work items"),
        (name = "results", description = "Submit worker results"),
        (name = "items", description = "Producer and operator access to items"),
        (name = "system", description = "Health and system status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds Bearer token security scheme to the OpenAPI document.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("token")
                        .description(Some("API key. Set via LEASEQ_API_KEY environment variable."))
                        .build(),
                ),
            );
        }
    }
}
