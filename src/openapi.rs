use crate::handlers;
use crate::models::{CompanyResponse, DistrictResponse, MunicipalityResponse, Region, StateResponse};
use crate::pagination::{
    PaginatedCompanies, PaginatedDistricts, PaginatedMunicipalities, PaginatedRegions,
    PaginatedStates,
};
use utoipa::OpenApi;

/// OpenAPI document of the JSON API, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Arko API",
        description = "Brazilian geography (IBGE) and company registry (Receita Federal) listings."
    ),
    paths(
        handlers::list_regions,
        handlers::list_states,
        handlers::list_municipalities,
        handlers::list_districts,
        handlers::list_companies
    ),
    components(schemas(
        Region,
        StateResponse,
        MunicipalityResponse,
        DistrictResponse,
        CompanyResponse,
        PaginatedRegions,
        PaginatedStates,
        PaginatedMunicipalities,
        PaginatedDistricts,
        PaginatedCompanies
    )),
    tags(
        (name = "geography", description = "Regions, states, municipalities and districts"),
        (name = "companies", description = "Receita Federal company records")
    )
)]
pub struct ApiDoc;
