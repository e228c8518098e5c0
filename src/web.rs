//! Login-gated HTML list views.
//!
//! Each page renders the filter form, the result table, pagination links that
//! keep the active filters, and a `data-json` script island for client-side
//! scripts. The municipality and district islands hold every row matching the
//! filters; the state island is the current page with its count and page
//! numbers; the company island is the current page. Invalid reference filters
//! are dropped and reported next to the form instead of failing the request.

use crate::auth::{self, CurrentUser};
use crate::errors::AppError;
use crate::filters::{CompanyQuery, DistrictQuery, FieldErrors, MunicipalityQuery, StateQuery};
use crate::handlers::{AppState, ChoiceSet};
use crate::models::format_money;
use crate::pagination::{Page, PageRequest};
use crate::templates::{self, FormField};
use axum::{
    extract::{Query, RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Extension,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub const STATES_PER_PAGE: i64 = 10;
pub const ROWS_PER_PAGE: i64 = 25;

/// `AppError` rendered as an HTML page.
pub struct HtmlError(pub AppError);

impl From<AppError> for HtmlError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for HtmlError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        if status.is_server_error() {
            tracing::error!("HTML view failed: {}", self.0);
        }
        let title = match status {
            StatusCode::NOT_FOUND => "Not Found",
            StatusCode::BAD_REQUEST => "Bad Request",
            _ => "Server Error",
        };
        let body = format!("<p>{}</p>", templates::escape(&self.0.public_message()));
        (status, Html(templates::layout(title, None, &body))).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

fn page_request(query: &PageQuery, size: i64) -> Result<PageRequest, AppError> {
    PageRequest::fixed(query.page.as_deref(), size)
}

fn log_ignored(view: &str, errors: &FieldErrors) {
    if !errors.is_empty() {
        tracing::debug!("{}: ignoring invalid filters {:?}", view, errors);
    }
}

struct ListPage<'a> {
    title: &'a str,
    user: &'a CurrentUser,
    form: String,
    table: String,
    page: &'a Page,
    query: Option<&'a str>,
    data_json: String,
}

fn render(list: ListPage<'_>) -> Html<String> {
    let body = format!(
        "{form}\n<p>{count} registro(s)</p>\n{table}\n{pagination}\n{data}",
        form = list.form,
        count = list.page.count,
        table = list.table,
        pagination = templates::pagination(list.page, list.query),
        data = templates::data_script(&list.data_json),
    );
    Html(templates::layout(list.title, Some(&list.user.username), &body))
}

/// GET /
pub async fn index() -> Response {
    auth::found(auth::DEFAULT_REDIRECT)
}

/// GET /states/
pub async fn states(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    RawQuery(raw): RawQuery,
    Query(paging): Query<PageQuery>,
    Query(query): Query<StateQuery>,
) -> Result<Html<String>, HtmlError> {
    let request = page_request(&paging, STATES_PER_PAGE)?;
    let validated = query.validate(&state.db).await?;
    log_ignored("states", &validated.errors);

    let count = state.storage.count_states(&validated.filter).await?;
    let page = request.resolve(count)?;
    let rows = state.storage.list_states(&validated.filter, &page).await?;
    let regions = state.choices(ChoiceSet::Regions).await?;

    let form = templates::filter_form(
        &[
            FormField::Text {
                name: "nome",
                label: "Nome",
                value: query.nome.as_deref(),
            },
            FormField::Select {
                name: "regiao",
                label: "Região",
                choices: &regions,
                selected: query.regiao.as_deref(),
            },
        ],
        &validated.errors,
    );

    let table = templates::table(
        &["Nome", "Sigla", "Região"],
        &rows
            .iter()
            .map(|s| vec![s.nome.clone(), s.sigla.clone(), s.regiao_nome.clone()])
            .collect::<Vec<_>>(),
    );

    let data = json!({
        "count": page.count,
        "next": page.next_number(),
        "previous": page.previous_number(),
        "results": rows
            .iter()
            .map(|s| json!({
                "id": s.id,
                "nome": s.nome,
                "sigla": s.sigla,
                "regiao__nome": s.regiao_nome,
            }))
            .collect::<Vec<_>>(),
    });

    Ok(render(ListPage {
        title: "Estados",
        user: &user,
        form,
        table,
        page: &page,
        query: raw.as_deref(),
        data_json: templates::json_island(&data),
    }))
}

/// GET /municipalities/
pub async fn municipalities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    RawQuery(raw): RawQuery,
    Query(paging): Query<PageQuery>,
    Query(query): Query<MunicipalityQuery>,
) -> Result<Html<String>, HtmlError> {
    let request = page_request(&paging, ROWS_PER_PAGE)?;
    let validated = query.validate(&state.db).await?;
    log_ignored("municipalities", &validated.errors);

    let count = state
        .storage
        .count_municipalities(&validated.filter)
        .await?;
    let page = request.resolve(count)?;
    let rows = state
        .storage
        .list_municipalities(&validated.filter, &page)
        .await?;
    let states = state.choices(ChoiceSet::States).await?;

    let form = templates::filter_form(
        &[
            FormField::Text {
                name: "nome",
                label: "Nome",
                value: query.nome.as_deref(),
            },
            FormField::Select {
                name: "estado",
                label: "Estado",
                choices: &states,
                selected: query.estado.as_deref(),
            },
        ],
        &validated.errors,
    );

    let table = templates::table(
        &["Nome", "Estado"],
        &rows
            .iter()
            .map(|m| {
                vec![
                    m.nome.clone(),
                    crate::models::state_display(&m.estado_nome, &m.estado_sigla),
                ]
            })
            .collect::<Vec<_>>(),
    );

    let data: Vec<_> = state
        .storage
        .all_municipalities(&validated.filter)
        .await?
        .iter()
        .map(|m| json!({"id": m.id, "nome": m.nome, "estado__nome": m.estado_nome}))
        .collect();

    Ok(render(ListPage {
        title: "Municípios",
        user: &user,
        form,
        table,
        page: &page,
        query: raw.as_deref(),
        data_json: templates::json_island(&data),
    }))
}

/// GET /districts/
pub async fn districts(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    RawQuery(raw): RawQuery,
    Query(paging): Query<PageQuery>,
    Query(query): Query<DistrictQuery>,
) -> Result<Html<String>, HtmlError> {
    let request = page_request(&paging, ROWS_PER_PAGE)?;
    let validated = query.validate(&state.db).await?;
    log_ignored("districts", &validated.errors);

    let count = state.storage.count_districts(&validated.filter).await?;
    let page = request.resolve(count)?;
    let rows = state
        .storage
        .list_districts(&validated.filter, &page)
        .await?;
    let municipalities = state.choices(ChoiceSet::Municipalities).await?;

    let form = templates::filter_form(
        &[
            FormField::Text {
                name: "nome",
                label: "Nome",
                value: query.nome.as_deref(),
            },
            FormField::Select {
                name: "municipio",
                label: "Município",
                choices: &municipalities,
                selected: query.municipio.as_deref(),
            },
        ],
        &validated.errors,
    );

    let table = templates::table(
        &["Nome", "Município", "Estado"],
        &rows
            .iter()
            .map(|d| {
                vec![
                    d.nome.clone(),
                    d.municipio_nome.clone(),
                    d.estado_nome.clone(),
                ]
            })
            .collect::<Vec<_>>(),
    );

    let data: Vec<_> = state
        .storage
        .all_districts(&validated.filter)
        .await?
        .iter()
        .map(|d| {
            json!({
                "id": d.id,
                "nome": d.nome,
                "municipio__nome": d.municipio_nome,
                "municipio__estado__nome": d.estado_nome,
            })
        })
        .collect();

    Ok(render(ListPage {
        title: "Distritos",
        user: &user,
        form,
        table,
        page: &page,
        query: raw.as_deref(),
        data_json: templates::json_island(&data),
    }))
}

/// GET /companies/
pub async fn companies(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    RawQuery(raw): RawQuery,
    Query(paging): Query<PageQuery>,
    Query(query): Query<CompanyQuery>,
) -> Result<Html<String>, HtmlError> {
    let request = page_request(&paging, ROWS_PER_PAGE)?;
    let validated = query.validate();

    let count = state.storage.count_companies(&validated.filter).await?;
    let page = request.resolve(count)?;
    let rows = state
        .storage
        .list_companies(&validated.filter, &page)
        .await?;

    let form = templates::filter_form(
        &[
            FormField::Text {
                name: "razao_social",
                label: "Razão social",
                value: query.razao_social.as_deref(),
            },
            FormField::Text {
                name: "natureza_juridica",
                label: "Natureza jurídica",
                value: query.natureza_juridica.as_deref(),
            },
            FormField::Text {
                name: "porte_empresa",
                label: "Porte",
                value: query.porte_empresa.as_deref(),
            },
        ],
        &validated.errors,
    );

    let table = templates::table(
        &["CNPJ", "Razão social", "Natureza jurídica", "Porte", "Capital social"],
        &rows
            .iter()
            .map(|c| {
                vec![
                    c.cnpj.clone(),
                    c.razao_social.clone(),
                    c.natureza_juridica.clone(),
                    c.porte_empresa.clone().unwrap_or_default(),
                    format_money(&c.capital_social),
                ]
            })
            .collect::<Vec<_>>(),
    );

    let data: Vec<_> = rows
        .iter()
        .map(|c| {
            json!({
                "model": "arko.company",
                "pk": c.cnpj,
                "fields": {
                    "razao_social": c.razao_social,
                    "porte_empresa": c.porte_empresa,
                },
            })
        })
        .collect();

    Ok(render(ListPage {
        title: "Empresas",
        user: &user,
        form,
        table,
        page: &page,
        query: raw.as_deref(),
        data_json: templates::json_island(&data),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn invalid_page_renders_html_404() {
        let response = HtmlError(AppError::NotFound("Invalid page.".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("<p>Invalid page.</p>"));
    }

    #[test]
    fn html_pages_use_fixed_sizes() {
        let paging = PageQuery {
            page: Some("2".to_string()),
        };
        assert_eq!(page_request(&paging, STATES_PER_PAGE).unwrap().size, 10);
        assert!(page_request(
            &PageQuery {
                page: Some("x".to_string())
            },
            ROWS_PER_PAGE
        )
        .is_err());
    }
}
