use bigdecimal::{BigDecimal, RoundingMode};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

// ============ Database Models ============

/// One of the five Brazilian macro-regions.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Region {
    /// IBGE region code.
    pub id: i32,
    /// Two-letter abbreviation (e.g. "NE").
    pub sigla: String,
    pub nome: String,
}

/// A federative unit, joined with its region.
#[derive(Debug, Clone, FromRow)]
pub struct StateRow {
    pub id: i32,
    pub sigla: String,
    pub nome: String,
    pub regiao_id: i32,
    pub regiao_sigla: String,
    pub regiao_nome: String,
}

impl StateRow {
    /// `"Nome (SG)"`, the way a state is shown wherever it is referenced.
    pub fn display_name(&self) -> String {
        state_display(&self.nome, &self.sigla)
    }
}

pub fn state_display(nome: &str, sigla: &str) -> String {
    format!("{} ({})", nome, sigla)
}

/// A municipality, joined with its state.
#[derive(Debug, Clone, FromRow)]
pub struct MunicipalityRow {
    pub id: i32,
    pub nome: String,
    pub estado_id: i32,
    pub estado_nome: String,
    pub estado_sigla: String,
}

/// A district, joined with its municipality and that municipality's state.
#[derive(Debug, Clone, FromRow)]
pub struct DistrictRow {
    pub id: i32,
    pub nome: String,
    pub municipio_id: i32,
    pub municipio_nome: String,
    pub estado_nome: String,
}

/// A company ("Empresa") from the Receita Federal registry.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Company {
    /// First 8 digits of the CNPJ (CNPJ básico).
    pub cnpj: String,
    pub razao_social: String,
    pub natureza_juridica: String,
    pub qualificacao_responsavel: String,
    pub capital_social: BigDecimal,
    /// Size code ("00", "01", "03", "05").
    pub porte_empresa: Option<String>,
    pub ente_federativo_responsavel: Option<String>,
}

/// Row of the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub is_active: bool,
    pub date_joined: chrono::DateTime<chrono::Utc>,
    pub last_login: Option<chrono::DateTime<chrono::Utc>>,
}

/// Value/label pair used by the reference selects of the HTML filter forms.
#[derive(Debug, Clone, FromRow)]
pub struct Choice {
    pub id: i32,
    pub label: String,
}

// ============ API Models ============

/// State as returned by `GET /api/states/`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StateResponse {
    pub id: i32,
    pub nome: String,
    pub sigla: String,
    pub regiao: Region,
}

impl From<StateRow> for StateResponse {
    fn from(row: StateRow) -> Self {
        Self {
            id: row.id,
            nome: row.nome,
            sigla: row.sigla,
            regiao: Region {
                id: row.regiao_id,
                sigla: row.regiao_sigla,
                nome: row.regiao_nome,
            },
        }
    }
}

/// Municipality as returned by `GET /api/municipalities/`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MunicipalityResponse {
    pub id: i32,
    pub nome: String,
    /// Display name of the state, e.g. `"Paraná (PR)"`.
    pub estado: String,
}

impl From<MunicipalityRow> for MunicipalityResponse {
    fn from(row: MunicipalityRow) -> Self {
        Self {
            id: row.id,
            estado: state_display(&row.estado_nome, &row.estado_sigla),
            nome: row.nome,
        }
    }
}

/// District as returned by `GET /api/districts/`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DistrictResponse {
    pub id: i32,
    pub nome: String,
    /// Name of the municipality the district belongs to.
    pub municipio: String,
}

impl From<DistrictRow> for DistrictResponse {
    fn from(row: DistrictRow) -> Self {
        Self {
            id: row.id,
            nome: row.nome,
            municipio: row.municipio_nome,
        }
    }
}

/// Company as returned by `GET /api/companies/`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompanyResponse {
    pub cnpj: String,
    pub razao_social: String,
    pub natureza_juridica: String,
    pub qualificacao_responsavel: String,
    /// Decimal string with two places, e.g. `"1500.00"`.
    pub capital_social: String,
    pub porte_empresa: Option<String>,
    pub ente_federativo_responsavel: Option<String>,
}

impl From<Company> for CompanyResponse {
    fn from(company: Company) -> Self {
        Self {
            capital_social: format_money(&company.capital_social),
            cnpj: company.cnpj,
            razao_social: company.razao_social,
            natureza_juridica: company.natureza_juridica,
            qualificacao_responsavel: company.qualificacao_responsavel,
            porte_empresa: company.porte_empresa,
            ente_federativo_responsavel: company.ente_federativo_responsavel,
        }
    }
}

/// Renders a `numeric(16,2)` value with exactly two decimal places.
///
/// Built from the unscaled integer: `BigDecimal`'s `Display` drops the scale of
/// zero values ("0" instead of "0.00").
pub fn format_money(value: &BigDecimal) -> String {
    let (cents, _) = value
        .with_scale_round(2, RoundingMode::HalfEven)
        .as_bigint_and_exponent();
    let sign = if cents.sign() == bigdecimal::num_bigint::Sign::Minus {
        "-"
    } else {
        ""
    };
    let digits = format!("{:03}", cents.magnitude());
    let (units, fraction) = digits.split_at(digits.len() - 2);
    format!("{}{}.{}", sign, units, fraction)
}
