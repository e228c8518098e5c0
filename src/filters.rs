//! Query-string filters for the list endpoints.
//!
//! Substring filters are matched with `ILIKE` against an escaped pattern;
//! reference filters (`regiao`, `estado`, `municipio`) must name an existing
//! row. Validation failures are collected per field so the JSON API can reject
//! the request while the HTML views drop just the offending field.

use crate::errors::AppError;
use serde::Deserialize;
use sqlx::PgPool;
use utoipa::IntoParams;

pub const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";

/// `(field, message)` pairs.
pub type FieldErrors = Vec<(String, String)>;

/// Case-insensitive "contains" pattern for `ILIKE`, or `None` for a blank value.
pub fn contains_pattern(value: Option<&str>) -> Option<String> {
    let value = value?;
    if value.is_empty() {
        return None;
    }
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    Some(pattern)
}

/// Exact-match value, or `None` for a blank value.
pub fn exact_value(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Which table a reference filter points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Region,
    State,
    Municipality,
}

impl Reference {
    fn exists_sql(self) -> &'static str {
        match self {
            Reference::Region => "SELECT EXISTS(SELECT 1 FROM regions WHERE id = $1)",
            Reference::State => "SELECT EXISTS(SELECT 1 FROM states WHERE id = $1)",
            Reference::Municipality => {
                "SELECT EXISTS(SELECT 1 FROM municipalities WHERE id = $1)"
            }
        }
    }
}

/// Resolves a reference filter. Blank means "no filter"; anything that is not
/// the id of an existing row is recorded in `errors`.
async fn reference(
    pool: &PgPool,
    field: &str,
    raw: Option<&str>,
    target: Reference,
    errors: &mut FieldErrors,
) -> Result<Option<i32>, AppError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(raw) => raw,
    };

    let id = match raw.parse::<i32>() {
        Ok(id) => id,
        Err(_) => {
            errors.push((field.to_string(), INVALID_CHOICE.to_string()));
            return Ok(None);
        }
    };

    let exists: bool = sqlx::query_scalar(target.exists_sql())
        .bind(id)
        .fetch_one(pool)
        .await?;

    if exists {
        Ok(Some(id))
    } else {
        errors.push((field.to_string(), INVALID_CHOICE.to_string()));
        Ok(None)
    }
}

/// Result of validating a filter query.
#[derive(Debug, Clone)]
pub struct Validated<F> {
    pub filter: F,
    pub errors: FieldErrors,
}

impl<F> Validated<F> {
    /// Strict mode used by the JSON API.
    pub fn strict(self) -> Result<F, AppError> {
        if self.errors.is_empty() {
            Ok(self.filter)
        } else {
            Err(AppError::InvalidFilter(self.errors))
        }
    }
}

// ============ States ============

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StateQuery {
    /// Case-insensitive substring of the state name.
    pub nome: Option<String>,
    /// Region id.
    pub regiao: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateFilter {
    pub nome: Option<String>,
    pub regiao: Option<i32>,
}

impl StateQuery {
    pub async fn validate(&self, pool: &PgPool) -> Result<Validated<StateFilter>, AppError> {
        let mut errors = FieldErrors::new();
        let regiao = reference(
            pool,
            "regiao",
            self.regiao.as_deref(),
            Reference::Region,
            &mut errors,
        )
        .await?;
        Ok(Validated {
            filter: StateFilter {
                nome: contains_pattern(self.nome.as_deref()),
                regiao,
            },
            errors,
        })
    }
}

// ============ Municipalities ============

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MunicipalityQuery {
    /// Case-insensitive substring of the municipality name.
    pub nome: Option<String>,
    /// State id.
    pub estado: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MunicipalityFilter {
    pub nome: Option<String>,
    pub estado: Option<i32>,
}

impl MunicipalityQuery {
    pub async fn validate(
        &self,
        pool: &PgPool,
    ) -> Result<Validated<MunicipalityFilter>, AppError> {
        let mut errors = FieldErrors::new();
        let estado = reference(
            pool,
            "estado",
            self.estado.as_deref(),
            Reference::State,
            &mut errors,
        )
        .await?;
        Ok(Validated {
            filter: MunicipalityFilter {
                nome: contains_pattern(self.nome.as_deref()),
                estado,
            },
            errors,
        })
    }
}

// ============ Districts ============

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DistrictQuery {
    /// Case-insensitive substring of the district name.
    pub nome: Option<String>,
    /// Municipality id.
    pub municipio: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistrictFilter {
    pub nome: Option<String>,
    pub municipio: Option<i32>,
}

impl DistrictQuery {
    pub async fn validate(&self, pool: &PgPool) -> Result<Validated<DistrictFilter>, AppError> {
        let mut errors = FieldErrors::new();
        let municipio = reference(
            pool,
            "municipio",
            self.municipio.as_deref(),
            Reference::Municipality,
            &mut errors,
        )
        .await?;
        Ok(Validated {
            filter: DistrictFilter {
                nome: contains_pattern(self.nome.as_deref()),
                municipio,
            },
            errors,
        })
    }
}

// ============ Companies ============

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CompanyQuery {
    /// Case-insensitive substring of the legal name.
    pub razao_social: Option<String>,
    /// Legal nature code (exact).
    pub natureza_juridica: Option<String>,
    /// Company size code (exact).
    pub porte_empresa: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyFilter {
    pub razao_social: Option<String>,
    pub natureza_juridica: Option<String>,
    pub porte_empresa: Option<String>,
}

impl CompanyQuery {
    /// Company filters have no references, so validation never fails.
    pub fn validate(&self) -> Validated<CompanyFilter> {
        Validated {
            filter: CompanyFilter {
                razao_social: contains_pattern(self.razao_social.as_deref()),
                natureza_juridica: exact_value(self.natureza_juridica.as_deref()),
                porte_empresa: exact_value(self.porte_empresa.as_deref()),
            },
            errors: FieldErrors::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_do_not_filter() {
        assert_eq!(contains_pattern(None), None);
        assert_eq!(contains_pattern(Some("")), None);
        assert_eq!(exact_value(Some("")), None);
    }

    #[test]
    fn wildcards_are_escaped() {
        assert_eq!(contains_pattern(Some("são")).as_deref(), Some("%são%"));
        assert_eq!(
            contains_pattern(Some("50%_off\\")).as_deref(),
            Some("%50\\%\\_off\\\\%")
        );
    }

    #[test]
    fn company_query_maps_fields() {
        let query = CompanyQuery {
            razao_social: Some("padaria".to_string()),
            natureza_juridica: Some("2062".to_string()),
            porte_empresa: Some(String::new()),
        };
        let validated = query.validate();
        assert!(validated.errors.is_empty());
        assert_eq!(
            validated.filter,
            CompanyFilter {
                razao_social: Some("%padaria%".to_string()),
                natureza_juridica: Some("2062".to_string()),
                porte_empresa: None,
            }
        );
    }

    #[test]
    fn strict_mode_rejects_field_errors() {
        let validated = Validated {
            filter: StateFilter::default(),
            errors: vec![("regiao".to_string(), INVALID_CHOICE.to_string())],
        };
        assert!(matches!(
            validated.strict(),
            Err(AppError::InvalidFilter(ref e)) if e.len() == 1
        ));
    }
}
