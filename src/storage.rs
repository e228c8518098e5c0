use crate::errors::AppError;
use crate::filters::{CompanyFilter, DistrictFilter, MunicipalityFilter, StateFilter};
use crate::models::*;
use crate::pagination::Page;
use bigdecimal::BigDecimal;
use sqlx::{PgConnection, PgPool};
use std::collections::HashSet;

/// Read-side queries behind the list views and the JSON API.
#[derive(Clone)]
pub struct ListingStorage {
    pool: PgPool,
}

impl ListingStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn count_regions(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM regions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn list_regions(&self, page: &Page) -> Result<Vec<Region>, AppError> {
        let regions = sqlx::query_as::<_, Region>(
            "SELECT id, sigla, nome FROM regions ORDER BY id LIMIT $1 OFFSET $2",
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(regions)
    }

    pub async fn count_states(&self, filter: &StateFilter) -> Result<i64, AppError> {
        let count = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM states s
            WHERE ($1::text IS NULL OR s.nome ILIKE $1)
              AND ($2::int IS NULL OR s.regiao_id = $2)
            "#,
        )
        .bind(&filter.nome)
        .bind(filter.regiao)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn list_states(
        &self,
        filter: &StateFilter,
        page: &Page,
    ) -> Result<Vec<StateRow>, AppError> {
        let rows = sqlx::query_as::<_, StateRow>(
            r#"
            SELECT s.id, s.sigla, s.nome,
                   r.id AS regiao_id, r.sigla AS regiao_sigla, r.nome AS regiao_nome
            FROM states s
            JOIN regions r ON r.id = s.regiao_id
            WHERE ($1::text IS NULL OR s.nome ILIKE $1)
              AND ($2::int IS NULL OR s.regiao_id = $2)
            ORDER BY s.nome, s.id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&filter.nome)
        .bind(filter.regiao)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_municipalities(
        &self,
        filter: &MunicipalityFilter,
    ) -> Result<i64, AppError> {
        let count = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM municipalities m
            WHERE ($1::text IS NULL OR m.nome ILIKE $1)
              AND ($2::int IS NULL OR m.estado_id = $2)
            "#,
        )
        .bind(&filter.nome)
        .bind(filter.estado)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn list_municipalities(
        &self,
        filter: &MunicipalityFilter,
        page: &Page,
    ) -> Result<Vec<MunicipalityRow>, AppError> {
        self.fetch_municipalities(filter, Some(page)).await
    }

    /// Every municipality matching `filter`, in listing order.
    pub async fn all_municipalities(
        &self,
        filter: &MunicipalityFilter,
    ) -> Result<Vec<MunicipalityRow>, AppError> {
        self.fetch_municipalities(filter, None).await
    }

    // NULL LIMIT and OFFSET select every row.
    async fn fetch_municipalities(
        &self,
        filter: &MunicipalityFilter,
        page: Option<&Page>,
    ) -> Result<Vec<MunicipalityRow>, AppError> {
        let rows = sqlx::query_as::<_, MunicipalityRow>(
            r#"
            SELECT m.id, m.nome,
                   s.id AS estado_id, s.nome AS estado_nome, s.sigla AS estado_sigla
            FROM municipalities m
            JOIN states s ON s.id = m.estado_id
            WHERE ($1::text IS NULL OR m.nome ILIKE $1)
              AND ($2::int IS NULL OR m.estado_id = $2)
            ORDER BY m.nome, m.id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&filter.nome)
        .bind(filter.estado)
        .bind(page.map(Page::limit))
        .bind(page.map(Page::offset))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_districts(&self, filter: &DistrictFilter) -> Result<i64, AppError> {
        let count = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM districts d
            WHERE ($1::text IS NULL OR d.nome ILIKE $1)
              AND ($2::int IS NULL OR d.municipio_id = $2)
            "#,
        )
        .bind(&filter.nome)
        .bind(filter.municipio)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn list_districts(
        &self,
        filter: &DistrictFilter,
        page: &Page,
    ) -> Result<Vec<DistrictRow>, AppError> {
        self.fetch_districts(filter, Some(page)).await
    }

    /// Every district matching `filter`, in listing order.
    pub async fn all_districts(&self, filter: &DistrictFilter) -> Result<Vec<DistrictRow>, AppError> {
        self.fetch_districts(filter, None).await
    }

    async fn fetch_districts(
        &self,
        filter: &DistrictFilter,
        page: Option<&Page>,
    ) -> Result<Vec<DistrictRow>, AppError> {
        let rows = sqlx::query_as::<_, DistrictRow>(
            r#"
            SELECT d.id, d.nome,
                   m.id AS municipio_id, m.nome AS municipio_nome,
                   s.nome AS estado_nome
            FROM districts d
            JOIN municipalities m ON m.id = d.municipio_id
            JOIN states s ON s.id = m.estado_id
            WHERE ($1::text IS NULL OR d.nome ILIKE $1)
              AND ($2::int IS NULL OR d.municipio_id = $2)
            ORDER BY d.nome, d.id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&filter.nome)
        .bind(filter.municipio)
        .bind(page.map(Page::limit))
        .bind(page.map(Page::offset))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_companies(&self, filter: &CompanyFilter) -> Result<i64, AppError> {
        let count = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM companies c
            WHERE ($1::text IS NULL OR c.razao_social ILIKE $1)
              AND ($2::text IS NULL OR c.natureza_juridica = $2)
              AND ($3::text IS NULL OR c.porte_empresa = $3)
            "#,
        )
        .bind(&filter.razao_social)
        .bind(&filter.natureza_juridica)
        .bind(&filter.porte_empresa)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn list_companies(
        &self,
        filter: &CompanyFilter,
        page: &Page,
    ) -> Result<Vec<Company>, AppError> {
        let rows = sqlx::query_as::<_, Company>(
            r#"
            SELECT c.cnpj, c.razao_social, c.natureza_juridica, c.qualificacao_responsavel,
                   c.capital_social, c.porte_empresa, c.ente_federativo_responsavel
            FROM companies c
            WHERE ($1::text IS NULL OR c.razao_social ILIKE $1)
              AND ($2::text IS NULL OR c.natureza_juridica = $2)
              AND ($3::text IS NULL OR c.porte_empresa = $3)
            ORDER BY c.razao_social, c.cnpj
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(&filter.razao_social)
        .bind(&filter.natureza_juridica)
        .bind(&filter.porte_empresa)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ============ Filter form choices ============

    pub async fn region_choices(&self) -> Result<Vec<Choice>, AppError> {
        let choices = sqlx::query_as::<_, Choice>(
            "SELECT id, nome AS label FROM regions ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(choices)
    }

    pub async fn state_choices(&self) -> Result<Vec<Choice>, AppError> {
        let choices = sqlx::query_as::<_, Choice>(
            "SELECT id, nome || ' (' || sigla || ')' AS label FROM states ORDER BY nome, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(choices)
    }

    pub async fn municipality_choices(&self) -> Result<Vec<Choice>, AppError> {
        let choices = sqlx::query_as::<_, Choice>(
            "SELECT id, nome AS label FROM municipalities ORDER BY nome, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(choices)
    }

    /// Row counts per table, for `check_app`.
    pub async fn table_counts(&self) -> Result<Vec<(&'static str, i64)>, AppError> {
        let mut counts = Vec::new();
        for table in ["regions", "states", "municipalities", "districts", "companies", "users"] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&self.pool)
                .await?;
            counts.push((table, count));
        }
        Ok(counts)
    }
}

// ============ Import writes ============
//
// These take a connection so that a whole import can share one transaction.

/// Inserts a region unless its id already exists. Returns `true` if created.
pub async fn insert_region_if_missing(
    conn: &mut PgConnection,
    region: &Region,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        "INSERT INTO regions (id, sigla, nome) VALUES ($1, $2, $3) ON CONFLICT (id) DO NOTHING",
    )
    .bind(region.id)
    .bind(&region.sigla)
    .bind(&region.nome)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Inserts a state unless its id already exists. Returns `true` if created.
pub async fn insert_state_if_missing(
    conn: &mut PgConnection,
    id: i32,
    sigla: &str,
    nome: &str,
    regiao_id: i32,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        INSERT INTO states (id, sigla, nome, regiao_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(id)
    .bind(sigla)
    .bind(nome)
    .bind(regiao_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn state_ids(conn: &mut PgConnection) -> Result<HashSet<i32>, AppError> {
    ids(conn, "SELECT id FROM states").await
}

pub async fn municipality_ids(conn: &mut PgConnection) -> Result<HashSet<i32>, AppError> {
    ids(conn, "SELECT id FROM municipalities").await
}

pub async fn district_ids(conn: &mut PgConnection) -> Result<HashSet<i32>, AppError> {
    ids(conn, "SELECT id FROM districts").await
}

async fn ids(conn: &mut PgConnection, sql: &str) -> Result<HashSet<i32>, AppError> {
    let ids: Vec<i32> = sqlx::query_scalar(sql).fetch_all(conn).await?;
    Ok(ids.into_iter().collect())
}

/// New child row of the geography hierarchy: `(id, nome, parent_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlace {
    pub id: i32,
    pub nome: String,
    pub parent_id: i32,
}

/// Bulk-inserts municipalities (`parent_id` = state id).
pub async fn insert_municipalities(
    conn: &mut PgConnection,
    rows: &[NewPlace],
) -> Result<u64, AppError> {
    insert_places(
        conn,
        r#"
        INSERT INTO municipalities (id, nome, estado_id)
        SELECT * FROM UNNEST($1::int[], $2::text[], $3::int[])
        "#,
        rows,
    )
    .await
}

/// Bulk-inserts districts (`parent_id` = municipality id).
pub async fn insert_districts(
    conn: &mut PgConnection,
    rows: &[NewPlace],
) -> Result<u64, AppError> {
    insert_places(
        conn,
        r#"
        INSERT INTO districts (id, nome, municipio_id)
        SELECT * FROM UNNEST($1::int[], $2::text[], $3::int[])
        "#,
        rows,
    )
    .await
}

async fn insert_places(
    conn: &mut PgConnection,
    sql: &str,
    rows: &[NewPlace],
) -> Result<u64, AppError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
    let names: Vec<String> = rows.iter().map(|r| r.nome.clone()).collect();
    let parents: Vec<i32> = rows.iter().map(|r| r.parent_id).collect();

    let result = sqlx::query(sql)
        .bind(&ids)
        .bind(&names)
        .bind(&parents)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

/// Inserts or updates a batch of companies keyed by cnpj. The batch must not
/// contain the same cnpj twice.
pub async fn upsert_companies(
    conn: &mut PgConnection,
    companies: &[Company],
) -> Result<u64, AppError> {
    if companies.is_empty() {
        return Ok(0);
    }

    let mut cnpjs = Vec::with_capacity(companies.len());
    let mut razoes = Vec::with_capacity(companies.len());
    let mut naturezas = Vec::with_capacity(companies.len());
    let mut qualificacoes = Vec::with_capacity(companies.len());
    let mut capitais: Vec<BigDecimal> = Vec::with_capacity(companies.len());
    let mut portes = Vec::with_capacity(companies.len());
    let mut entes = Vec::with_capacity(companies.len());
    for c in companies {
        cnpjs.push(c.cnpj.as_str());
        razoes.push(c.razao_social.as_str());
        naturezas.push(c.natureza_juridica.as_str());
        qualificacoes.push(c.qualificacao_responsavel.as_str());
        capitais.push(c.capital_social.clone());
        portes.push(c.porte_empresa.as_deref());
        entes.push(c.ente_federativo_responsavel.as_deref());
    }

    let result = sqlx::query(
        r#"
        INSERT INTO companies (
            cnpj, razao_social, natureza_juridica, qualificacao_responsavel,
            capital_social, porte_empresa, ente_federativo_responsavel
        )
        SELECT * FROM UNNEST(
            $1::text[], $2::text[], $3::text[], $4::text[],
            $5::numeric[], $6::text[], $7::text[]
        )
        ON CONFLICT (cnpj) DO UPDATE
        SET razao_social = EXCLUDED.razao_social,
            natureza_juridica = EXCLUDED.natureza_juridica,
            qualificacao_responsavel = EXCLUDED.qualificacao_responsavel,
            capital_social = EXCLUDED.capital_social,
            porte_empresa = EXCLUDED.porte_empresa,
            ente_federativo_responsavel = EXCLUDED.ente_federativo_responsavel
        "#,
    )
    .bind(&cnpjs)
    .bind(&razoes)
    .bind(&naturezas)
    .bind(&qualificacoes)
    .bind(&capitais)
    .bind(&portes)
    .bind(&entes)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

pub async fn count_companies(conn: &mut PgConnection) -> Result<i64, AppError> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM companies")
        .fetch_one(conn)
        .await?;
    Ok(count)
}

// ============ Users ============

pub async fn find_user(pool: &PgPool, username: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password_hash, is_active, date_joined, last_login
        FROM users WHERE username = $1
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn touch_last_login(pool: &PgPool, user_id: i64) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET last_login = now() WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Creates a user; returns `None` if the username is taken.
pub async fn create_user(
    pool: &PgPool,
    username: &str,
    password_hash: &str,
) -> Result<Option<i64>, AppError> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO users (username, password_hash)
        VALUES ($1, $2)
        ON CONFLICT (username) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(username)
    .bind(password_hash)
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

/// Replaces the password of an existing user; returns `false` if unknown.
pub async fn set_password(
    pool: &PgPool,
    username: &str,
    password_hash: &str,
) -> Result<bool, AppError> {
    let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE username = $1")
        .bind(username)
        .bind(password_hash)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}
