use crate::errors::{AppError, ResultExt};
use crate::ibge::IbgeClient;
use crate::ibge_models::{IbgeDistrict, IbgeMunicipality, IbgeState};
use crate::models::Region;
use crate::storage::{self, NewPlace};
use sqlx::{PgConnection, PgPool};
use std::collections::HashSet;

/// Rows per bulk insert.
pub const BATCH_SIZE: usize = 1000;

/// What one run created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IbgeImportSummary {
    pub regions_created: u64,
    pub states_created: u64,
    pub municipalities_created: u64,
    pub districts_created: u64,
}

/// Imports regions, states, municipalities and districts from the IBGE API
/// in a single transaction. Rows whose id already exists are left untouched.
pub async fn run(pool: &PgPool, client: &IbgeClient) -> Result<IbgeImportSummary, AppError> {
    tracing::info!("Starting import of IBGE data...");

    let mut tx = pool.begin().await.context("opening import transaction")?;
    let mut summary = IbgeImportSummary::default();

    tracing::info!("Importing Regions and States...");
    let states = client.get_states().await.context("fetching states")?;
    let (regions_created, states_created) = import_regions_and_states(&mut tx, &states)
        .await
        .context("importing regions and states")?;
    summary.regions_created = regions_created;
    summary.states_created = states_created;
    tracing::info!(
        "{} new regions and {} new states processed.",
        regions_created,
        states_created
    );

    tracing::info!("Bulk importing Municipalities...");
    let municipalities = client
        .get_all_municipalities()
        .await
        .context("fetching municipalities")?;
    summary.municipalities_created = import_municipalities(&mut tx, &municipalities)
        .await
        .context("importing municipalities")?;
    tracing::info!("{} new municipalities created.", summary.municipalities_created);

    tracing::info!("Bulk importing Districts...");
    let districts = client
        .get_all_districts()
        .await
        .context("fetching districts")?;
    summary.districts_created = import_districts(&mut tx, &districts)
        .await
        .context("importing districts")?;
    tracing::info!("{} new districts created.", summary.districts_created);

    tx.commit().await.context("committing import")?;
    tracing::info!("Import completed successfully!");

    Ok(summary)
}

async fn import_regions_and_states(
    conn: &mut PgConnection,
    states: &[IbgeState],
) -> Result<(u64, u64), AppError> {
    let mut regions_created = 0;
    let mut states_created = 0;

    for state in states {
        let region = Region {
            id: state.regiao.id,
            sigla: state.regiao.sigla.clone(),
            nome: state.regiao.nome.clone(),
        };
        if storage::insert_region_if_missing(&mut *conn, &region).await? {
            regions_created += 1;
        }

        if storage::insert_state_if_missing(
            &mut *conn,
            state.id,
            &state.sigla,
            &state.nome,
            region.id,
        )
        .await
        .with_context(|| format!("state {} ({})", state.id, state.sigla))?
        {
            states_created += 1;
        }
    }

    Ok((regions_created, states_created))
}

/// Municipalities that are new and whose state is known, in API order.
pub fn plan_municipalities(
    municipalities: &[IbgeMunicipality],
    existing_ids: &HashSet<i32>,
    state_ids: &HashSet<i32>,
) -> Vec<NewPlace> {
    let mut seen = HashSet::new();
    let mut to_create = Vec::new();

    for data in municipalities {
        if existing_ids.contains(&data.id) || !seen.insert(data.id) {
            continue;
        }

        let Some(state_id) = data.state_id() else {
            tracing::warn!(
                "Municipality {} ({}) is missing microrregiao data from API. Skipping.",
                data.id,
                data.nome
            );
            continue;
        };

        if state_ids.contains(&state_id) {
            to_create.push(NewPlace {
                id: data.id,
                nome: data.nome.clone(),
                parent_id: state_id,
            });
        } else {
            tracing::debug!(
                "Municipality {} ({}) references unknown state {}. Skipping.",
                data.id,
                data.nome,
                state_id
            );
        }
    }

    to_create
}

/// Districts that are new and whose municipality is known, in API order.
pub fn plan_districts(
    districts: &[IbgeDistrict],
    existing_ids: &HashSet<i32>,
    municipality_ids: &HashSet<i32>,
) -> Vec<NewPlace> {
    let mut seen = HashSet::new();

    districts
        .iter()
        .filter(|d| !existing_ids.contains(&d.id))
        .filter(|d| municipality_ids.contains(&d.municipio.id))
        .filter(|d| seen.insert(d.id))
        .map(|d| NewPlace {
            id: d.id,
            nome: d.nome.clone(),
            parent_id: d.municipio.id,
        })
        .collect()
}

async fn import_municipalities(
    conn: &mut PgConnection,
    municipalities: &[IbgeMunicipality],
) -> Result<u64, AppError> {
    let state_ids = storage::state_ids(&mut *conn).await?;
    let existing_ids = storage::municipality_ids(&mut *conn).await?;

    let to_create = plan_municipalities(municipalities, &existing_ids, &state_ids);

    let mut created = 0;
    for batch in to_create.chunks(BATCH_SIZE) {
        created += storage::insert_municipalities(&mut *conn, batch).await?;
    }
    Ok(created)
}

async fn import_districts(
    conn: &mut PgConnection,
    districts: &[IbgeDistrict],
) -> Result<u64, AppError> {
    let municipality_ids = storage::municipality_ids(&mut *conn).await?;
    let existing_ids = storage::district_ids(&mut *conn).await?;

    let to_create = plan_districts(districts, &existing_ids, &municipality_ids);

    let mut created = 0;
    for batch in to_create.chunks(BATCH_SIZE) {
        created += storage::insert_districts(&mut *conn, batch).await?;
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ibge_models::IbgeMunicipalityRef;
    use serde_json::json;

    fn municipality(id: i32, uf: Option<i32>) -> IbgeMunicipality {
        let micro = uf.map(|uf| {
            json!({
                "id": 1, "nome": "micro",
                "mesorregiao": {"id": 2, "nome": "meso", "UF": {
                    "id": uf, "sigla": "XX", "nome": "Estado",
                    "regiao": {"id": 1, "sigla": "N", "nome": "Norte"}
                }}
            })
        });
        serde_json::from_value(json!({"id": id, "nome": format!("M{}", id), "microrregiao": micro}))
            .unwrap()
    }

    fn district(id: i32, municipio: i32) -> IbgeDistrict {
        IbgeDistrict {
            id,
            nome: format!("D{}", id),
            municipio: IbgeMunicipalityRef { id: municipio },
        }
    }

    #[test]
    fn municipalities_skip_existing_unknown_and_orphaned() {
        let data = vec![
            municipality(1, Some(11)),
            municipality(2, Some(11)),
            municipality(3, Some(99)),
            municipality(4, None),
            municipality(1, Some(11)),
        ];
        let existing: HashSet<i32> = [2].into_iter().collect();
        let states: HashSet<i32> = [11].into_iter().collect();

        let plan = plan_municipalities(&data, &existing, &states);
        assert_eq!(
            plan,
            vec![NewPlace {
                id: 1,
                nome: "M1".to_string(),
                parent_id: 11
            }]
        );
    }

    #[test]
    fn districts_require_known_municipality() {
        let data = vec![district(10, 1), district(11, 2), district(12, 1)];
        let existing: HashSet<i32> = [12].into_iter().collect();
        let municipalities: HashSet<i32> = [1].into_iter().collect();

        let plan = plan_districts(&data, &existing, &municipalities);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].id, 10);
        assert_eq!(plan[0].parent_id, 1);
    }
}
