//! Payloads of the IBGE localities API (`/api/v1/localidades`).
//!
//! Only the fields the importer needs are modelled; unknown fields are ignored.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IbgeRegion {
    pub id: i32,
    pub nome: String,
    pub sigla: String,
}

/// Entry of `GET estados`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IbgeState {
    pub id: i32,
    pub nome: String,
    pub sigla: String,
    pub regiao: IbgeRegion,
}

/// Federative unit as nested inside mesoregions and intermediate regions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IbgeUf {
    pub id: i32,
    pub sigla: String,
    pub nome: String,
    pub regiao: IbgeRegion,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IbgeMesoregion {
    pub id: i32,
    pub nome: String,
    #[serde(rename = "UF")]
    pub uf: IbgeUf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IbgeMicroregion {
    pub id: i32,
    pub nome: String,
    #[serde(default)]
    pub mesorregiao: Option<IbgeMesoregion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IbgeIntermediateRegion {
    pub id: i32,
    pub nome: String,
    #[serde(rename = "UF")]
    pub uf: IbgeUf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IbgeImmediateRegion {
    pub id: i32,
    pub nome: String,
    #[serde(rename = "regiao-intermediaria")]
    pub regiao_intermediaria: IbgeIntermediateRegion,
}

/// Entry of `GET municipios`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IbgeMunicipality {
    pub id: i32,
    pub nome: String,
    #[serde(default)]
    pub microrregiao: Option<IbgeMicroregion>,
    #[serde(rename = "regiao-imediata", default)]
    pub regiao_imediata: Option<IbgeImmediateRegion>,
}

impl IbgeMunicipality {
    /// Id of the state the municipality belongs to, taken from the
    /// microregion's mesoregion, else from the immediate region's
    /// intermediate region.
    pub fn state_id(&self) -> Option<i32> {
        self.microrregiao
            .as_ref()
            .and_then(|micro| micro.mesorregiao.as_ref())
            .map(|meso| meso.uf.id)
            .or_else(|| {
                self.regiao_imediata
                    .as_ref()
                    .map(|imediata| imediata.regiao_intermediaria.uf.id)
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IbgeMunicipalityRef {
    pub id: i32,
}

/// Entry of `GET distritos`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IbgeDistrict {
    pub id: i32,
    pub nome: String,
    pub municipio: IbgeMunicipalityRef,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn uf(id: i32) -> serde_json::Value {
        json!({
            "id": id, "sigla": "PR", "nome": "Paraná",
            "regiao": {"id": 4, "sigla": "S", "nome": "Sul"}
        })
    }

    #[test]
    fn state_comes_from_mesoregion() {
        let m: IbgeMunicipality = serde_json::from_value(json!({
            "id": 4106902,
            "nome": "Curitiba",
            "microrregiao": {
                "id": 41037, "nome": "Curitiba",
                "mesorregiao": {"id": 4110, "nome": "Metropolitana de Curitiba", "UF": uf(41)}
            },
            "regiao-imediata": {
                "id": 410001, "nome": "Curitiba",
                "regiao-intermediaria": {"id": 4101, "nome": "Curitiba", "UF": uf(41)}
            }
        }))
        .unwrap();
        assert_eq!(m.state_id(), Some(41));
    }

    #[test]
    fn state_falls_back_to_immediate_region() {
        let m: IbgeMunicipality = serde_json::from_value(json!({
            "id": 5101837,
            "nome": "Boa Esperança do Norte",
            "microrregiao": null,
            "regiao-imediata": {
                "id": 510010, "nome": "Sorriso",
                "regiao-intermediaria": {"id": 5103, "nome": "Sinop", "UF": uf(51)}
            }
        }))
        .unwrap();
        assert_eq!(m.state_id(), Some(51));
    }

    #[test]
    fn municipality_without_hierarchy_has_no_state() {
        let m: IbgeMunicipality =
            serde_json::from_value(json!({"id": 1, "nome": "Nowhere"})).unwrap();
        assert_eq!(m.state_id(), None);
    }
}
