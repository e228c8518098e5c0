/// IBGE client tests against a mocked localities API.
use arko::errors::AppError;
use arko::ibge::IbgeClient;
use arko::ibge_import::{plan_districts, plan_municipalities};
use std::collections::HashSet;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn uf(id: i32, sigla: &str, nome: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id, "sigla": sigla, "nome": nome,
        "regiao": {"id": 4, "sigla": "S", "nome": "Sul"}
    })
}

#[tokio::test]
async fn test_states_are_requested_ordered_by_name() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/estados"))
        .and(query_param("orderBy", "nome"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            uf(41, "PR", "Paraná"),
            uf(43, "RS", "Rio Grande do Sul")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = IbgeClient::with_base_url(mock_server.uri()).unwrap();
    let states = client.get_states().await.unwrap();

    assert_eq!(states.len(), 2);
    assert_eq!(states[0].sigla, "PR");
    assert_eq!(states[0].regiao.sigla, "S");
    assert_eq!(states[1].id, 43);
}

#[tokio::test]
async fn test_municipalities_resolve_their_state() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/municipios"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "id": 4106902,
                "nome": "Curitiba",
                "microrregiao": {
                    "id": 41037, "nome": "Curitiba",
                    "mesorregiao": {"id": 4110, "nome": "Metropolitana de Curitiba", "UF": uf(41, "PR", "Paraná")}
                }
            },
            {
                "id": 4314902,
                "nome": "Porto Alegre",
                "microrregiao": null,
                "regiao-imediata": {
                    "id": 430001, "nome": "Porto Alegre",
                    "regiao-intermediaria": {"id": 4301, "nome": "Porto Alegre", "UF": uf(43, "RS", "Rio Grande do Sul")}
                }
            },
            {"id": 1, "nome": "Sem hierarquia", "microrregiao": null}
        ])))
        .mount(&mock_server)
        .await;

    let client = IbgeClient::with_base_url(format!("{}/", mock_server.uri())).unwrap();
    let municipalities = client.get_all_municipalities().await.unwrap();
    assert_eq!(municipalities.len(), 3);

    let states: HashSet<i32> = [41, 43].into_iter().collect();
    let plan = plan_municipalities(&municipalities, &HashSet::new(), &states);
    let planned: Vec<(i32, i32)> = plan.iter().map(|p| (p.id, p.parent_id)).collect();
    assert_eq!(planned, vec![(4106902, 41), (4314902, 43)]);
}

#[tokio::test]
async fn test_districts_are_planned_against_known_municipalities() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/distritos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": 410690205, "nome": "Curitiba", "municipio": {"id": 4106902, "nome": "Curitiba"}},
            {"id": 999999905, "nome": "Orphan", "municipio": {"id": 9999999, "nome": "?"}}
        ])))
        .mount(&mock_server)
        .await;

    let client = IbgeClient::with_base_url(mock_server.uri()).unwrap();
    let districts = client.get_all_districts().await.unwrap();

    let municipalities: HashSet<i32> = [4106902].into_iter().collect();
    let plan = plan_districts(&districts, &HashSet::new(), &municipalities);
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].id, 410690205);
}

#[tokio::test]
async fn test_server_error_is_an_external_api_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/estados"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&mock_server)
        .await;

    let client = IbgeClient::with_base_url(mock_server.uri()).unwrap();
    let err = client.get_states().await.unwrap_err();

    match err {
        AppError::ExternalApiError(msg) => {
            assert!(msg.contains("503"));
            assert!(msg.contains("maintenance"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_unexpected_payload_is_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/estados"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"erro": "x"})))
        .mount(&mock_server)
        .await;

    let client = IbgeClient::with_base_url(mock_server.uri()).unwrap();
    let err = client.get_states().await.unwrap_err();
    assert!(matches!(err, AppError::ExternalApiError(ref m) if m.contains("did not match schema")));
}
