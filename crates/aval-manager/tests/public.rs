mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::{json, Value};
use uuid::Uuid;

fn names(body: &Value, key: &str) -> Vec<String> {
    body.as_array()
        .expect("array body")
        .iter()
        .filter_map(|row| row[key].as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn public_routes_need_no_token() {
    let app = TestApp::new();
    app.tables.seed(
        "vw_firmas_publicas",
        vec![
            json!({"fecha_inicio": "2024-05-08T10:00:00Z", "fecha_fin": "2024-05-08T11:00:00Z", "estado": "programada", "cliente_nombre": "Segunda"}),
            json!({"fecha_inicio": "2024-05-06T10:00:00Z", "fecha_fin": "2024-05-06T11:00:00Z", "estado": "programada", "cliente_nombre": "Primera"}),
            json!({"fecha_inicio": "2024-06-01T10:00:00Z", "fecha_fin": "2024-06-01T11:00:00Z", "estado": "cancelada", "cliente_nombre": "Fuera"}),
        ],
    );

    let (status, body) = app
        .get("/public/firmas?fecha_hasta=2024-05-31T00:00:00Z", None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body, "cliente_nombre"), ["Primera", "Segunda"]);
}

#[tokio::test]
async fn on_duty_falls_back_to_the_oldest_active_guarantor() {
    let app = TestApp::new();
    app.tables.seed(
        "avales",
        vec![
            json!({"nombre_completo": "Inactivo", "activo": false, "created_at": "2023-01-01T00:00:00Z"}),
            json!({"nombre_completo": "Veterano", "activo": true, "created_at": "2023-02-01T00:00:00Z"}),
            json!({"nombre_completo": "Nuevo", "activo": true, "created_at": "2024-02-01T00:00:00Z"}),
        ],
    );

    let (status, body) = app.get("/public/avales/en-turno", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nombre_completo"], "Veterano");
}

#[tokio::test]
async fn on_duty_follows_the_schedule_function() {
    let app = TestApp::new();
    let scheduled = app.seed_id(
        "avales",
        json!({"nombre_completo": "De turno", "activo": true, "created_at": "2024-03-01T00:00:00Z"}),
    );
    app.seed_id(
        "avales",
        json!({"nombre_completo": "Veterano", "activo": true, "created_at": "2023-01-01T00:00:00Z"}),
    );
    app.tables.seed(
        "disponibilidades_avales",
        vec![
            json!({"aval_id": scheduled, "fecha_inicio": "2024-05-07T09:00:00Z", "fecha_fin": "2024-05-07T18:00:00Z"}),
            json!({"aval_id": scheduled, "fecha_inicio": "2024-05-06T09:00:00Z", "fecha_fin": "2024-05-06T18:00:00Z"}),
        ],
    );
    let id = scheduled.to_string();
    app.tables
        .register_function("fn_aval_en_turno", move |_, _| Ok(json!([{ "fn_aval_en_turno": id }])));

    let (_, body) = app.get("/public/avales/en-turno", None).await;
    assert_eq!(body["nombre_completo"], "De turno");

    let (status, blocks) = app
        .get("/public/avales/en-turno/disponibilidades", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        names(&blocks, "fecha_inicio"),
        ["2024-05-06T09:00:00Z", "2024-05-07T09:00:00Z"]
    );
}

#[tokio::test]
async fn on_duty_documents_are_signed_links() {
    let app = TestApp::new();
    let guarantor = app.seed_id(
        "avales",
        json!({
            "nombre_completo": "De turno",
            "activo": true,
            "identificacion_oficial_url": "/storage/v1/object/public/documentos-aval/avales/x/ine.pdf"
        }),
    );
    let contract = app.seed_id("contratos", json!({"aval_id": guarantor}));
    app.tables.seed(
        "documentos",
        vec![json!({"contrato_id": contract, "tipo": "contrato", "archivo_path": "contratos/c1.pdf"})],
    );

    let (status, body) = app.get("/public/documentos/en-turno", None).await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    let documents = body.as_array().expect("array body");
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0]["archivo_path"], "contratos/c1.pdf");
    assert!(documents
        .iter()
        .all(|document| document["signed_url"].as_str().is_some_and(|url| url.contains("token="))));
}

#[tokio::test]
async fn guarantor_blacklist_defaults_to_active_entries() {
    let app = TestApp::new();
    let vetoed = app.seed_id("avales", json!({"nombre_completo": "Vetado"}));
    let cleared = app.seed_id("avales", json!({"nombre_completo": "Limpio"}));
    let agency = app.seed_id("inmobiliarias", json!({"nombre": "Casas del Sur"}));
    app.tables.seed(
        "vetos_avales",
        vec![
            json!({"aval_id": vetoed, "inmobiliaria_id": agency, "motivo": "no se presentó", "estatus": "vetado"}),
            json!({"aval_id": cleared, "motivo": "aclarado", "estatus": "limpio"}),
        ],
    );

    let (status, active) = app.get("/public/lista-negra/avales", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&active, "aval_nombre"), ["Vetado"]);
    assert_eq!(active[0]["inmobiliaria_nombre"], "Casas del Sur");

    let (_, all) = app
        .get("/public/lista-negra/avales?solo_activos=false", None)
        .await;
    assert_eq!(all.as_array().map(Vec::len), Some(2));

    let (_, scoped) = app
        .get(&format!("/public/lista-negra/avales?inmobiliaria_id={}", Uuid::new_v4()), None)
        .await;
    assert_eq!(scoped.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn client_blacklist_searches_the_reason() {
    let app = TestApp::new();
    let client = app.seed_id("clientes", json!({"nombre_completo": "Ana López"}));
    app.tables.seed(
        "clientes_morosidad",
        vec![
            json!({"cliente_id": client, "motivo": "Tres meses de ADEUDO", "estatus": "activo"}),
            json!({"cliente_id": client, "motivo": "daños al inmueble", "estatus": "vetado"}),
        ],
    );

    let (status, body) = app
        .get("/public/lista-negra/clientes?search=adeudo", None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body, "cliente_nombre"), ["Ana López"]);
    assert_eq!(body[0]["estatus"], "vetado");
}
