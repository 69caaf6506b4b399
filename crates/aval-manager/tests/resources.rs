mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::{read_json, TestApp, ADMIN, ADVISOR};
use serde_json::json;

#[tokio::test]
async fn guarantor_is_created_with_its_availability() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/avales",
            Some(ADMIN),
            json!({
                "nombre_completo": "Marta Solís",
                "email": "marta@example.com",
                "disponibilidades": [
                    {"fecha_inicio": "2024-05-06T09:00:00Z", "fecha_fin": "2024-05-06T18:00:00Z"}
                ]
            }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "body: {body}");
    assert_eq!(body["activo"], true);
    let blocks = app.tables.rows("disponibilidades_avales");
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0]["aval_id"], body["id"]);
}

#[tokio::test]
async fn inverted_availability_block_is_rejected() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/avales",
            Some(ADMIN),
            json!({
                "nombre_completo": "Marta Solís",
                "disponibilidades": [
                    {"fecha_inicio": "2024-05-06T18:00:00Z", "fecha_fin": "2024-05-06T09:00:00Z"}
                ]
            }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
    assert!(app.tables.rows("avales").is_empty());
}

#[tokio::test]
async fn staff_can_list_guarantors_but_only_admins_write() {
    let app = TestApp::new();
    app.guarantor_with_day("Marta Solís");

    let (status, body) = app.get("/avales", Some(ADVISOR)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let (status, _) = app
        .post("/avales", Some(ADVISOR), json!({"nombre_completo": "Nadie"}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/avales", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn credit_report_replaces_the_previous_upload() {
    let app = TestApp::new();
    let guarantor = app.seed_id(
        "avales",
        json!({"nombre_completo": "Marta Solís", "buro_credito_url": "avales/x/buro_credito/old.pdf"}),
    );
    app.objects.put(
        "documentos-aval",
        "avales/x/buro_credito/old.pdf",
        b"%PDF-1.4 old".to_vec(),
        "application/pdf",
    );

    let upload = |bytes: &'static [u8]| {
        Request::builder()
            .method(Method::PUT)
            .uri(format!("/avales/{guarantor}/buro-credito"))
            .header(header::AUTHORIZATION, format!("Bearer {ADMIN}"))
            .header(header::CONTENT_TYPE, "application/pdf")
            .body(Body::from(bytes))
            .expect("request builds")
    };

    let rejected = app.send(upload(b"%PDF-1.7 << /Encrypt 4 0 R >>")).await;
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

    let response = app.send(upload(b"%PDF-1.7 report")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let path = body["buro_credito_url"].as_str().expect("stored path");
    assert!(path.starts_with(&format!("avales/{guarantor}/buro_credito/")));

    assert_eq!(app.objects.paths("documentos-aval"), [path.to_string()]);
    assert_eq!(app.tables.rows("avales")[0]["buro_credito_url"], path);
}

#[tokio::test]
async fn crud_round_trip_with_missing_rows() {
    let app = TestApp::new();

    let (status, client) = app
        .post("/clientes", Some(ADMIN), json!({"nombre_completo": "Ana López"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = client["id"].as_str().expect("client id");

    let (status, updated) = app
        .put(&format!("/clientes/{id}"), Some(ADMIN), json!({"telefono": "3311112222"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["nombre_completo"], "Ana López");
    assert_eq!(updated["telefono"], "3311112222");

    let (status, _) = app
        .call(Method::DELETE, &format!("/clientes/{id}"), Some(ADMIN), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&format!("/clientes/{id}"), Some(ADMIN)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call(Method::DELETE, &format!("/clientes/{id}"), Some(ADMIN), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .put(&format!("/clientes/{id}"), Some(ADMIN), json!({"telefono": "3300000000"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn agency_names_are_unique_ignoring_case() {
    let app = TestApp::new();
    let (status, _) = app
        .post("/inmobiliarias", Some(ADMIN), json!({"nombre": "Casas del Sur"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .post("/inmobiliarias", Some(ADMIN), json!({"nombre": "casas del sur"}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, listed) = app.get("/inmobiliarias?q=SUR", Some(ADMIN)).await;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn advisor_listing_counts_commissions() {
    let app = TestApp::new();
    let advisor = app.seed_id("asesores", json!({"nombre": "Laura Méndez", "pago_comision": "10"}));
    app.tables.seed(
        "pagos_comisiones",
        vec![
            json!({"beneficiario_tipo": "asesor", "beneficiario_id": advisor, "monto": "100"}),
            json!({"beneficiario_tipo": "asesor", "beneficiario_id": advisor, "monto": "150"}),
        ],
    );

    let (status, body) = app.get("/asesores", Some(ADMIN)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["firmas_count"], 2);
}

#[tokio::test]
async fn lifting_a_veto_stamps_the_clearing_time() {
    let app = TestApp::new();
    let guarantor = app.guarantor_with_day("Marta Solís");

    let (status, veto) = app
        .post(
            "/vetos-avales",
            Some(ADMIN),
            json!({"aval_id": guarantor, "motivo": "no se presentó"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "body: {veto}");
    assert_eq!(veto["estatus"], "vetado");
    assert_eq!(veto["registrado_por"], app.admin_id.to_string());
    let id = veto["id"].as_str().expect("veto id");

    let (status, cleared) = app
        .put(&format!("/vetos-avales/{id}"), Some(ADMIN), json!({"estatus": "limpio"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(cleared["limpio_at"].is_string());

    let (_, active) = app
        .get(&format!("/vetos-avales?aval_id={guarantor}&estatus=vetado"), Some(ADMIN))
        .await;
    assert_eq!(active.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn service_payment_by_transfer_needs_a_receipt() {
    let app = TestApp::new();
    let signing = app.seed_id("firmas", json!({"cliente_nombre": "Carlos Ruiz"}));

    let (status, body) = app
        .post(
            "/pagos-servicio",
            Some(ADMIN),
            json!({"firma_id": signing, "monto_transferencia": "500"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"].to_string().contains("comprobante_url"));

    let (status, body) = app
        .post(
            "/pagos-servicio",
            Some(ADMIN),
            json!({"firma_id": signing, "monto_transferencia": "500", "comprobante_url": "pagos/t1.pdf"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "body: {body}");
}
