mod common;

use axum::http::{Method, StatusCode};
use common::{signing_body, TestApp, ADMIN, ADVISOR};
use serde_json::json;

#[tokio::test]
async fn admin_books_inside_availability() {
    let app = TestApp::new();
    let guarantor = app.guarantor_with_day("Marta Solís");

    let (status, body) = app
        .post(
            "/firmas",
            Some(ADMIN),
            signing_body(guarantor, "2024-05-06T10:00:00Z", "2024-05-06T11:00:00Z"),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "body: {body}");
    assert_eq!(body["estado"], "programada");
    assert_eq!(body["creado_por"], app.admin_id.to_string());
    assert_eq!(app.tables.rows("firmas").len(), 1);
}

#[tokio::test]
async fn overlapping_booking_is_a_conflict_but_adjacent_is_not() {
    let app = TestApp::new();
    let guarantor = app.guarantor_with_day("Marta Solís");
    let (first, _) = app
        .post(
            "/firmas",
            Some(ADMIN),
            signing_body(guarantor, "2024-05-06T10:00:00Z", "2024-05-06T11:00:00Z"),
        )
        .await;
    assert_eq!(first, StatusCode::CREATED);

    let (overlap, body) = app
        .post(
            "/firmas",
            Some(ADMIN),
            signing_body(guarantor, "2024-05-06T10:30:00Z", "2024-05-06T11:30:00Z"),
        )
        .await;
    assert_eq!(overlap, StatusCode::CONFLICT, "body: {body}");

    let (adjacent, body) = app
        .post(
            "/firmas",
            Some(ADMIN),
            signing_body(guarantor, "2024-05-06T11:00:00Z", "2024-05-06T12:00:00Z"),
        )
        .await;
    assert_eq!(adjacent, StatusCode::CREATED, "body: {body}");
    assert_eq!(app.tables.rows("firmas").len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_overlapping_bookings_admit_exactly_one() {
    let app = TestApp::new();
    let guarantor = app.guarantor_with_day("Marta Solís");

    let book = |start: &'static str, end: &'static str| {
        let app = app.clone();
        tokio::spawn(async move {
            app.post("/firmas", Some(ADMIN), signing_body(guarantor, start, end))
                .await
        })
    };
    let first = book("2024-05-06T10:00:00Z", "2024-05-06T11:00:00Z");
    let second = book("2024-05-06T10:30:00Z", "2024-05-06T11:30:00Z");
    let (first, second) = tokio::join!(first, second);
    let outcomes = [first.expect("task joins"), second.expect("task joins")];

    let created = outcomes
        .iter()
        .filter(|(status, _)| *status == StatusCode::CREATED)
        .count();
    let conflicts: Vec<_> = outcomes
        .iter()
        .filter(|(status, _)| *status == StatusCode::CONFLICT)
        .collect();
    assert_eq!(created, 1, "outcomes: {outcomes:?}");
    assert_eq!(conflicts.len(), 1, "outcomes: {outcomes:?}");
    assert_eq!(conflicts[0].1["error"], "double-booked");
    assert_eq!(app.tables.rows("firmas").len(), 1);
}

#[tokio::test]
async fn cancelled_signing_frees_the_slot() {
    let app = TestApp::new();
    let guarantor = app.guarantor_with_day("Marta Solís");
    let (_, created) = app
        .post(
            "/firmas",
            Some(ADMIN),
            signing_body(guarantor, "2024-05-06T10:00:00Z", "2024-05-06T11:00:00Z"),
        )
        .await;
    let id = created["id"].as_str().expect("signing id");

    let (status, body) = app
        .put(&format!("/firmas/{id}"), Some(ADMIN), json!({"estado": "cancelada"}))
        .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["estado"], "cancelada");

    let (status, _) = app
        .post(
            "/firmas",
            Some(ADMIN),
            signing_body(guarantor, "2024-05-06T10:00:00Z", "2024-05-06T11:00:00Z"),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn booking_outside_availability_is_rejected() {
    let app = TestApp::new();
    let guarantor = app.guarantor_with_day("Marta Solís");

    let (status, body) = app
        .post(
            "/firmas",
            Some(ADMIN),
            signing_body(guarantor, "2024-05-06T17:30:00Z", "2024-05-06T18:30:00Z"),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "body: {body}");
    assert!(app.tables.rows("firmas").is_empty());
}

#[tokio::test]
async fn vetoed_guarantor_cannot_be_booked() {
    let app = TestApp::new();
    let guarantor = app.guarantor_with_day("Marta Solís");
    app.tables.seed(
        "vetos_avales",
        vec![json!({"aval_id": guarantor, "motivo": "documentos falsos", "estatus": "activo"})],
    );

    let (status, body) = app
        .post(
            "/firmas",
            Some(ADMIN),
            signing_body(guarantor, "2024-05-06T10:00:00Z", "2024-05-06T11:00:00Z"),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"]
        .as_str()
        .is_some_and(|message| message.contains("veto")));
}

#[tokio::test]
async fn blacklisted_client_cannot_be_booked() {
    let app = TestApp::new();
    let guarantor = app.guarantor_with_day("Marta Solís");
    let client = app.seed_id("clientes", json!({"nombre_completo": "Carlos Ruiz"}));
    app.tables.seed(
        "clientes_morosidad",
        vec![json!({"cliente_id": client, "motivo": "adeudo", "estatus": "vetado"})],
    );
    let mut body = signing_body(guarantor, "2024-05-06T10:00:00Z", "2024-05-06T11:00:00Z");
    body["cliente_id"] = json!(client);

    let (status, _) = app.post("/firmas", Some(ADMIN), body).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn invalid_draft_reports_fields() {
    let app = TestApp::new();
    let guarantor = app.guarantor_with_day("Marta Solís");
    let mut body = signing_body(guarantor, "2024-05-06T10:00:00Z", "2024-05-06T11:00:00Z");
    body["cliente_nombre"] = json!("Al");
    body["ubicacion_maps_url"] = json!("ftp://maps");

    let (status, body) = app.post("/firmas", Some(ADMIN), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields = body["fields"].to_string();
    assert!(fields.contains("cliente_nombre"), "fields: {fields}");
    assert!(fields.contains("ubicacion_maps_url"), "fields: {fields}");
}

#[tokio::test]
async fn end_before_start_is_invalid() {
    let app = TestApp::new();
    let guarantor = app.guarantor_with_day("Marta Solís");

    let (status, _) = app
        .post(
            "/firmas",
            Some(ADMIN),
            signing_body(guarantor, "2024-05-06T11:00:00Z", "2024-05-06T10:00:00Z"),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_routes_require_an_admin() {
    let app = TestApp::new();

    let (anonymous, _) = app.get("/firmas", None).await;
    assert_eq!(anonymous, StatusCode::UNAUTHORIZED);

    let (unknown, _) = app.get("/firmas", Some("nobody")).await;
    assert_eq!(unknown, StatusCode::UNAUTHORIZED);

    let (advisor, _) = app.call(Method::GET, "/firmas", Some(ADVISOR), None).await;
    assert_eq!(advisor, StatusCode::FORBIDDEN);
}
