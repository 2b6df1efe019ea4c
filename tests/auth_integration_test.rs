mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use sea_orm::{ActiveModelTrait, Database, Set};
use sea_orm_migration::MigratorTrait;
use serde_json::json;
use torre_controle::{
    auth::{
        AuthService, CostLoginRequest, SeaOrmCredentialStore, MSG_AUTHORIZED, MSG_MISSING_FIELDS,
        MSG_UNKNOWN_USER, MSG_WRONG_PASSWORD,
    },
    entities::cost_user,
    migrator::Migrator,
};

use common::{response_json, TestApp, COST_PASSWORD, COST_USER};

#[tokio::test]
async fn valid_credentials_are_authorized() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/api/auth/custos",
            Some(json!({"usuario": COST_USER, "senha": COST_PASSWORD})),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body, json!({"success": true, "message": MSG_AUTHORIZED}));
}

#[tokio::test]
async fn wrong_password_and_unknown_user_are_rejected() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/auth/custos",
            Some(json!({"usuario": COST_USER, "senha": "errada"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], MSG_WRONG_PASSWORD);

    let response = app
        .request(
            Method::POST,
            "/api/auth/custos",
            Some(json!({"usuario": "fantasma", "senha": "x"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response_json(response).await["message"], MSG_UNKNOWN_USER);
}

#[tokio::test]
async fn missing_or_unreadable_fields_are_bad_requests() {
    let app = TestApp::new().await;

    for body in [json!({}), json!({"usuario": COST_USER}), json!({"usuario": "", "senha": ""})] {
        let response = app.request(Method::POST, "/api/auth/custos", Some(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response_json(response).await["message"], MSG_MISSING_FIELDS);
    }

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/custos")
        .header("content-type", "application/json")
        .body(Body::from("{usuario"))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_json(response).await["success"], false);
}

#[tokio::test]
async fn database_credentials_round_trip() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    let store = SeaOrmCredentialStore::new(Arc::new(db));
    store.create_user("carla", "primeira").await.unwrap();
    // Creating again replaces the password.
    store.create_user("carla", "segunda").await.unwrap();

    let auth = AuthService::new(Arc::new(store));
    let login = |senha: &str| CostLoginRequest {
        usuario: Some("carla".to_string()),
        senha: Some(senha.to_string()),
    };

    assert!(auth.verify_cost_login(login("segunda")).await.unwrap().success);
    assert!(auth.verify_cost_login(login("primeira")).await.is_err());
}

#[tokio::test]
async fn bcrypt_rows_from_the_legacy_table_log_in() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    cost_user::ActiveModel {
        name: Set("maria".to_string()),
        password_hash: Set(
            "$2a$10$KRGxLBS0Lxe3Mhq6NR29O.391tV8NmLVk9ka8NodZzBrdhhQrAF2a".to_string(),
        ),
    }
    .insert(&db)
    .await
    .unwrap();

    let auth = AuthService::new(Arc::new(SeaOrmCredentialStore::new(Arc::new(db))));
    let login = |senha: &str| CostLoginRequest {
        usuario: Some("maria".to_string()),
        senha: Some(senha.to_string()),
    };

    assert!(auth.verify_cost_login(login("password")).await.unwrap().success);
    assert!(auth.verify_cost_login(login("errada")).await.is_err());
}
