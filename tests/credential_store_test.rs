// ABOUTME: Integration tests for the credential store lifecycle
// ABOUTME: Covers freshness, refresh, umbrella fallback minting, and storage failures
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use common::{
    create_test_database, seed_tenant_credential, seed_umbrella_credential, tenant_grant,
    umbrella_grant, StubConnector,
};
use moorgate::credentials::CredentialStore;
use moorgate::database::Database;
use moorgate::errors::ErrorCode;
use moorgate::oauth::PlatformConnector;

fn store_with(database: &Database, connector: &Arc<StubConnector>) -> CredentialStore {
    CredentialStore::new(
        database.clone(),
        Arc::clone(connector) as Arc<dyn PlatformConnector>,
    )
}

#[tokio::test]
async fn fresh_credential_is_returned_without_touching_the_platform() {
    let database = create_test_database().await.unwrap();
    seed_tenant_credential(&database, "loc_1", "stored_token", 3600)
        .await
        .unwrap();

    let connector = Arc::new(StubConnector::new());
    let store = store_with(&database, &connector);

    let first = store.get_or_refresh("loc_1").await.unwrap();
    let second = store.get_or_refresh("loc_1").await.unwrap();

    assert_eq!(first.as_deref(), Some("stored_token"));
    assert_eq!(first, second);
    assert_eq!(connector.exchange_count(), 0);
    assert_eq!(connector.refresh_count(), 0);
    assert_eq!(connector.mint_count(), 0);
}

#[tokio::test]
async fn expired_credential_is_refreshed_and_persisted() {
    let database = create_test_database().await.unwrap();
    seed_tenant_credential(&database, "loc_1", "stale_token", -120)
        .await
        .unwrap();

    let connector =
        Arc::new(StubConnector::new().with_refresh(tenant_grant("fresh_token", "loc_1")));
    let store = store_with(&database, &connector);

    let token = store.get_or_refresh("loc_1").await.unwrap();
    assert_eq!(token.as_deref(), Some("fresh_token"));
    assert_eq!(connector.refresh_count(), 1);

    // The replacement is durable, not just returned
    let stored = store.stored_tenant_credential("loc_1").await.unwrap().unwrap();
    assert_eq!(stored.access_token, "fresh_token");
}

#[tokio::test]
async fn credential_inside_expiry_buffer_counts_as_expired() {
    let database = create_test_database().await.unwrap();
    // 30 s of life left is inside the 60 s buffer
    seed_tenant_credential(&database, "loc_1", "nearly_dead", 30)
        .await
        .unwrap();

    let connector =
        Arc::new(StubConnector::new().with_refresh(tenant_grant("fresh_token", "loc_1")));
    let store = store_with(&database, &connector);

    let token = store.get_or_refresh("loc_1").await.unwrap();
    assert_eq!(token.as_deref(), Some("fresh_token"));
    assert_eq!(connector.refresh_count(), 1);
}

#[tokio::test]
async fn rejected_refresh_falls_back_to_umbrella_mint() {
    let database = create_test_database().await.unwrap();
    seed_tenant_credential(&database, "loc_1", "stale_token", -120)
        .await
        .unwrap();
    seed_umbrella_credential(&database, "agency_1", "umbrella_token", 3600)
        .await
        .unwrap();

    // No refresh grant scripted: the refresh is rejected
    let connector = Arc::new(StubConnector::new().with_mint(tenant_grant("minted_token", "loc_1")));
    let store = store_with(&database, &connector);

    let token = store.get_or_refresh("loc_1").await.unwrap();
    assert_eq!(token.as_deref(), Some("minted_token"));
    assert_eq!(connector.refresh_count(), 1);
    assert_eq!(connector.mint_count(), 1);

    let mints = connector.seen_mints.lock().unwrap();
    assert_eq!(
        mints[0],
        (
            "umbrella_token".to_owned(),
            "agency_1".to_owned(),
            "loc_1".to_owned()
        )
    );
}

#[tokio::test]
async fn no_credential_and_no_umbrella_is_a_quiet_none() {
    let database = create_test_database().await.unwrap();
    let connector = Arc::new(StubConnector::new());
    let store = store_with(&database, &connector);

    let token = store.get_or_refresh("loc_unknown").await.unwrap();
    assert!(token.is_none());
    assert_eq!(connector.refresh_count(), 0);
    assert_eq!(connector.mint_count(), 0);
}

#[tokio::test]
async fn missing_credential_is_minted_from_the_umbrella() {
    let database = create_test_database().await.unwrap();
    seed_umbrella_credential(&database, "agency_1", "umbrella_token", 3600)
        .await
        .unwrap();

    let connector = Arc::new(StubConnector::new().with_mint(tenant_grant("minted_token", "loc_7")));
    let store = store_with(&database, &connector);

    let token = store.get_or_refresh("loc_7").await.unwrap();
    assert_eq!(token.as_deref(), Some("minted_token"));

    let stored = store.stored_tenant_credential("loc_7").await.unwrap().unwrap();
    assert_eq!(stored.access_token, "minted_token");
}

#[tokio::test]
async fn failed_mint_is_needs_connect_not_an_error() {
    let database = create_test_database().await.unwrap();
    seed_umbrella_credential(&database, "agency_1", "umbrella_token", 3600)
        .await
        .unwrap();

    let connector = Arc::new(StubConnector::new());
    let store = store_with(&database, &connector);

    let token = store.get_or_refresh("loc_7").await.unwrap();
    assert!(token.is_none());
    assert_eq!(connector.mint_count(), 1);
}

#[tokio::test]
async fn expired_umbrella_refreshes_itself_before_minting() {
    let database = create_test_database().await.unwrap();
    seed_umbrella_credential(&database, "agency_1", "old_umbrella", -60)
        .await
        .unwrap();

    let connector = Arc::new(
        StubConnector::new()
            .with_refresh(umbrella_grant("new_umbrella", "agency_1", "loc_any"))
            .with_mint(tenant_grant("minted_token", "loc_1")),
    );
    let store = store_with(&database, &connector);

    let token = store.get_or_refresh("loc_1").await.unwrap();
    assert_eq!(token.as_deref(), Some("minted_token"));
    assert_eq!(connector.refresh_count(), 1);

    // The mint ran with the refreshed umbrella token
    let mints = connector.seen_mints.lock().unwrap();
    assert_eq!(mints[0].0, "new_umbrella");
    drop(mints);

    let stored = store.stored_umbrella_credential().await.unwrap().unwrap();
    assert_eq!(stored.access_token, "new_umbrella");
}

#[tokio::test]
async fn stale_token_is_never_served_even_when_all_recovery_fails() {
    let database = create_test_database().await.unwrap();
    seed_tenant_credential(&database, "loc_1", "stale_token", -120)
        .await
        .unwrap();

    // Refresh rejected, no umbrella to mint from
    let connector = Arc::new(StubConnector::new());
    let store = store_with(&database, &connector);

    let token = store.get_or_refresh("loc_1").await.unwrap();
    assert!(token.is_none());
    assert_eq!(connector.refresh_count(), 1);
    assert_eq!(connector.mint_count(), 0);
}

#[tokio::test]
async fn storage_failure_surfaces_as_storage_failed() {
    let database = create_test_database().await.unwrap();
    let connector = Arc::new(StubConnector::new());
    let store = store_with(&database, &connector);

    sqlx::query("DROP TABLE tenant_credentials")
        .execute(database.pool())
        .await
        .unwrap();

    let err = store.get_or_refresh("loc_1").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::StorageFailed);
}
