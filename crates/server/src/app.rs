//! Application state and router assembly.

use std::sync::Arc;

use axum::Router;
use quotedesk_core::config::AppConfig;
use quotedesk_db::DbPool;

use crate::mailer::MailTransport;
use crate::storage::FileStore;
use crate::{attachments, auth, clients, health, products, quotes};

/// Shared per-request context: the pool, the loaded configuration, and the
/// mail/file collaborators behind their traits.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub config: Arc<AppConfig>,
    pub mailer: Arc<dyn MailTransport>,
    pub files: Arc<dyn FileStore>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/auth", auth::router(state.clone()))
        .nest("/api/client", clients::router(state.clone()))
        .nest("/api/product", products::router(state.clone()))
        .nest("/api/quote", quotes::router(state.clone()))
        .nest("/api/quote-attachment", attachments::router(state.clone()))
        .merge(health::router(state.db_pool.clone()))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    use quotedesk_core::auth::{hash_password, sign_token};
    use quotedesk_core::config::AppConfig;
    use quotedesk_db::migrations::run_pending;
    use quotedesk_db::repositories::{SqlUserRepository, UserRepository};
    use quotedesk_db::{connect_with_settings, DbPool};

    use crate::mailer::{MailError, MailTransport, OutboundEmail};
    use crate::storage::LocalFileStore;

    use super::{build_router, AppState};

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<OutboundEmail>>,
    }

    #[async_trait]
    impl MailTransport for RecordingMailer {
        async fn send(&self, email: OutboundEmail) -> Result<(), MailError> {
            self.sent.lock().expect("mailer lock").push(email);
            Ok(())
        }
    }

    struct FailingMailer;

    #[async_trait]
    impl MailTransport for FailingMailer {
        async fn send(&self, _email: OutboundEmail) -> Result<(), MailError> {
            Err(MailError::Smtp("connection refused".to_string()))
        }
    }

    struct Harness {
        router: Router,
        db_pool: DbPool,
        upload_dir: tempfile::TempDir,
        mailer: Arc<RecordingMailer>,
        jwt_secret: secrecy::SecretString,
    }

    async fn harness() -> Harness {
        harness_inner(None).await
    }

    async fn harness_with_failing_mailer() -> Harness {
        harness_inner(Some(Arc::new(FailingMailer))).await
    }

    async fn harness_inner(mail_override: Option<Arc<dyn MailTransport>>) -> Harness {
        let db_pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        run_pending(&db_pool).await.expect("migrate");

        let upload_dir = tempfile::tempdir().expect("tempdir");
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "integration-secret".to_string().into();
        config.storage.upload_dir = upload_dir.path().to_path_buf();

        let recording = Arc::new(RecordingMailer::default());
        let mailer: Arc<dyn MailTransport> = match mail_override {
            Some(failing) => failing,
            None => recording.clone(),
        };

        let jwt_secret = config.auth.jwt_secret.clone();
        let state = AppState {
            db_pool: db_pool.clone(),
            config: Arc::new(config),
            mailer,
            files: Arc::new(LocalFileStore::new(upload_dir.path().to_path_buf())),
        };

        Harness {
            router: build_router(state),
            db_pool,
            upload_dir,
            mailer: recording,
            jwt_secret,
        }
    }

    impl Harness {
        async fn seed_user(&self, username: &str, email: &str, is_admin: bool) -> String {
            let password_hash = hash_password("hunter2").expect("hash");
            let user_id = SqlUserRepository::new(self.db_pool.clone())
                .create(username, email, &password_hash, is_admin)
                .await
                .expect("seed user");
            sign_token(&self.jwt_secret, user_id, 24).expect("sign token")
        }

        async fn request(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Vec<u8>) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let request = match body {
                Some(value) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(value.to_string()))
                    .expect("request"),
                None => builder.body(Body::empty()).expect("request"),
            };

            let response = self.router.clone().oneshot(request).await.expect("response");
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .expect("body")
                .to_vec();
            (status, bytes)
        }

        async fn request_json(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let (status, bytes) = self.request(method, uri, token, body).await;
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).expect("json body")
            };
            (status, value)
        }

        /// Upload an attachment file and return its id.
        async fn upload_attachment(&self, token: &str, name: &str, kind: i64, data: &[u8]) -> i64 {
            let uri = format!(
                "/api/quote-attachment?name={name}&attachment_type={kind}&file_name={name}.pdf"
            );
            let request = Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::from(data.to_vec()))
                .expect("request");
            let response = self.router.clone().oneshot(request).await.expect("response");
            assert_eq!(response.status(), StatusCode::CREATED);
            let bytes =
                axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
            let value: Value = serde_json::from_slice(&bytes).expect("json");
            value["attachment_id"].as_i64().expect("attachment id")
        }
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|window| window == needle)
    }

    async fn seed_catalog(harness: &Harness, token: &str) -> (i64, i64) {
        let (status, body) = harness
            .request_json(
                "POST",
                "/api/client",
                Some(token),
                Some(json!({
                    "identification_type": 1,
                    "fullname": "Ada Lovelace",
                    "company_name": null,
                    "id_number": "123",
                    "contact": "555 0100",
                    "email": "a@x.com",
                    "address": "12 Analytical St",
                    "department": "Cundinamarca",
                    "city": "Bogota",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "client create failed: {body}");
        let client_id = body["client_id"].as_i64().expect("client id");

        let (status, body) = harness
            .request_json(
                "POST",
                "/api/product",
                Some(token),
                Some(json!({
                    "product_type": 1,
                    "name": "Control board",
                    "description": "Industrial control board",
                    "price": 100.0,
                    "tax": 19,
                    "stock": 5,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "product create failed: {body}");
        let product_id = body["product_id"].as_i64().expect("product id");

        (client_id, product_id)
    }

    async fn create_quote(harness: &Harness, token: &str, client_id: i64, product_id: i64) -> i64 {
        let (status, body) = harness
            .request_json(
                "POST",
                "/api/quote",
                Some(token),
                Some(json!({
                    "client_id": client_id,
                    "notes": "deliver by friday",
                    "items": [
                        { "product_id": product_id, "price": 119.0, "quantity": 2, "tax": 19 }
                    ],
                    "total": 238.0,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "quote create failed: {body}");
        body["quote_id"].as_i64().expect("quote id")
    }

    #[tokio::test]
    async fn unauthenticated_requests_are_rejected() {
        let harness = harness().await;

        let (status, _) = harness.request_json("GET", "/api/quote", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) =
            harness.request_json("GET", "/api/quote", Some("not-a-real-token"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn inactive_accounts_cannot_authenticate() {
        let harness = harness().await;
        let admin = harness.seed_user("root", "root@example.com", true).await;
        let token = harness.seed_user("worker", "worker@example.com", false).await;

        let (status, user) =
            harness.request_json("GET", "/api/auth/user", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let user_id = user["id"].as_i64().expect("user id");

        let (status, _) = harness
            .request_json("POST", &format!("/api/auth/user/{user_id}"), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = harness.request_json("GET", "/api/auth/user", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "deactivated user keeps a valid token");
    }

    #[tokio::test]
    async fn login_issues_a_working_token() {
        let harness = harness().await;
        harness.seed_user("ada", "ada@example.com", false).await;

        let (status, body) = harness
            .request_json(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": "ada@example.com", "password": "hunter2" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().expect("token").to_string();

        let (status, user) =
            harness.request_json("GET", "/api/auth/user", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user["username"], "ada");

        let (status, _) = harness
            .request_json(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": "ada@example.com", "password": "wrong" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_gate_blocks_regular_users() {
        let harness = harness().await;
        let regular = harness.seed_user("worker", "worker@example.com", false).await;
        let admin = harness.seed_user("boss", "boss@example.com", true).await;

        let (status, _) = harness.request_json("GET", "/api/auth/users", Some(&regular), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, users) = harness.request_json("GET", "/api/auth/users", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(users.as_array().expect("array").len(), 2);
    }

    #[tokio::test]
    async fn duplicate_clients_are_rejected_with_conflict() {
        let harness = harness().await;
        let token = harness.seed_user("ada", "ada@example.com", false).await;
        seed_catalog(&harness, &token).await;

        // Same id number, different email.
        let (status, _) = harness
            .request_json(
                "POST",
                "/api/client",
                Some(&token),
                Some(json!({
                    "identification_type": 1,
                    "fullname": "Someone Else",
                    "company_name": null,
                    "id_number": "123",
                    "contact": "555 0199",
                    "email": "someone@else.com",
                    "address": "9 Other St",
                    "department": "Valle",
                    "city": "Cali",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clients")
            .fetch_one(&harness.db_pool)
            .await
            .expect("count");
        assert_eq!(count, 1, "the conflicting insert must not create a row");
    }

    #[tokio::test]
    async fn invalid_status_leaves_the_stored_status_unchanged() {
        let harness = harness().await;
        let token = harness.seed_user("ada", "ada@example.com", false).await;
        let (client_id, product_id) = seed_catalog(&harness, &token).await;
        let quote_id = create_quote(&harness, &token, client_id, product_id).await;

        let (status, _) = harness
            .request_json(
                "POST",
                &format!("/api/quote/update-status/{quote_id}"),
                Some(&token),
                Some(json!({ "status": "Approved" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, detail) = harness
            .request_json("GET", &format!("/api/quote/{quote_id}"), Some(&token), None)
            .await;
        assert_eq!(detail["status"], "Pending");
    }

    #[tokio::test]
    async fn delete_quote_requires_the_admin_capability() {
        let harness = harness().await;
        let regular = harness.seed_user("worker", "worker@example.com", false).await;
        let admin = harness.seed_user("boss", "boss@example.com", true).await;
        let (client_id, product_id) = seed_catalog(&harness, &regular).await;
        let quote_id = create_quote(&harness, &regular, client_id, product_id).await;

        let (status, _) = harness
            .request_json("DELETE", &format!("/api/quote/{quote_id}"), Some(&regular), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = harness
            .request_json("DELETE", &format!("/api/quote/{quote_id}"), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = harness
            .request_json("GET", &format!("/api/quote/{quote_id}"), Some(&regular), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn end_to_end_quote_renders_the_expected_totals() {
        let harness = harness().await;
        let token = harness.seed_user("ada", "ada@example.com", false).await;
        let (client_id, product_id) = seed_catalog(&harness, &token).await;
        let quote_id = create_quote(&harness, &token, client_id, product_id).await;

        let (status, detail) = harness
            .request_json("GET", &format!("/api/quote/{quote_id}"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["items"].as_array().expect("items").len(), 1);
        assert_eq!(detail["total"], 238.0);
        assert_eq!(detail["client"]["id_number"], "123");

        let (status, pdf) = harness
            .request("GET", &format!("/api/quote/generate-pdf/{quote_id}"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(contains(&pdf, b"SUBTOTAL: $200.00"), "pdf must show the tax-exclusive subtotal");
        assert!(contains(&pdf, b"TAX: $38.00"), "pdf must show the decomposed tax");
        assert!(contains(&pdf, b"TOTAL: $238.00"));
    }

    #[tokio::test]
    async fn caller_total_is_advisory_and_recomputed() {
        let harness = harness().await;
        let token = harness.seed_user("ada", "ada@example.com", false).await;
        let (client_id, product_id) = seed_catalog(&harness, &token).await;

        let (status, body) = harness
            .request_json(
                "POST",
                "/api/quote",
                Some(&token),
                Some(json!({
                    "client_id": client_id,
                    "items": [
                        { "product_id": product_id, "price": 119.0, "quantity": 2, "tax": 19 }
                    ],
                    "total": 9999.0,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let quote_id = body["quote_id"].as_i64().expect("quote id");

        let (_, detail) = harness
            .request_json("GET", &format!("/api/quote/{quote_id}"), Some(&token), None)
            .await;
        assert_eq!(detail["total"], 238.0, "stored total comes from the line items");
    }

    #[tokio::test]
    async fn send_email_delivers_pdf_and_skips_missing_attachment_files() {
        let harness = harness().await;
        let token = harness.seed_user("ada", "ada@example.com", false).await;
        let (client_id, product_id) = seed_catalog(&harness, &token).await;
        let quote_id = create_quote(&harness, &token, client_id, product_id).await;

        let kept_id = harness.upload_attachment(&token, "catalog", 1, b"kept-bytes").await;
        let missing_id = harness.upload_attachment(&token, "brochure", 1, b"missing-bytes").await;

        // Remove the second attachment's file from disk behind the store's
        // back, simulating an orphaned row.
        let url: String = sqlx::query_scalar("SELECT url FROM attachments WHERE id = ?")
            .bind(missing_id)
            .fetch_one(&harness.db_pool)
            .await
            .expect("url");
        let stored_name = url.strip_prefix("/attachment/").expect("url prefix");
        std::fs::remove_file(harness.upload_dir.path().join(stored_name)).expect("remove file");

        let (status, outcome) = harness
            .request_json(
                "POST",
                "/api/quote/send-quote-email",
                Some(&token),
                Some(json!({
                    "quote_id": quote_id,
                    "emails": ["a@x.com", "copy@x.com"],
                    "attachment_type": 1,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "missing file must not fail the send: {outcome}");
        assert_eq!(outcome["attachments_included"].as_array().expect("included").len(), 1);
        assert_eq!(outcome["attachments_skipped"].as_array().expect("skipped").len(), 1);

        let sent = harness.mailer.sent.lock().expect("mailer lock");
        assert_eq!(sent.len(), 1);
        let email = &sent[0];
        assert_eq!(email.to, vec!["a@x.com".to_string(), "copy@x.com".to_string()]);
        assert_eq!(email.subject, format!("Quote No. {quote_id}"));
        // Quote PDF first, then the one surviving supplementary file.
        assert_eq!(email.attachments.len(), 2);
        assert_eq!(email.attachments[0].filename, format!("quote_{quote_id}.pdf"));
        assert!(contains(&email.attachments[0].data, b"SUBTOTAL: $200.00"));
        assert_eq!(email.attachments[1].data, b"kept-bytes");
        let _ = kept_id;
    }

    #[tokio::test]
    async fn send_email_defaults_to_the_client_recipient_list() {
        let harness = harness().await;
        let token = harness.seed_user("ada", "ada@example.com", false).await;
        let (client_id, product_id) = seed_catalog(&harness, &token).await;
        let quote_id = create_quote(&harness, &token, client_id, product_id).await;

        let (status, _) = harness
            .request_json(
                "POST",
                &format!("/api/client/{client_id}/emails"),
                Some(&token),
                Some(json!({ "email": "alternate@x.com" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = harness
            .request_json(
                "POST",
                "/api/quote/send-quote-email",
                Some(&token),
                Some(json!({ "quote_id": quote_id })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let sent = harness.mailer.sent.lock().expect("mailer lock");
        assert_eq!(sent[0].to, vec!["a@x.com".to_string(), "alternate@x.com".to_string()]);
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_send_failure() {
        let harness = harness_with_failing_mailer().await;
        let token = harness.seed_user("ada", "ada@example.com", false).await;
        let (client_id, product_id) = seed_catalog(&harness, &token).await;
        let quote_id = create_quote(&harness, &token, client_id, product_id).await;

        let (status, _) = harness
            .request_json(
                "POST",
                "/api/quote/send-quote-email",
                Some(&token),
                Some(json!({ "quote_id": quote_id })),
            )
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn replace_all_update_through_the_api() {
        let harness = harness().await;
        let token = harness.seed_user("ada", "ada@example.com", false).await;
        let (client_id, product_id) = seed_catalog(&harness, &token).await;
        let quote_id = create_quote(&harness, &token, client_id, product_id).await;

        let (status, _) = harness
            .request_json(
                "PUT",
                &format!("/api/quote/{quote_id}"),
                Some(&token),
                Some(json!({
                    "client_id": client_id,
                    "notes": "second revision",
                    "status": "Accepted",
                    "items": [
                        { "product_id": product_id, "price": 50.0, "quantity": 1, "tax": 0 },
                        { "product_id": product_id, "price": 121.0, "quantity": 1, "tax": 21 },
                        { "product_id": product_id, "price": 10.0, "quantity": 3, "tax": 0 }
                    ],
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, detail) = harness
            .request_json("GET", &format!("/api/quote/{quote_id}"), Some(&token), None)
            .await;
        assert_eq!(detail["items"].as_array().expect("items").len(), 3);
        assert_eq!(detail["status"], "Accepted");
        assert_eq!(detail["total"], 201.0);
    }
}
