//! Shared fixtures: in-memory stand-ins for the portal API, the identity
//! provider and the invoicing API, plus request helpers.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::body::{to_bytes, Body, Bytes};
use axum::http::{header, Request, Response, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use derator_portal::relay::BlobRef;
use derator_portal::session::{Identity, IdentityProvider, Session};
use derator_portal::upstream::records::Invoice;
use derator_portal::upstream::{
    BlobPayload, CustomerAccount, Endpoint, InvoiceError, InvoiceSource, PhotoUpload, PortalApi, RemediationUpdate,
};
use derator_portal::{router, AppState, PortalConfig};

pub const PASSWORD: &str = "heslo123";
pub const VERIFIED: &str = "jana@firma.cz";
pub const UNVERIFIED: &str = "novy@firma.cz";

pub fn account(id: i64, name: &str, legal_id: Option<&str>) -> CustomerAccount {
    serde_json::from_value(json!({
        "ZakaznikId": id,
        "Nazev": name,
        "IC": legal_id,
        "Color": "success",
    }))
    .unwrap()
}

/// Portal API backed by canned JSON, recording every call it sees.
#[derive(Default)]
pub struct MockApi {
    pub accounts: Mutex<Vec<CustomerAccount>>,
    records: Mutex<HashMap<(Endpoint, String), Value>>,
    failing: Mutex<HashSet<Endpoint>>,
    pub calls: Mutex<Vec<(Endpoint, String)>>,
    pub blob_calls: AtomicUsize,
    pub remediations: Mutex<Vec<RemediationUpdate>>,
    pub uploads: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
}

impl MockApi {
    pub fn with_accounts(accounts: Vec<CustomerAccount>) -> Self {
        let api = Self::default();
        *api.accounts.lock().unwrap() = accounts;
        api
    }

    pub fn serve(&self, endpoint: Endpoint, key: &str, body: Value) {
        self.records.lock().unwrap().insert((endpoint, key.to_string()), body);
    }

    pub fn fail(&self, endpoint: Endpoint) {
        self.failing.lock().unwrap().insert(endpoint);
    }

    pub fn calls_to(&self, endpoint: Endpoint) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| *e == endpoint)
            .map(|(_, key)| key.clone())
            .collect()
    }
}

#[async_trait]
impl PortalApi for MockApi {
    async fn customers(&self, _email: &str) -> Result<Vec<CustomerAccount>> {
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn get_json(&self, endpoint: Endpoint, key: &str) -> Result<Value> {
        self.calls.lock().unwrap().push((endpoint, key.to_string()));
        if self.failing.lock().unwrap().contains(&endpoint) {
            return Err(anyhow!("{} returned 500", endpoint.path()));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&(endpoint, key.to_string()))
            .cloned()
            .unwrap_or_else(|| json!([])))
    }

    async fn signed_url(&self, blob: &BlobRef) -> Result<String> {
        Ok(format!("https://blob.test/{}?sig=x", blob.as_str()))
    }

    async fn blob_bytes(&self, _blob: &BlobRef) -> Result<BlobPayload> {
        self.blob_calls.fetch_add(1, Ordering::SeqCst);
        Ok(BlobPayload {
            content_type: Some("application/pdf".to_string()),
            bytes: Bytes::from_static(b"%PDF-1.4"),
        })
    }

    async fn update_remediation(&self, update: &RemediationUpdate) -> Result<()> {
        self.remediations.lock().unwrap().push(update.clone());
        Ok(())
    }

    async fn upload_photo(&self, upload: PhotoUpload) -> Result<String> {
        self.uploads.lock().unwrap().push(upload.blob_name.clone());
        Ok(format!("https://blob.test/{}", upload.blob_name))
    }

    async fn delete_blob(&self, blob: &BlobRef) -> Result<()> {
        self.deleted.lock().unwrap().push(blob.as_str().to_string());
        Ok(())
    }
}

/// Two known users: one verified, one still waiting for the mail.
#[derive(Default)]
pub struct MockIdentity {
    pub verification_mails: AtomicUsize,
    pub reset_mails: Mutex<Vec<String>>,
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity> {
        if password != PASSWORD || (email != VERIFIED && email != UNVERIFIED) {
            return Err(anyhow!("INVALID_LOGIN_CREDENTIALS"));
        }
        Ok(Identity {
            id_token: "token".to_string(),
            local_id: "uid-1".to_string(),
            email: email.to_string(),
            display_name: Some("Jana Nováková".to_string()),
            email_verified: email == VERIFIED,
        })
    }

    async fn sign_up(&self, email: &str, _password: &str, display_name: Option<&str>) -> Result<Identity> {
        Ok(Identity {
            id_token: "token".to_string(),
            local_id: "uid-2".to_string(),
            email: email.to_string(),
            display_name: display_name.map(str::to_string),
            email_verified: false,
        })
    }

    async fn send_email_verification(&self, _id_token: &str) -> Result<()> {
        self.verification_mails.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<()> {
        self.reset_mails.lock().unwrap().push(email.to_string());
        Ok(())
    }
}

/// Invoices for one legal id; `None` behaves like missing credentials.
pub struct MockInvoices(pub Option<Vec<Invoice>>);

#[async_trait]
impl InvoiceSource for MockInvoices {
    async fn recent(&self, _legal_id: &str) -> Result<Vec<Invoice>, InvoiceError> {
        self.0.clone().ok_or(InvoiceError::MissingCredentials)
    }
}

pub fn invoice(id: i64, date_paid: &str) -> Invoice {
    serde_json::from_value(json!({
        "id": id,
        "number": format!("2024{id:04}"),
        "date_created": "2024-04-02",
        "date_paid": date_paid,
        "total": "1210.00",
    }))
    .unwrap()
}

pub struct TestPortal {
    pub state: AppState,
    pub api: Arc<MockApi>,
    pub identity: Arc<MockIdentity>,
}

impl TestPortal {
    pub fn new(api: MockApi) -> Self {
        Self::with_invoices(api, MockInvoices(Some(Vec::new())))
    }

    pub fn with_invoices(api: MockApi, invoices: MockInvoices) -> Self {
        let api = Arc::new(api);
        let identity = Arc::new(MockIdentity::default());
        let state = AppState::new(PortalConfig::default(), api.clone(), identity.clone(), Arc::new(invoices));
        Self { state, api, identity }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        router(self.state.clone()).oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn delete(&self, uri: &str, cookie: &str) -> Response<Body> {
        let request = Request::builder()
            .method("DELETE")
            .uri(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// The live session behind a `Cookie` header value.
    pub async fn session(&self, cookie: &str) -> Arc<Session> {
        let id = cookie.trim_start_matches("portal_session=");
        self.state.sessions.get(id).await.expect("session is live")
    }

    pub async fn post_json(&self, uri: &str, body: Value, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    /// Sign in as the verified user and return the `Cookie` header value.
    pub async fn login(&self) -> String {
        let response = self
            .post_json("/auth/login", json!({ "email": VERIFIED, "password": PASSWORD }), None)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        session_cookie(&response).expect("login sets the session cookie")
    }
}

/// `name=value` part of the response's Set-Cookie header.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .next()
        .map(str::to_string)
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
