// console/src/test_support.rs
//! In-memory collaborators shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::{
    ClientRecord, CreateClientRequest, Notification, ProvisionRequest, ReportRequest,
    UpdateClientRequest,
};
use tokio::sync::broadcast;

use crate::backend::{AuthBackend, BackendError, ClientBackend};
use crate::clock::ManualClock;
use crate::notifier::Notifier;
use crate::session::SessionManager;
use crate::storage::MemoryStorage;

// 2025-06-15T15:06:40Z
pub const START: i64 = 1_750_000_000;

pub struct StubAuth {
    response: Mutex<Result<String, BackendError>>,
    calls: AtomicUsize,
}

impl StubAuth {
    pub fn issuing(exp: i64) -> Arc<Self> {
        Self::answering(Ok(token_expiring(exp)))
    }

    pub fn answering(response: Result<String, BackendError>) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(response),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn reissue(&self, exp: i64) {
        *self.response.lock().unwrap() = Ok(token_expiring(exp));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthBackend for StubAuth {
    async fn login(&self, _email: &str, _password: &str) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.lock().unwrap().clone()
    }
}

pub fn token_expiring(exp: i64) -> String {
    common::issue_token("mail@mail.com", START, exp, b"secret").unwrap()
}

/// Backend keeping clients in a vector and counting calls per endpoint
pub struct MockBackend {
    pub clients: Mutex<Vec<ClientRecord>>,
    pub discounts: Mutex<serde_json::Value>,
    pub report: Vec<u8>,
    calls: Mutex<HashMap<&'static str, usize>>,
    fail_writes: AtomicBool,
    fail_list: AtomicBool,
    next_id: AtomicUsize,
}

impl MockBackend {
    pub fn with_clients(clients: Vec<ClientRecord>) -> Arc<Self> {
        Arc::new(Self {
            clients: Mutex::new(clients),
            discounts: Mutex::new(serde_json::json!([])),
            report: b"%PDF-1.4 mock".to_vec(),
            calls: Mutex::new(HashMap::new()),
            fail_writes: AtomicBool::new(false),
            fail_list: AtomicBool::new(false),
            next_id: AtomicUsize::new(100),
        })
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Writes still succeed; only listing answers 502
    pub fn fail_list(&self) {
        self.fail_list.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.calls.lock().unwrap().get(endpoint).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn client(&self, id: &str) -> Option<ClientRecord> {
        self.clients.lock().unwrap().iter().find(|c| c.id == id).cloned()
    }

    fn record(&self, endpoint: &'static str) {
        *self.calls.lock().unwrap().entry(endpoint).or_insert(0) += 1;
    }

    fn write(&self, endpoint: &'static str) -> Result<(), BackendError> {
        self.record(endpoint);
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(BackendError::Status(500))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ClientBackend for MockBackend {
    async fn list_clients(&self, _token: &str) -> Result<Vec<ClientRecord>, BackendError> {
        self.record("list");
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(BackendError::Status(502));
        }
        Ok(self.clients.lock().unwrap().clone())
    }

    async fn create_client(&self, _token: &str, body: &CreateClientRequest) -> Result<(), BackendError> {
        self.write("create")?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.clients.lock().unwrap().push(client(&id.to_string(), &body.name, &body.mail, 0.0));
        Ok(())
    }

    async fn update_client(&self, _token: &str, body: &UpdateClientRequest) -> Result<(), BackendError> {
        self.write("update")?;
        let mut clients = self.clients.lock().unwrap();
        if body.status == Some(common::CLIENT_STATUS_INACTIVE) {
            clients.retain(|c| c.id != body.id);
        } else if let Some(c) = clients.iter_mut().find(|c| c.id == body.id) {
            if let Some(name) = &body.name {
                c.display_name = name.clone();
            }
            if let Some(mail) = &body.mail {
                c.email = mail.clone();
            }
        }
        Ok(())
    }

    async fn provision(&self, _token: &str, body: &ProvisionRequest) -> Result<(), BackendError> {
        self.write("provision")?;
        let mut clients = self.clients.lock().unwrap();
        if let Some(c) = clients.iter_mut().find(|c| c.id == body.client_id) {
            c.balance += body.amount;
            c.last_provisioned_at = Some(chrono::Utc::now());
        }
        Ok(())
    }

    async fn discount_options(&self, _token: &str) -> Result<serde_json::Value, BackendError> {
        self.record("discounts");
        Ok(self.discounts.lock().unwrap().clone())
    }

    async fn report(&self, _token: &str, _body: &ReportRequest) -> Result<Vec<u8>, BackendError> {
        self.write("report")?;
        Ok(self.report.clone())
    }
}

pub fn client(id: &str, name: &str, email: &str, balance: f64) -> ClientRecord {
    ClientRecord {
        id: id.to_string(),
        display_name: name.to_string(),
        email: email.to_string(),
        balance,
        last_provisioned_at: None,
        password: None,
    }
}

/// Session wired to memory storage and a manual clock at `START`
pub struct TestSession {
    pub session: SessionManager,
    pub storage: Arc<MemoryStorage>,
    pub clock: Arc<ManualClock>,
    pub auth: Arc<StubAuth>,
    pub notifications: broadcast::Receiver<Notification>,
}

impl TestSession {
    pub fn new(auth: Arc<StubAuth>) -> Self {
        Self::with_storage(auth, Arc::new(MemoryStorage::new()))
    }

    pub fn with_storage(auth: Arc<StubAuth>, storage: Arc<MemoryStorage>) -> Self {
        let clock = Arc::new(ManualClock::new(START));
        let notifier = Notifier::new(1000);
        let notifications = notifier.subscribe();
        let session = SessionManager::new(storage.clone(), clock.clone(), auth.clone(), notifier);
        Self {
            session,
            storage,
            clock,
            auth,
            notifications,
        }
    }

    /// Messages shown since the last drain
    pub fn drain(&mut self) -> Vec<String> {
        let mut messages = Vec::new();
        while let Ok(n) = self.notifications.try_recv() {
            messages.push(n.message);
        }
        messages
    }
}
