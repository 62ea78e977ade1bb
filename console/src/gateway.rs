// console/src/gateway.rs
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::Datelike;
use common::{
    ClientRecord, CreateClientRequest, DiscountOption, InvalidationReason, ProvisionRequest,
    ReportPeriod, ReportRequest, UpdateClientRequest, FIRST_REPORT_YEAR,
};

use crate::backend::{BackendError, ClientBackend};
use crate::errors::GatewayError;
use crate::notifier::Notifier;
use crate::session::{SessionManager, SessionObserver};
use crate::validation::{validate_period, ClientForm, ProvisionForm};

const FETCH_FAILED: &str = "Error fetching clients";
const CREATE_FAILED: &str = "Error adding the client";
const UPDATE_FAILED: &str = "Error updating the client";
const DELETE_FAILED: &str = "Error deleting the client";
const PROVISION_FAILED: &str = "Error provisioning the client";
const DISCOUNTS_FAILED: &str = "Error loading discount options";
const REPORT_FAILED: &str = "Error generating the report";

/// Client list and reference data fetched under the current session
#[derive(Debug, Default)]
pub struct ClientCache {
    clients: RwLock<Vec<ClientRecord>>,
    discounts: RwLock<Option<Vec<DiscountOption>>>,
    loading: AtomicBool,
}

impl ClientCache {
    fn replace_clients(&self, clients: Vec<ClientRecord>) {
        *self.clients.write().unwrap_or_else(|e| e.into_inner()) = clients;
    }

    fn clients(&self) -> Vec<ClientRecord> {
        self.clients.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn discounts(&self) -> Option<Vec<DiscountOption>> {
        self.discounts.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_discounts(&self, discounts: Vec<DiscountOption>) {
        *self.discounts.write().unwrap_or_else(|e| e.into_inner()) = Some(discounts);
    }

    fn reset(&self) {
        self.replace_clients(Vec::new());
        *self.discounts.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl SessionObserver for ClientCache {
    fn on_session_invalidated(&self, reason: InvalidationReason) {
        tracing::debug!("Dropping cached clients ({:?})", reason);
        self.reset();
    }
}

// Holds the loading flag up for as long as it lives
struct LoadingGuard<'a>(&'a AtomicBool);

impl<'a> LoadingGuard<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Gated access to the remote client collection.
///
/// Every operation checks the session before calling the backend. Writes
/// are followed by exactly one full re-fetch, so the cached list is always
/// what the backend last returned.
#[derive(Clone)]
pub struct ClientGateway {
    session: SessionManager,
    backend: Arc<dyn ClientBackend>,
    notifier: Notifier,
    cache: Arc<ClientCache>,
    reports_dir: PathBuf,
}

impl ClientGateway {
    pub fn new(
        session: SessionManager,
        backend: Arc<dyn ClientBackend>,
        reports_dir: impl Into<PathBuf>,
    ) -> Self {
        let cache = Arc::new(ClientCache::default());
        session.observe(&cache);

        Self {
            notifier: session.notifier().clone(),
            session,
            backend,
            cache,
            reports_dir: reports_dir.into(),
        }
    }

    /// Current cached list
    pub fn clients(&self) -> Vec<ClientRecord> {
        self.cache.clients()
    }

    pub fn find(&self, id: &str) -> Option<ClientRecord> {
        self.cache.clients().into_iter().find(|c| c.id == id)
    }

    pub fn is_loading(&self) -> bool {
        self.cache.loading.load(Ordering::SeqCst)
    }

    /// Discount options cached for this session, if already loaded
    pub fn cached_discounts(&self) -> Option<Vec<DiscountOption>> {
        self.cache.discounts()
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    /// Replace the cached list with the backend's collection
    pub async fn fetch_all(&self) -> Result<(), GatewayError> {
        let token = self.gate()?;
        self.reload(&token)
            .await
            .map_err(|e| self.remote_failed("fetch clients", FETCH_FAILED, e))
    }

    pub async fn create(&self, form: &ClientForm) -> Result<(), GatewayError> {
        form.validate().map_err(GatewayError::Validation)?;
        let token = self.gate()?;

        let body = CreateClientRequest {
            name: form.name.trim().to_string(),
            mail: form.email.trim().to_string(),
        };
        self.backend
            .create_client(&token, &body)
            .await
            .map_err(|e| self.remote_failed("create client", CREATE_FAILED, e))?;

        self.refresh_after_write(&token, format!("Client {} added", body.name)).await;
        Ok(())
    }

    /// Send the record's name and email keyed by its id
    pub async fn update(&self, record: &ClientRecord) -> Result<(), GatewayError> {
        let form = ClientForm::new(record.display_name.as_str(), record.email.as_str());
        form.validate().map_err(GatewayError::Validation)?;
        let token = self.gate()?;

        let body = UpdateClientRequest::details(&record.id, form.name.trim(), form.email.trim());
        self.backend
            .update_client(&token, &body)
            .await
            .map_err(|e| self.remote_failed("update client", UPDATE_FAILED, e))?;

        self.refresh_after_write(&token, format!("Client {} updated", form.name.trim())).await;
        Ok(())
    }

    /// Mark the client inactive; the backend stops listing it
    pub async fn soft_delete(&self, record: &ClientRecord) -> Result<(), GatewayError> {
        let token = self.gate()?;

        let body = UpdateClientRequest::deactivate(&record.id);
        self.backend
            .update_client(&token, &body)
            .await
            .map_err(|e| self.remote_failed("delete client", DELETE_FAILED, e))?;

        self.refresh_after_write(&token, format!("Client {} deleted", record.display_name)).await;
        Ok(())
    }

    pub async fn provision(&self, record: &ClientRecord, form: &ProvisionForm) -> Result<(), GatewayError> {
        form.validate().map_err(GatewayError::Validation)?;
        let token = self.gate()?;

        let body = ProvisionRequest {
            client_id: record.id.clone(),
            amount: form.amount,
            discount_type: form.discount.id,
            discount: form.applied_percentage(),
        };
        self.backend
            .provision(&token, &body)
            .await
            .map_err(|e| self.remote_failed("provision client", PROVISION_FAILED, e))?;

        let message = format!("Provisioned {} to {}", form.amount, record.display_name);
        self.refresh_after_write(&token, message).await;
        Ok(())
    }

    /// Discount options, fetched at most once per session
    pub async fn fetch_discount_options(&self) -> Result<Vec<DiscountOption>, GatewayError> {
        let token = self.gate()?;

        if let Some(discounts) = self.cache.discounts() {
            return Ok(discounts);
        }

        let value = self
            .backend
            .discount_options(&token)
            .await
            .map_err(|e| self.remote_failed("load discounts", DISCOUNTS_FAILED, e))?;
        let discounts = decode_discounts(value).map_err(|e| {
            self.remote_failed(
                "load discounts",
                DISCOUNTS_FAILED,
                BackendError::Decode(e.to_string()),
            )
        })?;

        if self.session.status().is_active() {
            self.cache.set_discounts(discounts.clone());
        }
        Ok(discounts)
    }

    /// Request the period's report for a client and save it under the
    /// reports directory. Returns the written path.
    pub async fn generate_report(
        &self,
        period: ReportPeriod,
        record: &ClientRecord,
    ) -> Result<PathBuf, GatewayError> {
        validate_period(&period, self.current_year()).map_err(GatewayError::Validation)?;
        let token = self.gate()?;

        let body = ReportRequest {
            client_id: record.id.clone(),
            month: period.month,
            year: period.year,
        };
        let bytes = self
            .backend
            .report(&token, &body)
            .await
            .map_err(|e| self.remote_failed("generate report", REPORT_FAILED, e))?;

        let path = self.reports_dir.join(report_file_name(record, &period));
        if let Err(e) = save_report(&path, &bytes).await {
            tracing::error!("Could not write report {}: {}", path.display(), e);
            self.notifier.error(REPORT_FAILED);
            return Err(e.into());
        }

        tracing::info!("Saved {} byte report to {}", bytes.len(), path.display());
        self.notifier.success(format!("Report saved to {}", path.display()));
        Ok(path)
    }

    fn current_year(&self) -> i32 {
        chrono::DateTime::<chrono::Utc>::from_timestamp(self.session.now(), 0)
            .map(|now| now.year())
            .unwrap_or(FIRST_REPORT_YEAR)
    }

    fn gate(&self) -> Result<String, GatewayError> {
        self.session.authorize().ok_or(GatewayError::SessionExpired)
    }

    async fn reload(&self, token: &str) -> Result<(), BackendError> {
        let _loading = LoadingGuard::start(&self.cache.loading);
        let clients = self.backend.list_clients(token).await?;

        // a response landing after the session ended must not refill the cache
        if !self.session.status().is_active() {
            tracing::debug!("Discarding client list fetched for an ended session");
            return Ok(());
        }

        tracing::debug!("Fetched {} clients", clients.len());
        self.cache.replace_clients(clients);
        Ok(())
    }

    // The write is committed by now; a failed refetch is reported on its own
    async fn refresh_after_write(&self, token: &str, success: String) {
        let refreshed = self.reload(token).await;
        self.notifier.success(success);
        if let Err(e) = refreshed {
            tracing::warn!("Failed to fetch clients after write: {}", e);
            self.notifier.error(FETCH_FAILED);
        }
    }

    fn remote_failed(&self, operation: &'static str, message: &str, source: BackendError) -> GatewayError {
        tracing::warn!("Failed to {}: {}", operation, source);
        self.notifier.error(message);
        GatewayError::Remote { operation, source }
    }
}

/// Accept a JSON array of options or a JSON string holding that array
pub fn decode_discounts(value: serde_json::Value) -> Result<Vec<DiscountOption>, serde_json::Error> {
    match value {
        serde_json::Value::String(encoded) => {
            let inner: serde_json::Value = serde_json::from_str(&encoded)?;
            match inner {
                serde_json::Value::String(twice) => serde_json::from_str(&twice),
                other => serde_json::from_value(other),
            }
        },
        other => serde_json::from_value(other),
    }
}

fn report_file_name(record: &ClientRecord, period: &ReportPeriod) -> String {
    let slug: String = record
        .display_name
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug.trim_matches('-');
    let slug = if slug.is_empty() { record.id.as_str() } else { slug };

    format!("report-{}-{}-{:02}.pdf", slug, period.year, period.month)
}

async fn save_report(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SESSION_EXPIRED_MESSAGE;
    use crate::test_support::{client, MockBackend, StubAuth, TestSession, START};
    use serde_json::json;

    struct Fixture {
        h: TestSession,
        backend: Arc<MockBackend>,
        gateway: ClientGateway,
        _reports: tempfile::TempDir,
    }

    async fn logged_in() -> Fixture {
        let mut fixture = logged_out();
        fixture
            .h
            .session
            .login("mail@mail.com", "ValidPass1&")
            .await
            .unwrap();
        fixture.h.drain();
        fixture
    }

    fn logged_out() -> Fixture {
        let h = TestSession::new(StubAuth::issuing(START + 3600));
        h.session.restore().unwrap();
        let backend = MockBackend::with_clients(vec![
            client("1", "Acme", "billing@acme.test", 10.0),
            client("2", "Globex", "ap@globex.test", 0.0),
        ]);
        let reports = tempfile::tempdir().unwrap();
        let gateway = ClientGateway::new(h.session.clone(), backend.clone(), reports.path());
        Fixture {
            h,
            backend,
            gateway,
            _reports: reports,
        }
    }

    fn discount(id: i64, percentage: f64) -> DiscountOption {
        DiscountOption {
            id,
            label: "Standard".to_string(),
            percentage,
        }
    }

    #[tokio::test]
    async fn test_fetch_all_replaces_cache() {
        let mut f = logged_in().await;
        f.gateway.fetch_all().await.unwrap();

        assert_eq!(f.gateway.clients().len(), 2);
        assert_eq!(f.backend.calls("list"), 1);
        assert!(!f.gateway.is_loading());
        assert!(f.h.drain().is_empty());
    }

    #[tokio::test]
    async fn test_gated_operations_make_no_calls_when_logged_out() {
        let mut f = logged_out();
        let record = client("1", "Acme", "billing@acme.test", 10.0);

        let results = vec![
            f.gateway.fetch_all().await,
            f.gateway.create(&ClientForm::new("New", "new@client.test")).await,
            f.gateway.update(&record).await,
            f.gateway.soft_delete(&record).await,
            f.gateway
                .provision(&record, &ProvisionForm::new(100.0, discount(1, 10.0)))
                .await,
            f.gateway.fetch_discount_options().await.map(|_| ()),
            f.gateway
                .generate_report(ReportPeriod { month: 1, year: 2024 }, &record)
                .await
                .map(|_| ()),
        ];

        for result in results {
            assert!(matches!(result, Err(GatewayError::SessionExpired)));
            assert_eq!(f.h.drain(), vec![SESSION_EXPIRED_MESSAGE.to_string()]);
        }
        assert_eq!(f.backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_expired_session_is_gated_and_ended() {
        let mut f = logged_in().await;
        f.gateway.fetch_all().await.unwrap();

        f.h.clock.advance(3600);
        let result = f.gateway.create(&ClientForm::new("New", "new@client.test")).await;

        assert!(matches!(result, Err(GatewayError::SessionExpired)));
        assert_eq!(f.h.drain(), vec![SESSION_EXPIRED_MESSAGE.to_string()]);
        assert_eq!(f.backend.calls("create"), 0);
        // cached data from the ended session is gone
        assert!(f.gateway.clients().is_empty());
        assert!(f.h.storage.is_empty());
    }

    #[tokio::test]
    async fn test_each_write_refetches_once() {
        let f = logged_in().await;
        let acme = client("1", "Acme", "billing@acme.test", 10.0);

        f.gateway.create(&ClientForm::new("Initech", "pay@initech.test")).await.unwrap();
        assert_eq!(f.backend.calls("list"), 1);

        let mut renamed = acme.clone();
        renamed.display_name = "Acme Corp".to_string();
        f.gateway.update(&renamed).await.unwrap();
        assert_eq!(f.backend.calls("list"), 2);

        f.gateway
            .provision(&acme, &ProvisionForm::new(5.0, discount(1, 0.0)))
            .await
            .unwrap();
        assert_eq!(f.backend.calls("list"), 3);

        f.gateway.soft_delete(&acme).await.unwrap();
        assert_eq!(f.backend.calls("list"), 4);

        let names: Vec<String> = f.gateway.clients().into_iter().map(|c| c.display_name).collect();
        assert_eq!(names, vec!["Globex".to_string(), "Initech".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_write_skips_refetch() {
        let mut f = logged_in().await;
        f.backend.fail_writes();

        let result = f.gateway.create(&ClientForm::new("Initech", "pay@initech.test")).await;
        assert!(matches!(
            result,
            Err(GatewayError::Remote { source: BackendError::Status(500), .. })
        ));
        assert_eq!(f.backend.calls("list"), 0);
        assert_eq!(f.h.drain(), vec![CREATE_FAILED.to_string()]);
    }

    #[tokio::test]
    async fn test_committed_write_succeeds_when_refetch_fails() {
        let mut f = logged_in().await;
        f.backend.fail_list();

        f.gateway
            .create(&ClientForm::new("Initech", "pay@initech.test"))
            .await
            .unwrap();
        assert_eq!(f.backend.calls("create"), 1);
        assert_eq!(f.backend.calls("list"), 1);
        assert_eq!(
            f.h.drain(),
            vec!["Client Initech added".to_string(), FETCH_FAILED.to_string()]
        );
        assert!(!f.gateway.is_loading());

        let acme = client("1", "Acme", "billing@acme.test", 10.0);
        f.gateway
            .provision(&acme, &ProvisionForm::new(25.0, discount(1, 0.0)))
            .await
            .unwrap();
        assert_eq!(f.backend.calls("provision"), 1);
        assert_eq!(f.backend.client("1").unwrap().balance, 35.0);

        // a plain fetch still reports the failure
        let result = f.gateway.fetch_all().await;
        assert!(matches!(
            result,
            Err(GatewayError::Remote { operation: "fetch clients", source: BackendError::Status(502) })
        ));
    }

    #[tokio::test]
    async fn test_invalid_form_never_reaches_backend() {
        let mut f = logged_in().await;

        let result = f.gateway.create(&ClientForm::new("", "not-an-email")).await;
        match result {
            Err(GatewayError::Validation(fields)) => {
                assert!(fields.get("name").is_some());
                assert!(fields.get("email").is_some());
            },
            other => panic!("unexpected result: {other:?}"),
        }

        let record = client("1", "Acme", "billing@acme.test", 10.0);
        let result = f
            .gateway
            .provision(&record, &ProvisionForm::new(0.0, discount(1, 10.0)))
            .await;
        assert!(matches!(result, Err(GatewayError::Validation(_))));

        assert_eq!(f.backend.total_calls(), 0);
        assert!(f.h.drain().is_empty());
    }

    #[tokio::test]
    async fn test_provision_balance_comes_from_backend() {
        let mut f = logged_in().await;
        f.gateway.fetch_all().await.unwrap();
        let acme = f.gateway.find("1").unwrap();
        assert!(acme.last_provisioned_at.is_none());

        f.gateway
            .provision(&acme, &ProvisionForm::new(100.0, discount(0, 0.0)).with_percentage(15.0))
            .await
            .unwrap();

        let refreshed = f.gateway.find("1").unwrap();
        assert_eq!(refreshed.balance, 110.0);
        assert!(refreshed.last_provisioned_at.is_some());
        assert_eq!(f.backend.client("1").unwrap().balance, 110.0);
        assert_eq!(f.h.drain(), vec!["Provisioned 100 to Acme".to_string()]);
    }

    #[test]
    fn test_decode_discounts_both_encodings() {
        let plain = json!([
            { "idType": 0, "type": "Free", "percentage": 0 },
            { "idType": 1, "type": "Partner", "percentage": 10 }
        ]);
        let encoded = json!(plain.to_string());

        let from_plain = decode_discounts(plain).unwrap();
        let from_encoded = decode_discounts(encoded).unwrap();
        assert_eq!(from_plain, from_encoded);
        assert_eq!(from_plain[1].menu_label(), "Partner | 10%");
        assert!(from_plain[0].is_free());

        assert!(decode_discounts(json!("not json")).is_err());
    }

    #[tokio::test]
    async fn test_discounts_loaded_once_per_session() {
        let f = logged_in().await;
        *f.backend.discounts.lock().unwrap() =
            json!(json!([{ "idType": 1, "type": "Partner", "percentage": 10 }]).to_string());

        let first = f.gateway.fetch_discount_options().await.unwrap();
        let second = f.gateway.fetch_discount_options().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(f.backend.calls("discounts"), 1);

        f.h.session.logout().unwrap();
        assert!(f.gateway.cached_discounts().is_none());
    }

    #[tokio::test]
    async fn test_report_written_to_reports_dir() {
        let mut f = logged_in().await;
        let record = client("1", "Acme Corp.", "billing@acme.test", 10.0);

        let path = f
            .gateway
            .generate_report(ReportPeriod { month: 3, year: 2024 }, &record)
            .await
            .unwrap();

        assert_eq!(path.file_name().unwrap(), "report-acme-corp-2024-03.pdf");
        assert_eq!(std::fs::read(&path).unwrap(), f.backend.report);
        assert_eq!(f.backend.calls("list"), 0);
        assert_eq!(f.h.drain().len(), 1);
    }

    #[tokio::test]
    async fn test_report_period_is_validated() {
        let f = logged_in().await;
        let record = client("1", "Acme", "billing@acme.test", 10.0);
        let result = f
            .gateway
            .generate_report(ReportPeriod { month: 0, year: 2024 }, &record)
            .await;
        assert!(matches!(result, Err(GatewayError::Validation(_))));
        assert_eq!(f.backend.calls("report"), 0);
    }

    #[tokio::test]
    async fn test_report_year_follows_session_clock() {
        let f = logged_in().await;
        let record = client("1", "Acme", "billing@acme.test", 10.0);

        // the session clock sits in 2025
        let result = f
            .gateway
            .generate_report(ReportPeriod { month: 1, year: 2026 }, &record)
            .await;
        match result {
            Err(GatewayError::Validation(fields)) => assert!(fields.get("year").is_some()),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(f.backend.calls("report"), 0);

        f.gateway
            .generate_report(ReportPeriod { month: 12, year: 2025 }, &record)
            .await
            .unwrap();
        assert_eq!(f.backend.calls("report"), 1);
    }

    #[tokio::test]
    async fn test_logout_clears_cached_clients() {
        let f = logged_in().await;
        f.gateway.fetch_all().await.unwrap();
        assert!(!f.gateway.clients().is_empty());

        f.h.session.logout().unwrap();
        assert!(f.gateway.clients().is_empty());
    }
}
