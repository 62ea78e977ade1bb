// stub-backend/src/state.rs
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use common::{
    ClientRecord, DiscountOption, ProvisionRequest, ReportRequest, StubConfig, TokenClaims,
    TokenError, UpdateClientRequest, CLIENT_STATUS_INACTIVE,
};
use dashmap::DashMap;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredClient {
    record: ClientRecord,
    active: bool,
    // insertion order, so listings are stable
    seq: u64,
    /// Discount type and percentage of the last provisioning
    last_discount: Option<(i64, f64)>,
}

/// Backend state shared by all handlers
#[derive(Debug)]
pub struct StubState {
    clients: DashMap<String, StoredClient>,
    next_seq: AtomicU64,
    secret: Vec<u8>,
    token_ttl_secs: i64,
    admin_email: String,
    admin_password: String,
    double_encode_discounts: bool,
    discounts: Vec<DiscountOption>,
    // request counts per endpoint
    hits: DashMap<&'static str, u64>,
}

impl StubState {
    pub fn new(config: &StubConfig) -> Self {
        Self {
            clients: DashMap::new(),
            next_seq: AtomicU64::new(0),
            secret: config.jwt_secret.as_bytes().to_vec(),
            token_ttl_secs: config.token_ttl_secs,
            admin_email: config.admin_email.clone(),
            admin_password: config.admin_password.clone(),
            double_encode_discounts: config.double_encode_discounts,
            discounts: default_discounts(),
            hits: DashMap::new(),
        }
    }

    pub fn check_credentials(&self, email: &str, password: &str) -> bool {
        email.eq_ignore_ascii_case(&self.admin_email) && password == self.admin_password
    }

    pub fn issue(&self, email: &str) -> Result<String, TokenError> {
        let now = common::unix_now();
        common::issue_token(email, now, now + self.token_ttl_secs, &self.secret)
    }

    pub fn validate(&self, token: &str) -> Result<TokenClaims, TokenError> {
        common::validate_token(token, &self.secret)
    }

    pub fn hit(&self, endpoint: &'static str) {
        *self.hits.entry(endpoint).or_insert(0) += 1;
    }

    /// Requests received on `endpoint`, authorised or not
    pub fn hits(&self, endpoint: &str) -> u64 {
        self.hits.get(endpoint).map(|entry| *entry.value()).unwrap_or(0)
    }

    pub fn insert_client(&self, name: &str, mail: &str, balance: f64) -> String {
        let id = Uuid::new_v4().to_string();
        let password = Uuid::new_v4().simple().to_string();
        let record = ClientRecord {
            id: id.clone(),
            display_name: name.trim().to_string(),
            email: mail.trim().to_string(),
            balance,
            last_provisioned_at: None,
            password: Some(password.chars().take(12).collect()),
        };
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.clients.insert(
            id.clone(),
            StoredClient {
                record,
                active: true,
                seq,
                last_discount: None,
            },
        );
        id
    }

    /// Clients not soft-deleted, in insertion order
    pub fn active_clients(&self) -> Vec<ClientRecord> {
        let mut active: Vec<(u64, ClientRecord)> = self
            .clients
            .iter()
            .filter(|entry| entry.value().active)
            .map(|entry| (entry.value().seq, entry.value().record.clone()))
            .collect();
        active.sort_by_key(|(seq, _)| *seq);
        active.into_iter().map(|(_, record)| record).collect()
    }

    pub fn client(&self, id: &str) -> Option<ClientRecord> {
        self.clients.get(id).map(|entry| entry.value().record.clone())
    }

    pub fn is_active(&self, id: &str) -> Option<bool> {
        self.clients.get(id).map(|entry| entry.value().active)
    }

    pub fn last_discount(&self, id: &str) -> Option<(i64, f64)> {
        self.clients.get(id).and_then(|entry| entry.value().last_discount)
    }

    /// Apply an update or a soft-delete; false when the client is unknown or deactivated
    pub fn update_client(&self, body: &UpdateClientRequest) -> bool {
        let Some(mut entry) = self.clients.get_mut(&body.id) else {
            return false;
        };
        if !entry.value().active {
            return false;
        }
        let stored = entry.value_mut();

        if body.status == Some(CLIENT_STATUS_INACTIVE) {
            stored.active = false;
            tracing::info!("Deactivated client {}", body.id);
            return true;
        }
        if let Some(name) = &body.name {
            stored.record.display_name = name.trim().to_string();
        }
        if let Some(mail) = &body.mail {
            stored.record.email = mail.trim().to_string();
        }
        tracing::info!("Updated client {}", body.id);
        true
    }

    /// Credit the amount and stamp the provisioning date
    pub fn provision(&self, body: &ProvisionRequest) -> bool {
        let Some(mut entry) = self.clients.get_mut(&body.client_id) else {
            return false;
        };
        if !entry.value().active {
            return false;
        }
        let stored = entry.value_mut();
        stored.record.balance += body.amount;
        stored.record.last_provisioned_at = Some(Utc::now());
        stored.last_discount = Some((body.discount_type, body.discount));
        tracing::info!("Provisioned {} to client {}", body.amount, body.client_id);
        true
    }

    /// Discount options, double-encoded when configured to mimic the real backend
    pub fn discounts_payload(&self) -> serde_json::Value {
        let array = serde_json::json!(self.discounts);
        if self.double_encode_discounts {
            serde_json::Value::String(array.to_string())
        } else {
            array
        }
    }

    pub fn report(&self, body: &ReportRequest) -> Option<Vec<u8>> {
        let client = self.client(&body.client_id)?;
        Some(render_pdf(&format!(
            "Report for {} - {:02}/{}  Balance: {:.2}",
            client.display_name, body.month, body.year, client.balance
        )))
    }
}

fn default_discounts() -> Vec<DiscountOption> {
    vec![
        DiscountOption { id: 0, label: "Free".to_string(), percentage: 0.0 },
        DiscountOption { id: 1, label: "None".to_string(), percentage: 0.0 },
        DiscountOption { id: 2, label: "Partner".to_string(), percentage: 10.0 },
        DiscountOption { id: 3, label: "Wholesale".to_string(), percentage: 25.0 },
    ]
}

// Single-page PDF with one line of text
fn render_pdf(line: &str) -> Vec<u8> {
    let text = line.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)");
    let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>".to_string(),
        format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, object) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, object));
    }

    let xref = pdf.len();
    pdf.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in offsets {
        pdf.push_str(&format!("{:010} 00000 n \n", offset));
    }
    pdf.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref
    ));
    pdf.into_bytes()
}
