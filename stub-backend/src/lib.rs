// stub-backend/src/lib.rs
//! In-memory implementation of the billing backend's REST surface.

pub mod state;

use std::net::SocketAddr;

use actix_web::dev::Server;
use actix_web::http::header;
use actix_web::{get, post, route, web, App, HttpRequest, HttpResponse, HttpServer, Responder};
use common::{CreateClientRequest, ProvisionRequest, ReportRequest, TokenClaims, UpdateClientRequest};
use serde::Deserialize;
use serde_json::json;

pub use state::StubState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// Check the bearer token, answering 401 when it is missing or invalid
fn authorize(req: &HttpRequest, state: &StubState) -> Result<TokenClaims, HttpResponse> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let Some(token) = token else {
        tracing::debug!("Request to {} without bearer token", req.path());
        return Err(HttpResponse::Unauthorized().json(json!({ "error": "Missing token" })));
    };

    state.validate(token).map_err(|e| {
        tracing::debug!("Rejected token on {}: {}", req.path(), e);
        HttpResponse::Unauthorized().json(json!({ "error": "Invalid token" }))
    })
}

#[post("/Api/Login")]
pub async fn login(state: web::Data<StubState>, body: web::Json<LoginRequest>) -> impl Responder {
    state.hit("login");
    if !state.check_credentials(&body.email, &body.password) {
        tracing::info!("Rejected login for {}", body.email);
        return HttpResponse::Unauthorized().json(json!({ "error": "Invalid credentials" }));
    }

    match state.issue(&body.email) {
        Ok(token) => {
            tracing::info!("Issued token for {}", body.email);
            HttpResponse::Ok().content_type("text/plain").body(token)
        },
        Err(e) => {
            tracing::error!("Error issuing token: {}", e);
            HttpResponse::InternalServerError().json(json!({ "error": "Internal server error" }))
        }
    }
}

#[get("/api/GetCredits")]
pub async fn list_clients(req: HttpRequest, state: web::Data<StubState>) -> impl Responder {
    state.hit("list");
    if let Err(resp) = authorize(&req, &state) {
        return resp;
    }
    HttpResponse::Ok().json(state.active_clients())
}

#[post("/Api/CreateClient")]
pub async fn create_client(
    req: HttpRequest,
    state: web::Data<StubState>,
    body: web::Json<CreateClientRequest>,
) -> impl Responder {
    state.hit("create");
    if let Err(resp) = authorize(&req, &state) {
        return resp;
    }
    if body.name.trim().is_empty() || body.mail.trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({ "error": "Name and Mail are required" }));
    }

    let id = state.insert_client(&body.name, &body.mail, 0.0);
    tracing::info!("Created client {}", id);
    HttpResponse::Ok().json(json!({ "id": id }))
}

#[route("/api/Client", method = "PATCH", method = "PUT")]
pub async fn update_client(
    req: HttpRequest,
    state: web::Data<StubState>,
    body: web::Json<UpdateClientRequest>,
) -> impl Responder {
    state.hit("update");
    if let Err(resp) = authorize(&req, &state) {
        return resp;
    }

    if state.update_client(&body) {
        HttpResponse::Ok().finish()
    } else {
        HttpResponse::NotFound().json(json!({ "error": "Client not found" }))
    }
}

#[post("/api/AsignCredits")]
pub async fn provision(
    req: HttpRequest,
    state: web::Data<StubState>,
    body: web::Json<ProvisionRequest>,
) -> impl Responder {
    state.hit("provision");
    if let Err(resp) = authorize(&req, &state) {
        return resp;
    }
    if body.amount <= 0.0 || !(0.0..=100.0).contains(&body.discount) {
        return HttpResponse::BadRequest().json(json!({ "error": "Invalid amount or discount" }));
    }

    if state.provision(&body) {
        HttpResponse::Ok().finish()
    } else {
        HttpResponse::NotFound().json(json!({ "error": "Client not found" }))
    }
}

#[get("/api/GetDiscount")]
pub async fn discounts(req: HttpRequest, state: web::Data<StubState>) -> impl Responder {
    state.hit("discounts");
    if let Err(resp) = authorize(&req, &state) {
        return resp;
    }
    HttpResponse::Ok().json(state.discounts_payload())
}

#[post("/api/GetReport")]
pub async fn report(
    req: HttpRequest,
    state: web::Data<StubState>,
    body: web::Json<ReportRequest>,
) -> impl Responder {
    state.hit("report");
    if let Err(resp) = authorize(&req, &state) {
        return resp;
    }

    match state.report(&body) {
        Some(pdf) => HttpResponse::Ok().content_type("application/pdf").body(pdf),
        None => HttpResponse::NotFound().json(json!({ "error": "Client not found" })),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(login)
        .service(list_clients)
        .service(create_client)
        .service(update_client)
        .service(provision)
        .service(discounts)
        .service(report);
}

/// Bind the stub to `addr` and return the server future with the bound addresses
pub fn bind(state: web::Data<StubState>, addr: &str) -> std::io::Result<(Server, Vec<SocketAddr>)> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(configure)
    })
    .workers(1)
    .bind(addr)?;

    let addrs = server.addrs();
    Ok((server.run(), addrs))
}
