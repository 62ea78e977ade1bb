// stub-backend/src/main.rs
// Stub Backend - serves the billing REST surface from memory
use actix_web::web;
use common::{setup_tracing, Config};
use stub_backend::StubState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = Config::from_env();
    if let Err(e) = setup_tracing(&config.log_level) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let state = StubState::new(&config.stub);
    state.insert_client("Acme Corporation", "billing@acme.test", 250.0);
    state.insert_client("Globex", "accounts@globex.test", 0.0);
    state.insert_client("Initech", "finance@initech.test", 1200.0);

    tracing::info!("Starting stub backend on {}", config.stub.addr);
    tracing::info!("Operator login: {}", config.stub.admin_email);

    let (server, _) = stub_backend::bind(web::Data::new(state), &config.stub.addr)?;
    server.await
}
