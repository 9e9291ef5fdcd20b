use std::env::{args, var};
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum_server::tls_rustls::RustlsConfig;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::config::{AuthConfig, Config};
use crate::correction::CorrectionHandler;
use crate::gemini::HttpGeminiClient;

mod config;
mod correction;
mod endpoints;
mod gemini;
mod model;
mod security;
mod validation;

const OK_JSON: &str = r#"{ "message": "OK" }"#;

/// Transport cap on request bodies. Uploads over the 1 MiB validation cap but under this
/// are streamed and counted rather than buffered
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub checker: Arc<CorrectionHandler>,
    pub auth: Arc<AuthConfig>,
}

impl AppState {
    pub fn new(checker: CorrectionHandler, auth: AuthConfig) -> Self {
        Self {
            checker: Arc::new(checker),
            auth: Arc::new(auth),
        }
    }

    #[cfg(test)]
    pub fn scripted(client: gemini::testing::ScriptedClient, auth: AuthConfig) -> Self {
        let checker = CorrectionHandler::new(
            Arc::new(client),
            vec![
                "models/gemini-2.5-flash".to_owned(),
                "models/gemini-2.5-pro".to_owned(),
            ],
            gemini::wire::GenerationConfig {
                temperature: 0.3,
                max_output_tokens: 2000,
            },
        );
        Self::new(checker, auth)
    }
}

pub fn app(state: AppState) -> Router {
    // Requests may come from any origin, carrying the session in the Authorization header
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_origin(AllowOrigin::any())
        .expose_headers([CONTENT_TYPE]);

    // Each layer acts as a layer of an onion, with the ones added first
    // acting as the centre of the onion, and the ones added last acting
    // as the outer layers

    // The session layer
    // Only users holding a configured, unexpired session get through
    let app = Router::new()
        .route(
            "/api/grammar",
            get(endpoints::grammar_form).post(endpoints::grammar_helper),
        )
        .layer(from_fn_with_state(state.clone(), security::handle_session_auth));

    // The CORS and Max Body Limit layers
    // These endpoints are public
    app.route("/api/health", get(endpoints::health))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

#[tokio::main]
async fn main() {
    // Begin logging
    let level = var("LOG_LEVEL")
        .ok()
        .and_then(|l| l.parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Could not install logger: {e}");
        return;
    }

    // `grammar-helper issue-session` prints a new token and the hash to configure for it
    if args().nth(1).as_deref() == Some("issue-session") {
        match serde_json::to_string_pretty(&security::issue_session()) {
            Ok(session) => println!("{session}"),
            Err(e) => error!("{e}"),
        }
        return;
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return;
        }
    };

    let addr = match config.server.addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("{e}");
            return;
        }
    };

    let api_key = match config.gemini.api_key() {
        Ok(key) => key,
        Err(e) => {
            error!("{e}");
            return;
        }
    };

    let client = match HttpGeminiClient::new(
        &api_key,
        config.gemini.base_url.as_str(),
        config.gemini.request_timeout(),
    ) {
        Ok(client) => client,
        Err(e) => {
            error!("{e}");
            return;
        }
    };

    info!(
        "Grammar checks will try {} model(s), starting with {}",
        config.gemini.models.len(),
        config.gemini.models[0]
    );

    if config.auth.sessions.is_empty() {
        warn!("No sessions configured, every grammar request will be redirected to login");
    }

    let checker = CorrectionHandler::new(
        Arc::new(client),
        config.gemini.models.clone(),
        config.gemini.generation_config(),
    );
    let app = app(AppState::new(checker, config.auth));

    // Serve over HTTPS when a certificate is configured
    let served = match config.server.tls() {
        Some((cert, key)) => {
            if rustls::crypto::aws_lc_rs::default_provider()
                .install_default()
                .is_err()
            {
                warn!("A TLS crypto provider was already installed");
            }

            let tls = match RustlsConfig::from_pem_file(cert, key).await {
                Ok(tls) => tls,
                Err(e) => {
                    error!("Could not load TLS certificate: {e}");
                    return;
                }
            };

            info!("Listening on https://{addr}");
            axum_server::bind_rustls(addr, tls)
                .serve(app.into_make_service())
                .await
        }
        None => {
            info!("Listening on http://{addr}");
            axum_server::bind(addr).serve(app.into_make_service()).await
        }
    };

    if let Err(e) = served {
        error!("Server stopped: {e}");
    }
}
