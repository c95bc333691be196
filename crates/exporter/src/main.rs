//! # Estação Exporter
//!
//! Escuta o broadcast UDP do hub da estação meteorológica, decodifica os
//! eventos posicionais e expõe as observações como métricas Prometheus em
//! `/metrics`, com remoção automática de séries que param de reportar.
//!
//! ## Uso
//! ```bash
//! station_exporter        # usa config.toml ao lado do binário
//! ```

mod metrics;
mod net_thread;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use metrics::StationMetrics;
use net_thread::spawn_listener_thread;
use station_core::config::AppConfig;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Config ──
    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path);

    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Config inválida: {e}");
        }
        std::process::exit(1);
    }

    // ── Métricas + watchdog ──
    let metrics = Arc::new(StationMetrics::new(config.watchdog.timeout()));
    metrics.spawn_sweeper(config.watchdog.sweep_interval());

    // ── Thread de rede ──
    let rx = spawn_listener_thread(
        config.listener.port,
        config.listener.bind_ip.clone(),
        config.decoder,
        metrics.listener.clone(),
    );

    // ── Loop de submissão ──
    {
        let metrics = metrics.clone();
        std::thread::Builder::new()
            .name("submit-loop".into())
            .spawn(move || {
                for msg in rx.iter() {
                    debug!(
                        "{} de {} ({} bytes)",
                        msg.event.event_type(),
                        msg.source_addr,
                        msg.raw_size
                    );
                    metrics.submit(&msg.event);
                }
            })
            .expect("falha ao criar loop de submissão");
    }

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   ⚡ ESTAÇÃO EXPORTER – ATIVO (Rust)");
    println!("══════════════════════════════════════════════");
    println!("  UDP:      0.0.0.0:{}", config.listener.port);
    println!(
        "  Métricas: http://{}:{}/metrics",
        config.exporter.bind_ip, config.exporter.port
    );
    println!("  Timeout:  {:.0}s por série", config.watchdog.timeout_secs);
    println!("══════════════════════════════════════════════");
    println!();

    // ── Exposição HTTP ──
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics);

    let addr = format!("{}:{}", config.exporter.bind_ip, config.exporter.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("falha ao bind da porta de métricas");
    info!("Exposição de métricas em http://{addr}/metrics");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("servidor de métricas falhou");
}

async fn metrics_handler(State(metrics): State<Arc<StationMetrics>>) -> impl IntoResponse {
    (
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics.encode(),
    )
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Encerrando por Ctrl+C");
    }
}
