//! Gateway entry point.
//!
//! Wires the gateway with a loopback engine that acknowledges every
//! request locally, for dry-run operation without an exchange session.
//! Production deployments replace the loopback with the real
//! exchange-facing engine at this seam.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;

use omx_core::{
    clock, ExecutionReport, OrderAccepted, OrderCancelled, OrderRequest, Qty,
};
use omx_executor::{ExchangeEngine, ExecutorResult};
use omx_gateway::{
    logging, EngineAction, EngineControl, GatewayConfig, OrderGateway, PersistenceClient,
};

/// omx venue gateway (dry-run wiring).
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via OMX_CONFIG).
    #[arg(short, long)]
    config: Option<String>,
}

/// Engine stand-in that acknowledges every request locally.
struct LoopbackEngine {
    report_tx: mpsc::UnboundedSender<ExecutionReport>,
    next_exchange_id: AtomicU64,
}

impl ExchangeEngine for LoopbackEngine {
    fn send_order_request(&self, request: &OrderRequest) -> ExecutorResult<()> {
        let now_ms = clock::unix_millis();
        let report = match request {
            OrderRequest::New(new_request) => ExecutionReport::Accepted(OrderAccepted {
                order_sid: new_request.order_sid,
                instrument_sid: new_request.instrument_sid,
                side: new_request.side,
                price: new_request.limit_price,
                leaves_qty: new_request.quantity,
                cumulative_qty: Qty::ZERO,
                exchange_order_id: self.next_exchange_id.fetch_add(1, Ordering::AcqRel),
                transact_ms: now_ms,
            }),
            OrderRequest::Cancel(cancel_request) => ExecutionReport::Cancelled(OrderCancelled {
                order_sid: cancel_request.order_sid,
                orig_order_sid: cancel_request.target_order_sid,
                instrument_sid: cancel_request.instrument_sid,
                side: cancel_request.side,
                price: omx_core::Price::new(0),
                leaves_qty: Qty::ZERO,
                cumulative_qty: Qty::ZERO,
                transact_ms: now_ms,
            }),
        };
        let _ = self.report_tx.send(report);
        Ok(())
    }
}

struct LoopbackControl {
    recovering: AtomicBool,
}

impl EngineControl for LoopbackControl {
    fn start_recovery(&self) {
        self.recovering.store(true, Ordering::Release);
        info!("Loopback engine recovery: nothing to replay");
    }

    fn reset(&self) {
        self.recovering.store(false, Ordering::Release);
    }

    fn stop(&self) {
        info!("Loopback engine stopped");
    }

    fn is_clear(&self) -> bool {
        !self.recovering.load(Ordering::Acquire)
    }

    fn apply_action(&self, action: &EngineAction) -> bool {
        info!(?action, "Loopback engine action");
        true
    }
}

/// Persistence stand-in with no prior state.
struct EmptyPersistence;

impl PersistenceClient for EmptyPersistence {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ExecutionReport> {
        let (tx, rx) = mpsc::unbounded_channel();
        std::mem::forget(tx);
        rx
    }

    fn latest_state(
        &self,
    ) -> omx_gateway::recovery::BoxFuture<'_, omx_gateway::GatewayResult<Vec<ExecutionReport>>>
    {
        Box::pin(async { Ok(Vec::new()) })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logging();
    info!("Starting omx gateway v{}", env!("CARGO_PKG_VERSION"));

    let config_path = args
        .config
        .or_else(|| std::env::var("OMX_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        info!(config_path = %config_path, "Loading configuration");
        GatewayConfig::from_file(&config_path)?
    } else {
        info!(config_path = %config_path, "No configuration file, using defaults");
        GatewayConfig::default()
    };

    let (report_tx, mut report_rx) = mpsc::unbounded_channel();
    let engine = Arc::new(LoopbackEngine {
        report_tx,
        next_exchange_id: AtomicU64::new(1),
    });
    let control = Arc::new(LoopbackControl {
        recovering: AtomicBool::new(false),
    });

    let (gateway, mut completions) =
        OrderGateway::new(config, engine, control, Arc::new(EmptyPersistence))?;
    let gateway = Arc::new(gateway);

    // Route loopback acknowledgments into the reconciliation stage.
    let report_gateway = Arc::clone(&gateway);
    tokio::spawn(async move {
        while let Some(report) = report_rx.recv().await {
            report_gateway.submit_report(report);
        }
    });

    // Log completions; a real deployment routes them by client key.
    tokio::spawn(async move {
        while let Some(completion) = completions.recv().await {
            info!(
                client_key = %completion.client_key,
                order_sid = %completion.order_sid,
                completion_type = %completion.completion_type,
                "Order request completion"
            );
        }
    });

    gateway.start().await?;
    info!("Gateway active");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    gateway.stop().await?;
    Ok(())
}
