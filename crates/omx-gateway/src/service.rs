//! The gateway service facade.
//!
//! Owns the shared state (registry, exposure, instrument directory),
//! wires admission → dispatch → engine and reports → reconciliation →
//! distribution, and drives every subsystem through the lifecycle
//! orchestrator: init → warm-up → reset → recovery → active, reset on
//! demand, stop at the end.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use omx_core::{ExecutionReport, InstrumentSid, OrderRequestCompletion, OrderSid, OrderUpdate, Qty};
use omx_executor::{
    spawn_executor, ExchangeEngine, ExecutorChild, ExecutorConfig, OrderExecutor, RequestQueue,
};
use omx_lifecycle::{
    LifecycleChild, LifecycleController, LifecycleHooks, LifecycleOrchestrator, LifecycleState,
    OrchestratorConfig,
};
use omx_reconcile::OrderContextManager;
use omx_registry::{InstrumentDirectory, OrderRequestRegistry};
use omx_risk::{Exposure, ThrottleTracker};

use crate::admission::{
    AdmissionConfig, AdmissionController, CancelOrderInstruction, DispatchCompletions,
    NewOrderInstruction,
};
use crate::command::{Command, CommandAck};
use crate::config::GatewayConfig;
use crate::distribution::{CompletionHub, SubscriberHub};
use crate::engine::{EngineChild, EngineControl};
use crate::error::{GatewayError, GatewayResult};
use crate::recovery::{run_recovery_protocol, PersistenceClient};
use crate::stage::{spawn_update_stage, UpdateStage};

/// Registry, exposure and instrument directory as one orchestrated
/// child, so reset clears them under the same transition as everyone
/// else.
struct CoreStateChild {
    name: String,
    controller: LifecycleController,
    registry: Arc<OrderRequestRegistry>,
    instruments: Arc<InstrumentDirectory>,
    exposure: Arc<Exposure>,
}

struct CoreStateHooks {
    registry: Arc<OrderRequestRegistry>,
    instruments: Arc<InstrumentDirectory>,
    exposure: Arc<Exposure>,
}

impl LifecycleHooks for CoreStateHooks {
    fn on_pending_reset(&self) -> Result<(), String> {
        self.registry.clear();
        self.instruments.clear();
        self.exposure.clear();
        Ok(())
    }
}

impl LifecycleChild for CoreStateChild {
    fn name(&self) -> &str {
        &self.name
    }

    fn controller(&self) -> &LifecycleController {
        &self.controller
    }

    fn is_clear(&self) -> bool {
        self.registry.is_clear() && self.instruments.is_clear() && self.exposure.is_clear()
    }
}

/// The order-management gateway.
pub struct OrderGateway {
    config: GatewayConfig,
    registry: Arc<OrderRequestRegistry>,
    instruments: Arc<InstrumentDirectory>,
    exposure: Arc<Exposure>,
    admission: Arc<AdmissionController>,
    executor_child: Arc<ExecutorChild>,
    stage: Arc<UpdateStage>,
    engine_child: Arc<EngineChild>,
    core_child: Arc<CoreStateChild>,
    orchestrator: LifecycleOrchestrator,
    subscribers: Arc<SubscriberHub>,
    persistence: Arc<dyn PersistenceClient>,
}

impl OrderGateway {
    /// Build and wire the gateway. Must run inside a tokio runtime;
    /// the dispatcher thread and the update-stage task start
    /// immediately, idle until warm-up.
    ///
    /// Returns the gateway and the completion stream.
    pub fn new(
        config: GatewayConfig,
        engine: Arc<dyn ExchangeEngine>,
        engine_control: Arc<dyn EngineControl>,
        persistence: Arc<dyn PersistenceClient>,
    ) -> GatewayResult<(Self, mpsc::UnboundedReceiver<OrderRequestCompletion>)> {
        config.validate()?;

        let registry = Arc::new(OrderRequestRegistry::new(config.start_order_sid));
        let underlying = match &config.underlying_throttle {
            Some(cfg) => Some(Arc::new(ThrottleTracker::new(
                cfg.capacity,
                cfg.window_ms.saturating_mul(1_000_000),
            )?)),
            None => None,
        };
        let instruments = Arc::new(InstrumentDirectory::new(config.num_channels, underlying));
        let exposure = Arc::new(Exposure::new(config.purchasing_power));
        info!(
            purchasing_power = exposure.purchasing_power(),
            "Initialize purchasing power"
        );

        let (completion_hub, completion_rx) = CompletionHub::new();
        let completion_hub = Arc::new(completion_hub);
        let subscribers = Arc::new(SubscriberHub::new());

        let manager = Arc::new(OrderContextManager::new(
            Arc::clone(&registry),
            Arc::clone(&instruments),
            Arc::clone(&exposure),
            subscribers.clone(),
            completion_hub.clone(),
        ));
        let stage = spawn_update_stage(format!("{}-updates", config.name), manager);

        let queue = Arc::new(RequestQueue::new(config.queue_capacity));
        let admission = Arc::new(AdmissionController::new(
            Arc::clone(&registry),
            Arc::clone(&instruments),
            Arc::clone(&exposure),
            Arc::clone(&queue),
            completion_hub.clone(),
            AdmissionConfig {
                default_timeout_ms: config.request_timeout_ms,
                avoid_multiple_cancels: config.avoid_multiple_cancels,
            },
        ));

        let mut trackers = Vec::with_capacity(config.throttle_domains.len());
        for domain in &config.throttle_domains {
            trackers.push(Arc::new(ThrottleTracker::new(
                domain.capacity,
                domain.window_ms.saturating_mul(1_000_000),
            )?));
        }
        let executor = Arc::new(OrderExecutor::new(
            format!("{}-dispatch", config.name),
            trackers,
            engine,
            Arc::new(DispatchCompletions::new(Arc::clone(&admission))),
            Arc::clone(&queue),
            ExecutorConfig {
                max_batch_orders: config.max_batch_orders,
                drain_per_cycle: 64,
            },
        ));
        let executor_child = spawn_executor(executor)?;

        let engine_child = EngineChild::new(format!("{}-engine", config.name), engine_control);

        let core_child = Arc::new(CoreStateChild {
            name: format!("{}-core", config.name),
            controller: LifecycleController::new(
                format!("{}-core-lifecycle", config.name),
                Box::new(CoreStateHooks {
                    registry: Arc::clone(&registry),
                    instruments: Arc::clone(&instruments),
                    exposure: Arc::clone(&exposure),
                }),
            ),
            registry: Arc::clone(&registry),
            instruments: Arc::clone(&instruments),
            exposure: Arc::clone(&exposure),
        });

        // Fixed child order. The engine is last so recovery replay
        // starts only once everyone upstream is listening, and stop
        // reaches it only after the others shut down.
        let orchestrator = LifecycleOrchestrator::new(
            vec![
                core_child.clone() as Arc<dyn LifecycleChild>,
                executor_child.clone() as Arc<dyn LifecycleChild>,
                stage.clone() as Arc<dyn LifecycleChild>,
                engine_child.clone() as Arc<dyn LifecycleChild>,
            ],
            OrchestratorConfig {
                stop_timeout: Duration::from_millis(config.stop_timeout_ms),
                stop_poll_interval: Duration::from_millis(10),
            },
        );

        Ok((
            Self {
                config,
                registry,
                instruments,
                exposure,
                admission,
                executor_child,
                stage,
                engine_child,
                core_child,
                orchestrator,
                subscribers,
                persistence,
            },
            completion_rx,
        ))
    }

    // ------------------------------------------------------------------
    // Request surface
    // ------------------------------------------------------------------

    pub fn submit_new_order(&self, instruction: NewOrderInstruction) -> OrderSid {
        self.admission.submit_new_order(instruction)
    }

    pub fn submit_cancel_order(&self, instruction: CancelOrderInstruction) -> OrderSid {
        self.admission.submit_cancel_order(instruction)
    }

    /// Feed one decoded execution report from the exchange-facing
    /// engine into the reconciliation stage.
    pub fn submit_report(&self, report: ExecutionReport) {
        self.stage.submit(report);
    }

    /// Subscribe to the sequenced update stream.
    pub fn subscribe_updates(&self) -> mpsc::UnboundedReceiver<OrderUpdate> {
        self.subscribers.subscribe()
    }

    /// Replace the initial purchasing power at runtime.
    pub fn update_purchasing_power(&self, value: i64) -> CommandAck {
        match self.exposure.update_initial(value) {
            Ok(()) => CommandAck::Ok,
            Err(e) => {
                error!(error = %e, "Purchasing power update rejected");
                CommandAck::Failed
            }
        }
    }

    #[must_use]
    pub fn purchasing_power(&self) -> i64 {
        self.exposure.purchasing_power()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Representative service state (children move in lockstep).
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.core_child.controller().state()
    }

    pub fn warmup(&self) -> GatewayResult<()> {
        self.orchestrator.warmup()?;
        Ok(())
    }

    pub fn reset(&self) -> GatewayResult<()> {
        self.orchestrator.reset()?;
        // Publisher channels rewound to their initial sequence; the
        // consumer-side trackers follow.
        self.subscribers.reset_sequences();
        Ok(())
    }

    /// Recovery: transition every child to Recovery (listeners first,
    /// engine replay last), then run the persistence protocol and wait
    /// for the replay to drain, then the epilogue.
    pub async fn recover(&self) -> GatewayResult<()> {
        self.orchestrator.recover()?;

        let stage = Arc::clone(&self.stage);
        run_recovery_protocol(self.persistence.as_ref(), |report| stage.submit(report)).await?;

        let drain_timeout = Duration::from_millis(self.config.recovery_drain_timeout_ms);
        if !self.stage.wait_drained(drain_timeout).await {
            return Err(GatewayError::RecoveryStalled(
                self.config.recovery_drain_timeout_ms,
            ));
        }

        self.registry.resume_sid_generator();
        self.load_existing_positions();
        info!(
            exposure = self.exposure.purchasing_power(),
            exposure_updated_at_ms = self.stage.manager().exposure_recovered_at_ms(),
            next_order_sid = self.registry.latest_seen_sid() + 1,
            "Recovery completed"
        );
        Ok(())
    }

    pub fn activate(&self) -> GatewayResult<()> {
        self.orchestrator.activate()?;
        Ok(())
    }

    /// Full startup sequence: warm-up → reset → recovery → active.
    pub async fn start(&self) -> GatewayResult<()> {
        self.warmup()?;
        self.reset()?;
        self.recover().await?;
        self.activate()
    }

    pub async fn stop(&self) -> GatewayResult<()> {
        self.orchestrator.stop().await?;
        Ok(())
    }

    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.core_child.is_clear()
            && self.executor_child.is_clear()
            && self.stage.is_clear()
            && self.engine_child.is_clear()
    }

    /// Positions held before this session, loaded at recovery exit.
    /// Format: `"instrumentSid,qty;instrumentSid,qty"`.
    fn load_existing_positions(&self) {
        let Some(positions) = &self.config.existing_positions else {
            return;
        };
        for pair in positions.split(';').filter(|p| !p.is_empty()) {
            let mut items = pair.split(',');
            let parsed = items
                .next()
                .and_then(|s| s.trim().parse::<u64>().ok())
                .zip(items.next().and_then(|q| q.trim().parse::<i64>().ok()));
            match parsed {
                Some((instrument_sid, qty)) => {
                    let state = self.instruments.get_or_create(InstrumentSid::new(instrument_sid));
                    state.book().lock().add_existing_position(Qty::new(qty));
                }
                None => {
                    error!(pair, "Unable to apply existing position");
                }
            }
        }
        info!("Loaded existing positions");
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    pub async fn handle_command(&self, command: Command) -> CommandAck {
        info!(?command, "Received command");
        match command {
            Command::EvaluateState => self.advance_state().await,
            Command::Reset => {
                if self.state() != LifecycleState::Active {
                    warn!(state = %self.state(), "Cannot reset service when it is not active");
                    return CommandAck::Failed;
                }
                match self.reset() {
                    Ok(()) => CommandAck::Ok,
                    Err(e) => {
                        error!(error = %e, "Reset failed");
                        CommandAck::Failed
                    }
                }
            }
            Command::Engine(action) => {
                if self.engine_child.control().apply_action(&action) {
                    CommandAck::Ok
                } else {
                    CommandAck::NotSupported
                }
            }
        }
    }

    /// Move one step along the startup sequence.
    async fn advance_state(&self) -> CommandAck {
        let result = match self.state() {
            LifecycleState::Init => self.warmup(),
            LifecycleState::Warmup => self.reset(),
            LifecycleState::Reset => self.recover().await,
            LifecycleState::Recovery => self.activate(),
            LifecycleState::Active => Ok(()),
            other => {
                warn!(state = %other, "No next state to evaluate");
                return CommandAck::Failed;
            }
        };
        match result {
            Ok(()) => CommandAck::Ok,
            Err(e) => {
                error!(error = %e, "State evaluation failed");
                CommandAck::Failed
            }
        }
    }
}
