//! Application layer containing the dunning and curing orchestration.
//!
//! [`DunningService`] wires the [`RuleEngine`], the [`CuringWorkflow`] and the
//! [`Reports`] queries around one store, one transport and one clock. All of
//! them share a [`NotificationDispatcher`] so retries behave the same whether a
//! message announces a restriction or confirms a payment.

pub mod curing;
pub mod notifier;
pub mod outcome;
pub mod reports;
pub mod rule_engine;
pub mod templates;

use crate::config::EngineConfig;
use crate::domain::ports::{SharedClock, SharedStore, SharedTransport};
use curing::CuringWorkflow;
use notifier::NotificationDispatcher;
use reports::Reports;
use rule_engine::RuleEngine;

/// Entry point bundling every trigger operation.
#[derive(Clone)]
pub struct DunningService {
    pub rule_engine: RuleEngine,
    pub curing: CuringWorkflow,
    pub reports: Reports,
}

impl DunningService {
    pub fn new(
        store: SharedStore,
        transport: SharedTransport,
        clock: SharedClock,
        config: &EngineConfig,
    ) -> Self {
        let dispatcher = NotificationDispatcher::new(transport, clock.clone(), config.max_retries);
        Self {
            rule_engine: RuleEngine::new(
                store.clone(),
                dispatcher.clone(),
                clock.clone(),
                config.worker_count,
            ),
            curing: CuringWorkflow::new(store.clone(), dispatcher, clock.clone()),
            reports: Reports::new(store, clock),
        }
    }
}
