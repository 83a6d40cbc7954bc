//! Prometheus counters for the mutation pipeline

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::domain::ActionKind;

pub struct GatewayMetrics {
    registry: Registry,
    mutations: IntCounterVec,
    replays: IntCounterVec,
    retries: IntCounter,
}

impl GatewayMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let mutations = IntCounterVec::new(
            Opts::new("organizer_mutations_total", "Menu mutations by kind and outcome"),
            &["kind", "outcome"],
        )?;
        let replays = IntCounterVec::new(
            Opts::new("organizer_offline_replays_total", "Offline action replays by outcome"),
            &["outcome"],
        )?;
        let retries = IntCounter::new("organizer_store_retries_total", "Store calls retried after a transient error")?;

        registry.register(Box::new(mutations.clone()))?;
        registry.register(Box::new(replays.clone()))?;
        registry.register(Box::new(retries.clone()))?;

        Ok(Self {
            registry,
            mutations,
            replays,
            retries,
        })
    }

    pub fn record_mutation(&self, kind: ActionKind, outcome: &str) {
        self.mutations.with_label_values(&[kind.as_str(), outcome]).inc();
    }

    pub fn record_replay(&self, outcome: &str) {
        self.replays.with_label_values(&[outcome]).inc();
    }

    pub fn record_retry(&self) {
        self.retries.inc();
    }

    pub fn mutation_count(&self, kind: ActionKind, outcome: &str) -> u64 {
        self.mutations.with_label_values(&[kind.as_str(), outcome]).get()
    }

    /// Text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
