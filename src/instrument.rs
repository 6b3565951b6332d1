//! Instrument configuration registry.
//!
//! Cold-path: populated at startup (programmatically or from JSON), read-only
//! afterward. The router turns each registered config into an independent
//! matching pipeline.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::types::{InstrumentId, Price};

/// Per-instrument deployment parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub instrument_id: InstrumentId,
    /// Human symbol, e.g. `"BTCUSDT"`.
    pub symbol: String,
    /// Lowest representable price (fixed-point).
    pub min_price: Price,
    /// Highest representable price (fixed-point).
    pub max_price: Price,
    /// Minimum price increment (fixed-point).
    pub tick_size: Price,
    /// Maximum live orders; sizes the arena and the order index.
    pub max_orders: u32,
}

/// Registry mapping instrument id ⇄ symbol with per-instrument config.
#[derive(Default)]
pub struct InstrumentRegistry {
    instruments: Vec<InstrumentConfig>,
    by_id: FxHashMap<InstrumentId, usize>,
    by_symbol: FxHashMap<String, usize>,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instrument. Rejects duplicate ids and duplicate symbols.
    pub fn register(&mut self, config: InstrumentConfig) -> Result<(), ConfigError> {
        if self.by_id.contains_key(&config.instrument_id) {
            return Err(ConfigError::DuplicateInstrument(config.instrument_id));
        }
        if self.by_symbol.contains_key(&config.symbol) {
            return Err(ConfigError::DuplicateSymbol(config.symbol.clone()));
        }

        info!(
            instrument_id = config.instrument_id,
            symbol = %config.symbol,
            "registered instrument"
        );

        let index = self.instruments.len();
        self.by_id.insert(config.instrument_id, index);
        self.by_symbol.insert(config.symbol.clone(), index);
        self.instruments.push(config);
        Ok(())
    }

    pub fn find_by_id(&self, id: InstrumentId) -> Option<&InstrumentConfig> {
        self.by_id.get(&id).map(|&i| &self.instruments[i])
    }

    pub fn find_by_symbol(&self, symbol: &str) -> Option<&InstrumentConfig> {
        self.by_symbol.get(symbol).map(|&i| &self.instruments[i])
    }

    pub fn instruments(&self) -> &[InstrumentConfig] {
        &self.instruments
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Load a registry from a JSON array of configs.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let configs: Vec<InstrumentConfig> =
            serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))?;
        let mut registry = Self::new();
        for config in configs {
            registry.register(config)?;
        }
        Ok(registry)
    }

    /// Serialize the registered configs to JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(&self.instruments).map_err(|e| ConfigError::Json(e.to_string()))
    }
}
