//! Multi-instrument router — O(1) dispatch to per-instrument pipelines.
//!
//! Each registered instrument gets its own book, arena, engine, and gateway.
//! All gateways publish into one shared event channel, so downstream
//! consumers see a single stream tagged by instrument id; within one
//! instrument the sub-stream is ordered, across instruments it interleaves.
//!
//! Dispatch is a dense `instrument_id -> pipeline` table. Unknown ids are
//! rejected without touching any pipeline state — cross-instrument matching
//! is not a thing, by design.

use tracing::info;

use crate::arena::OrderArena;
use crate::error::ConfigError;
use crate::gateway::{shared_channel, GatewayRejectReason, GatewayResult, OrderGateway};
use crate::instrument::InstrumentRegistry;
use crate::matching::{MatchingEngine, StpMode};
use crate::message::{EventMessage, OrderMessage};
use crate::order_book::OrderBook;
use crate::ring::Producer;
use crate::types::{InstrumentId, OrderId};

const INVALID_PIPELINE: u32 = u32::MAX;

/// One instrument's complete processing pipeline. The gateway owns the
/// engine, which owns the book and arena.
pub struct InstrumentPipeline {
    pub instrument_id: InstrumentId,
    pub gateway: OrderGateway,
}

/// Routes inbound commands to the owning instrument pipeline.
pub struct InstrumentRouter {
    pipelines: Vec<InstrumentPipeline>,
    /// Dense lookup: instrument id → index into `pipelines`, or sentinel.
    id_to_index: Vec<u32>,
}

impl InstrumentRouter {
    /// Build one pipeline per registered instrument, all bound to the same
    /// event channel (pass `None` for embedded/test mode).
    pub fn new(
        registry: &InstrumentRegistry,
        event_producer: Option<Producer<EventMessage>>,
        stp_mode: StpMode,
    ) -> Result<Self, ConfigError> {
        let channel = event_producer.map(shared_channel);

        let max_id = registry
            .instruments()
            .iter()
            .map(|c| c.instrument_id)
            .max()
            .unwrap_or(0);
        let mut id_to_index = vec![INVALID_PIPELINE; max_id as usize + 1];
        let mut pipelines = Vec::with_capacity(registry.len());

        for config in registry.instruments() {
            let book = OrderBook::new(
                config.min_price,
                config.max_price,
                config.tick_size,
                config.max_orders as usize,
            )?;
            let arena = OrderArena::new(config.max_orders);
            let engine = MatchingEngine::new(book, arena, stp_mode);
            let gateway = match &channel {
                Some(ch) => {
                    OrderGateway::with_channel(engine, config.instrument_id, ch.clone())
                }
                None => OrderGateway::new(engine, config.instrument_id),
            };

            id_to_index[config.instrument_id as usize] = pipelines.len() as u32;
            pipelines.push(InstrumentPipeline {
                instrument_id: config.instrument_id,
                gateway,
            });

            info!(
                instrument_id = config.instrument_id,
                symbol = %config.symbol,
                levels = pipelines.last().unwrap().gateway.engine().book().num_levels(),
                "pipeline constructed"
            );
        }

        Ok(Self {
            pipelines,
            id_to_index,
        })
    }

    /// Submit an add command to its instrument's pipeline.
    pub fn process_order(&mut self, msg: &OrderMessage) -> GatewayResult {
        match self.lookup_mut(msg.instrument_id) {
            Some(pipeline) => pipeline.gateway.process_order(msg),
            None => GatewayResult::rejected(GatewayRejectReason::UnknownInstrument),
        }
    }

    /// Cancel an order on the given instrument.
    pub fn process_cancel(&mut self, instrument_id: InstrumentId, order_id: OrderId) -> bool {
        match self.lookup_mut(instrument_id) {
            Some(pipeline) => pipeline.gateway.process_cancel(order_id),
            None => false,
        }
    }

    /// Modify an order on its instrument's pipeline.
    pub fn process_modify(&mut self, msg: &OrderMessage) -> GatewayResult {
        match self.lookup_mut(msg.instrument_id) {
            Some(pipeline) => pipeline.gateway.process_modify(msg),
            None => GatewayResult::rejected(GatewayRejectReason::UnknownInstrument),
        }
    }

    /// Borrow an instrument's pipeline, if registered.
    pub fn pipeline(&self, instrument_id: InstrumentId) -> Option<&InstrumentPipeline> {
        let index = *self.id_to_index.get(instrument_id as usize)?;
        (index != INVALID_PIPELINE).then(|| &self.pipelines[index as usize])
    }

    pub fn instrument_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Pre-fault every pipeline's arena before trading starts.
    pub fn warm_up(&mut self) {
        for pipeline in &mut self.pipelines {
            pipeline.gateway.engine_mut().warm_up();
        }
    }

    fn lookup_mut(&mut self, instrument_id: InstrumentId) -> Option<&mut InstrumentPipeline> {
        let index = *self.id_to_index.get(instrument_id as usize)?;
        (index != INVALID_PIPELINE).then(|| &mut self.pipelines[index as usize])
    }
}
