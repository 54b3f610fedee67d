//! Pre-built sources, sinks and pipelines for common testing scenarios.

use crate::aggregate::counting;
use crate::compute::ComputeStage;
use crate::function::{KeyFn, ProjectFn, item};
use crate::pipeline::Pipeline;
use crate::processor::NamedFactory;
use crate::transform::{JoinClause, SinkDef, SourceDef};
use serde::{Deserialize, Serialize};

/// A source named `name` backed by a `list-source` factory.
#[must_use]
pub fn list_source(name: &str) -> SourceDef {
    SourceDef::new(name, NamedFactory::new("list-source").shared())
}

/// A sink named `name` backed by a `list-sink` factory.
#[must_use]
pub fn list_sink(name: &str) -> SinkDef {
    SinkDef::new(name, NamedFactory::new("list-sink").shared())
}

/// Key function grouping `String` items by themselves.
#[must_use]
pub fn word_key() -> KeyFn {
    KeyFn::new(|it| match it.downcast_ref::<String>() {
        Some(word) => item(word.to_lowercase()),
        None => it.clone(),
    })
}

/// `words → group-and-aggregate(count) → counts`. Returns the grouping key.
pub fn word_count(p: &Pipeline) -> KeyFn {
    let key = word_key();
    p.draw_from(list_source("words"))
        .grouping_key(key.clone())
        .aggregate(counting())
        .drain_to(list_sink("counts"));
    key
}

/// Sample trade event for enrichment scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Trade {
    pub ticker: String,
    pub broker_id: u32,
    pub quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Product {
    pub ticker: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Broker {
    pub id: u32,
    pub name: String,
}

/// Sample trades.
#[must_use]
pub fn sample_trades() -> Vec<Trade> {
    vec![
        Trade {
            ticker: "ACME".to_string(),
            broker_id: 1,
            quantity: 100,
        },
        Trade {
            ticker: "INIT".to_string(),
            broker_id: 2,
            quantity: 40,
        },
        Trade {
            ticker: "ACME".to_string(),
            broker_id: 2,
            quantity: 7,
        },
    ]
}

/// Handles to the stages of [`enrichment_join`].
pub struct EnrichmentJoin {
    pub trades: ComputeStage,
    pub products: ComputeStage,
    pub brokers: ComputeStage,
    pub joined: ComputeStage,
    pub product_clause: JoinClause,
    pub broker_clause: JoinClause,
}

fn trade_ticker() -> KeyFn {
    KeyFn::new(|it| it.downcast_ref::<Trade>().map_or_else(|| it.clone(), |t| item(t.ticker.clone())))
}

fn trade_broker() -> KeyFn {
    KeyFn::new(|it| it.downcast_ref::<Trade>().map_or_else(|| it.clone(), |t| item(t.broker_id)))
}

/// Trades enriched with product and broker names through a 3-way hash-join,
/// drained to `enriched`.
pub fn enrichment_join(p: &Pipeline) -> EnrichmentJoin {
    let trades = p.draw_from(list_source("trades"));
    let products = p.draw_from(list_source("products"));
    let brokers = p.draw_from(list_source("brokers"));

    let product_clause = JoinClause::new(
        trade_ticker(),
        KeyFn::new(|it| it.downcast_ref::<Product>().map_or_else(|| it.clone(), |p| item(p.ticker.clone()))),
        ProjectFn::new(|it| it.downcast_ref::<Product>().map_or_else(|| it.clone(), |p| item(p.name.clone()))),
    );
    let broker_clause = JoinClause::new(
        trade_broker(),
        KeyFn::new(|it| it.downcast_ref::<Broker>().map_or_else(|| it.clone(), |b| item(b.id))),
        ProjectFn::new(|it| it.downcast_ref::<Broker>().map_or_else(|| it.clone(), |b| item(b.name.clone()))),
    );

    let joined = trades.hash_join2(&products, product_clause.clone(), &brokers, broker_clause.clone());
    joined.drain_to(list_sink("enriched"));
    EnrichmentJoin {
        trades,
        products,
        brokers,
        joined,
        product_clause,
        broker_clause,
    }
}
