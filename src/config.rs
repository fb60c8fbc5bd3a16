//! Runtime configuration, read from command-line flags with environment
//! fallbacks.

use crate::domain::risk::RiskConfig;
use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BROKER: &str = "localhost:9092";
pub const DEFAULT_DEFERRAL_TOPIC: &str = "pending_transactions";
pub const DEFAULT_VERDICT_TOPIC: &str = "transaction_results";
pub const DEFAULT_CONSUMER_GROUP: &str = "gateway-group";

/// Broker addresses and topic names for the message-queue bridges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub brokers: Vec<String>,
    pub deferral_topic: String,
    pub verdict_topic: String,
    pub consumer_group: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            brokers: vec![DEFAULT_BROKER.to_string()],
            deferral_topic: DEFAULT_DEFERRAL_TOPIC.to_string(),
            verdict_topic: DEFAULT_VERDICT_TOPIC.to_string(),
            consumer_group: DEFAULT_CONSUMER_GROUP.to_string(),
        }
    }
}

impl QueueConfig {
    pub fn bootstrap_servers(&self) -> String {
        self.brokers.join(",")
    }
}

#[derive(Debug, Clone, Args)]
pub struct RiskArgs {
    /// Charges above this amount are deferred to asynchronous analysis
    #[arg(long, env = "GATEWAY_HIGH_VALUE_THRESHOLD", default_value_t = dec!(10000))]
    pub high_value_threshold: Decimal,

    /// Probability in [0, 1] that an inline charge is approved
    #[arg(long, env = "GATEWAY_APPROVAL_PROBABILITY", default_value_t = 0.7)]
    pub approval_probability: f64,

    /// Seed for the risk policy's random generator (random if omitted)
    #[arg(long, env = "GATEWAY_RISK_SEED")]
    pub risk_seed: Option<u64>,
}

impl From<RiskArgs> for RiskConfig {
    fn from(args: RiskArgs) -> Self {
        Self {
            high_value_threshold: args.high_value_threshold,
            approval_probability: args.approval_probability,
            seed: args.risk_seed,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct QueueArgs {
    /// Comma-separated broker list
    #[arg(long, env = "KAFKA_BROKER", default_value = DEFAULT_BROKER, value_delimiter = ',')]
    pub brokers: Vec<String>,

    /// Topic deferral events are published to
    #[arg(long, env = "KAFKA_PRODUCER_TOPIC", default_value = DEFAULT_DEFERRAL_TOPIC)]
    pub deferral_topic: String,

    /// Topic verdict events are consumed from
    #[arg(long, env = "KAFKA_CONSUMER_TOPIC", default_value = DEFAULT_VERDICT_TOPIC)]
    pub verdict_topic: String,

    /// Consumer group for the verdict topic
    #[arg(long, env = "KAFKA_CONSUMER_GROUP", default_value = DEFAULT_CONSUMER_GROUP)]
    pub consumer_group: String,
}

impl From<QueueArgs> for QueueConfig {
    fn from(args: QueueArgs) -> Self {
        Self {
            brokers: args.brokers,
            deferral_topic: args.deferral_topic,
            verdict_topic: args.verdict_topic,
            consumer_group: args.consumer_group,
        }
    }
}
