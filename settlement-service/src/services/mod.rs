//! Services module for settlement-service.

pub mod exchange;
pub mod metrics;
pub mod repository;
pub mod settlement;

pub use exchange::{ExchangeGateway, ExchangeRateClient};
pub use metrics::{get_metrics, init_metrics};
pub use repository::{LedgerStore, MongoLedgerStore, PutOutcome};
pub use settlement::{CompanyTotals, PaymentEventResult, SettlementEngine};
