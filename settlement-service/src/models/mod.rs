//! Domain models for settlement-service.

mod invoice;
mod payment;
mod status;

pub use invoice::{CreateInvoice, Invoice, RateSnapshot};
pub use payment::{Payment, PaymentMethod, PaymentStatus, PartialPayment, RecordPayment};
pub use status::{derive_status, qualifying_payment_date, InvoiceStatus};
