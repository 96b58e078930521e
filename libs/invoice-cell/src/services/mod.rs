pub mod billing;
pub mod dashboard;
pub mod invoice;

pub use invoice::InvoiceService;
