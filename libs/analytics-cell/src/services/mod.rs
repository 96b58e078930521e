pub mod analytics;
pub mod metrics;

pub use analytics::AnalyticsService;
