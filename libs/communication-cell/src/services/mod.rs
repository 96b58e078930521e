pub mod automation;
pub mod campaign;
pub mod config;
pub mod delivery;
pub mod email;
pub mod preferences;
pub mod render;
pub mod sms;
pub mod template;

pub use automation::AutomationWorker;
pub use campaign::CampaignService;
pub use config::CommunicationConfigService;
pub use delivery::{DeliveryAnalyticsService, DeliveryLogService};
pub use email::EmailService;
pub use preferences::PreferencesService;
pub use sms::SmsService;
pub use template::CommunicationTemplateService;
