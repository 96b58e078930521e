pub mod conversation;
pub mod whatsapp;

pub use conversation::ConversationService;
pub use whatsapp::WhatsAppService;
