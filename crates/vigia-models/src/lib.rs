pub mod gateway;
pub mod message;
pub mod presence;

pub use message::Message;
pub use presence::PresenceEntry;
