pub mod adapters;
pub mod clock;
pub mod document_store;
pub mod gateway;
pub mod link_registry;
pub mod linking;
pub mod reminders;
pub mod service;
pub mod signature;

pub use clock::{Clock, ManualClock, SystemClock};
pub use document_store::{DocumentStore, FirebaseDocumentStore, SqliteDocumentStore, StoreError};
pub use gateway::{LineGateway, MessagingGateway};
pub use link_registry::{LinkRegistry, LinkRegistryError, PendingLink};
pub use linking::{sanitize_identity, InboundOutcome, LinkingError, LinkingFlow};
pub use reminders::{LinkRecord, Reminder, ReminderEvaluator, TickReport, TriggerKind};
