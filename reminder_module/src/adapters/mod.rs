pub mod line;

pub use line::{LineEvent, LineMessage, LineSource, LineWebhook};
