//! OneNumber event bus and transactional email.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the domain event envelope; names live in
//!   [`bus::event_types`].
//! - [`EmailDelivery`]: SMTP delivery via `lettre`.
//! - [`templates`]: subject/body rendering for each customer email.
//! - [`EmailNotifier`]: background task turning bus events into emails.

pub mod bus;
pub mod email;
pub mod notifier;
pub mod templates;

pub use bus::{event_types, EventBus, PlatformEvent};
pub use email::{EmailConfig, EmailDelivery, EmailError, EmailSender};
pub use notifier::EmailNotifier;
pub use templates::EmailMessage;
