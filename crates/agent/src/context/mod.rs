//! What the model gets to see.

pub mod window;

pub use window::ConversationWindow;
