pub mod metrics;
pub mod prompt;
pub mod providers;

pub use prompt::render_prompt;
pub use providers::{TextProvider, ProviderError};
