//! Application use cases / business logic

pub mod compose;
pub mod enrich;
pub mod retry;
pub mod run_loop;
pub mod screen;

pub use compose::{BodySource, ComposeConfig, Composer, MarkerRule};
pub use enrich::EnrichUseCase;
pub use retry::RetryPolicy;
pub use run_loop::{RunLoop, RunLoopConfig, RunLoopError};
pub use screen::{OnFailure, ScreenConfig, ScreenUseCase, Screening};
