// Application layer - Use case interactors and wiring

pub mod container;
pub mod split_interactor;

// Re-export interactors
pub use container::{AppContainer, DefaultAppContainer};
pub use split_interactor::{default_parallelism, ExecutionMode, SplitOrchestrator, SplitState};
