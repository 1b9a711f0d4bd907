mod cancel;
mod engine;
mod handle;
mod progress;
mod task;

pub use cancel::CancellationToken;
pub use engine::{SearchConfig, SearchEngine};
pub use handle::{SearchHandle, SearchOutcome};
pub use progress::{SearchProgress, SearchState};
pub use task::SearchTask;
