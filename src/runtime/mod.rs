//! Runtime adapters and the service-facing API surface.

pub mod api;
pub mod spawn;
#[cfg(feature = "tokio-runtime")]
pub mod sweeper;
#[cfg(feature = "tokio-runtime")]
pub mod tokio_spawner;

pub use api::{
    CancellationsRequest, CancellationsResponse, ReapRequest, ReapResponse, TaskUpdateMessage,
    UpdateTasksRequest, UpdateTasksResponse,
};
pub use spawn::Spawn;
#[cfg(feature = "tokio-runtime")]
pub use sweeper::AckSweeper;
#[cfg(feature = "tokio-runtime")]
pub use tokio_spawner::TokioSpawner;
