mod coordinator;
mod state;

pub use coordinator::RefreshCoordinator;
