pub mod attempt_repo;
pub mod event_repo;
