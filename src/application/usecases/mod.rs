pub mod expiration_sweeper;
pub mod reconcile;
pub mod subscriptions;
