pub mod reconcile_queue;
