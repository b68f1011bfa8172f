pub mod sweeper_loop;
