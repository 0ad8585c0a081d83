pub mod fifo_processor;
pub mod parallel_fifo_group;
pub mod processable;
