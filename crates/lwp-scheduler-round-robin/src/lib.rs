#![no_std]

extern crate alloc;

pub mod scheduler;

pub use scheduler::RoundRobin;
