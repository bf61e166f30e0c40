
pub mod executor_test;
pub mod suite_test;
