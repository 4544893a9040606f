pub mod loader_tests;
pub mod resolver_tests;
