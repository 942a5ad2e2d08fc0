//! Integration tests for the reservation engine and its HTTP adapter

mod common;
mod postgres_tests;
