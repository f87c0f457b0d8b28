//! Test components shared by the unit tests
mod mock_builder;

pub(crate) use mock_builder::*;
