//! The skin analysis pipeline: diagnosis parsing, product matching, routine
//! building and the service that runs them end to end.

pub mod catalog;
pub mod diagnosis;
pub mod products;
pub mod routine;
pub mod service;
