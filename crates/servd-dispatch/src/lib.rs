//! servd-dispatch: Startup strategy dispatch and bootstrap sequencing
//!
//! This crate ties the collaborators together:
//! - Dispatching the selected startup strategy
//! - Sequencing the full bootstrap up to the serving runtime launch

pub mod bootstrap;
pub mod dispatcher;

pub use bootstrap::{Bootstrap, Prepared};
pub use dispatcher::Dispatcher;
