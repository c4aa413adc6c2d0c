//! Command handlers grouped by resource.

pub(crate) mod component;
pub(crate) mod env;
pub(crate) mod logger;
pub(crate) mod monitor;
pub(crate) mod provider;
pub(crate) mod service;
pub(crate) mod session;
pub(crate) mod target;
pub(crate) mod user;
