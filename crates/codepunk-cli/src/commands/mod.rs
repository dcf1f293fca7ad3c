pub(crate) mod config;
pub(crate) mod models;
pub(crate) mod plan;
pub(crate) mod session;
