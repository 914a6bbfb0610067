//! Service manager daemon library.
//!
//! Lets unprivileged clients list, query, start, stop and restart a
//! declared set of services. Every request is checked against a per-service
//! permission level before one of four privileged helper programs is run.
//!
//! The core is [`control::ControlFacade`]; [`socket`] serves it over a
//! Unix socket.

pub mod audit;
pub mod auth;
pub mod commands;
pub mod config;
pub mod control;
pub mod error;
pub mod executor;
pub mod policy;
pub mod protocol;
pub mod services;
pub mod socket;
pub mod validation;
