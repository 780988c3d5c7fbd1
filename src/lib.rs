#![warn(clippy::pedantic, clippy::nursery, clippy::cargo)]
#![deny(clippy::use_self, rust_2018_idioms)]
#![allow(clippy::multiple_crate_versions, clippy::module_name_repetitions)]

//! An alarm clock that runs in the terminal.
//!
//! The [`engine::TriggerEngine`] is the heart of it: fed the time and the
//! list of alarms, it reports which alarms are due, never more than once
//! per minute, and keeps track of the one that is ringing. The
//! [`scheduler::Scheduler`] feeds it once a second from a
//! [`store::AlarmStore`] and a [`clock::Clock`].

pub mod alarm;
pub mod challenge;
pub mod clock;
pub mod communication;
pub mod config;
pub mod engine;
pub mod error;
pub mod presentation;
pub mod scheduler;
pub mod store;
pub mod tone;
