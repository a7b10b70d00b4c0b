//! Core types, algorithms and trait definitions for Tether.
//!
//! Tether reconciles the identity of a person who reaches out through
//! different email addresses and phone numbers over time. This crate holds
//! the reconciliation algorithm itself ([`matcher`], [`resolver`],
//! [`consolidate`]) and the seams storage backends implement
//! ([`store::ContactTx`], [`store::IdentityStore`]).
//!
//! It has no HTTP or SQL dependencies.

pub mod consolidate;
pub mod contact;
pub mod error;
pub mod locks;
pub mod matcher;
pub mod memory;
pub mod observation;
pub mod resolver;
pub mod service;
pub mod store;

pub use error::{Error, Result};
