//! Atelier - backend for a multilingual artist portfolio site
//!
//! This library provides session authentication, account management and the
//! HTTP surface the portfolio front-end talks to.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
