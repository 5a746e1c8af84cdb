//! G-Tactical Lead Lifecycle API Library
//!
//! This library provides the lead capture funnel and the staff back office for
//! the G-Tactical training school: validation of public registrations, their
//! single durable write, the asynchronous staff e-mail notification, and the
//! admin review workspace (listing, status changes, CSV export, dashboard,
//! course and schedule management).
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `integrations`: External service integrations.
//! - `admin`: Admin review workspace.
//! - `auth`: Staff sessions resolved from bearer tokens.
//! - `catalog`: Courses, schedules and site settings.
//! - `circuit_breaker`: Circuit breaker for the e-mail provider.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `dispatch_queue`: Notification queue and background worker.
//! - `email_client`: Transactional e-mail provider client.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.
//! - `notify`: New-lead notification rendering and dispatch.
//! - `routes`: Router assembly and middleware.
//! - `store`: Persistent store trait and backends.
//! - `submission`: Lead submission service.
//! - `validation`: Field validators, masks and sanitization.

pub mod api;
pub mod core;
pub mod integrations;

// Re-export primary modules for shared use in tests and the binary
pub mod admin;
pub mod auth;
pub mod catalog;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod dispatch_queue;
pub mod email_client;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod routes;
pub mod store;
pub mod submission;
pub mod validation;
