//! Issue bridge: error reports in, Jira tickets out, status kept in sync.
//!
//! ## Overview
//!
//! Operational tooling reports an error (VM, database, Kubernetes, API) over
//! HTTP. The bridge classifies the error code into a tracker project, opens a
//! ticket in Jira, stores the issue in SQLite, and appends an entry to the
//! issue's step log. On request, a background job polls Jira and copies the
//! remote status back into the local row.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (Router, CORS, TraceLayer, shutdown) │
//! │          │ <─────── │    └─ api.rs  (route handlers, AppState)         │
//! └──────────┘          │         │                                        │
//!                       │         │ ErrorClass::classify() → project id    │
//!                       │         │ IssueTracker::create_ticket()          │
//!                       │         v                                        │
//!                       │  tracker.rs  (JiraClient over reqwest)           │
//!                       │         │                                        │
//!                       │         │ ReconcileRegistry::start(tracker_id)   │
//!                       │         v                                        │
//!                       │  reconcile.rs  (one cancellable task per issue)  │
//!                       │         │                                        │
//!                       │         v                                        │
//!                       │  db.rs  (issues, error_store, step_log)          │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module     | Responsibility                                            |
//! |------------|-----------------------------------------------------------|
//! | `models`   | Row types: `Issue`, `ErrorStore`, `StepLog`, `StepNote`   |
//! | `classify` | `ErrorClass` and the error-code → project-id rules        |
//!
//! ## Typical Request Flow (`POST /issue`)
//!
//! 1. Body decodes into `CreateIssueRequest`; a malformed body is a 400 and
//!    nothing is written.
//! 2. The error code picks the tracker project; a matching `error_store`
//!    entry supplies the issue name and service.
//! 3. `JiraClient::create_ticket()` returns the tracker ID. A tracker
//!    failure is a 502 and nothing is written.
//! 4. The issue row and its opening step-log entry are inserted in one
//!    transaction, and the stored issue is returned with 201.

pub mod api;
pub mod classify;
pub mod db;
pub mod models;
pub mod reconcile;
pub mod server;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testutils;
