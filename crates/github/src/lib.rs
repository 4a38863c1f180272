//! Kanban tuner GitHub infrastructure adapter.
//!
//! Implements [`board::RepositoryService`] on top of the GitHub REST API
//! (contributors, issues, pull requests, repository node ids) and the GraphQL
//! API (Projects v2 boards, fields and single-select options).
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules.
//! All GitHub API details (authentication, status mapping, `Retry-After`,
//! GraphQL error envelopes) are handled here; the [`board`] crate never sees
//! them. Retrying is left to the caller, driven by
//! [`board::ServiceError::retry_policy`].
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | `client` | [`GithubClient`], request plumbing and error mapping |
//! | `rest` | REST payloads and their conversion to domain types |
//! | `graphql` | Projects v2 queries, mutations and payloads |
//! | `service` | The [`board::RepositoryService`] implementation |

mod client;
mod graphql;
mod rest;
mod service;

pub use client::{GithubClient, DEFAULT_API_URL};
