//! # Static site hosting
//!
//! This crate ships rendered landing page builds to hosting providers
//! and manages the domains that point at them.
//!
//! # Deployment pipeline
//!
//! A single deployment run is driven by the [`Orchestrator`]:
//!
//! 1. build directory contents are collected by the [`collector`];
//! 2. every file is hashed with SHA-1 in the [`digest`] module, the digest
//!    being the deduplication key on the provider side;
//! 3. files are uploaded and a deployment is created by a [`ProviderAdapter`].
//!    The order of these two steps is provider-specific, see the [`vercel`]
//!    and [`netlify`] adapters;
//! 4. deployment readiness is awaited by the [`poller`];
//! 5. a friendly alias is assigned, falling back to the raw deployment URL.
//!
//! # Domains
//!
//! The [`domains`] module manages both the provider-side domain links and the
//! administrative domain registration records, which are independent of each other.
//! Registration data may be refreshed from RDAP, see the [`rdap`] module.
//!
//! [`Orchestrator`]: orchestrator::Orchestrator
//! [`ProviderAdapter`]: provider::ProviderAdapter
//! [`vercel`]: provider::vercel
//! [`netlify`]: provider::netlify

pub mod collector;
pub mod digest;
pub mod domains;
pub mod orchestrator;
pub mod poller;
pub mod provider;
pub mod rdap;
pub mod retry;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

#[cfg(test)]
mod support;
