//! Vultr Terraform Provider
//!
//! Reconciles Vultr block storage volumes and firewall rules from declared
//! configuration, speaking a line-delimited JSON protocol with the host.

pub mod client;
pub mod config;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod state;

pub use client::{BlockStorageApi, FirewallRuleApi, VultrClient};
pub use config::ProviderConfig;
pub use provider::{Diagnostic, Severity, VultrProvider};
pub use state::{DynamicValue, ResourceData};
