//! Host protocol
//!
//! Requests and responses are JSON objects, one per line. Requests arrive on
//! stdin and every request gets exactly one response line on stdout; logs go
//! to stderr.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};

use crate::client::{BlockStorageApi, FirewallRuleApi};
use crate::config::ProviderConfig;
use crate::provider::{Diagnostic, PlanResponse, ProviderSchema, StateResponse, VultrProvider};
use crate::state::DynamicValue;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    GetSchema,
    Configure {
        #[serde(default)]
        config: DynamicValue,
    },
    ValidateResourceConfig {
        type_name: String,
        config: DynamicValue,
    },
    ReadResource {
        type_name: String,
        current_state: DynamicValue,
    },
    PlanResourceChange {
        type_name: String,
        #[serde(default)]
        prior_state: DynamicValue,
        #[serde(default)]
        proposed_new_state: DynamicValue,
    },
    ApplyResourceChange {
        type_name: String,
        #[serde(default)]
        prior_state: DynamicValue,
        #[serde(default)]
        planned_state: DynamicValue,
    },
    ImportResourceState {
        type_name: String,
        id: String,
    },
    Stop,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Schema(ProviderSchema),
    Diagnostics { diagnostics: Vec<Diagnostic> },
    State(StateResponse),
    Plan(PlanResponse),
    Stopped,
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Builds an API client from the merged provider configuration
pub type Connector<C> = Box<dyn Fn(&ProviderConfig) -> anyhow::Result<Arc<C>> + Send + Sync>;

pub struct Server<C>
where
    C: BlockStorageApi + FirewallRuleApi + ?Sized + 'static,
{
    provider: VultrProvider<C>,
    base_config: ProviderConfig,
    connect: Connector<C>,
}

impl<C> Server<C>
where
    C: BlockStorageApi + FirewallRuleApi + ?Sized + 'static,
{
    pub fn new(provider: VultrProvider<C>, base_config: ProviderConfig, connect: Connector<C>) -> Self {
        Self {
            provider,
            base_config,
            connect,
        }
    }

    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::GetSchema => Response::Schema(self.provider.schema()),
            Request::Configure { config } => {
                let merged = self.base_config.clone().with_provider_block(&config);
                match (self.connect)(&merged) {
                    Ok(client) => {
                        self.provider.configure(client).await;
                        Response::Diagnostics { diagnostics: vec![] }
                    }
                    Err(e) => Response::Diagnostics {
                        diagnostics: vec![Diagnostic::error("Failed to configure provider", e.to_string())],
                    },
                }
            }
            Request::ValidateResourceConfig { type_name, config } => Response::Diagnostics {
                diagnostics: self.provider.validate_resource_config(&type_name, &config),
            },
            Request::ReadResource { type_name, current_state } => {
                Response::State(self.provider.read_resource(&type_name, &current_state).await)
            }
            Request::PlanResourceChange {
                type_name,
                prior_state,
                proposed_new_state,
            } => Response::Plan(
                self.provider
                    .plan_resource_change(&type_name, &prior_state, &proposed_new_state),
            ),
            Request::ApplyResourceChange {
                type_name,
                prior_state,
                planned_state,
            } => Response::State(
                self.provider
                    .apply_resource_change(&type_name, &prior_state, &planned_state)
                    .await,
            ),
            Request::ImportResourceState { type_name, id } => {
                Response::State(self.provider.import_resource_state(&type_name, &id).await)
            }
            Request::Stop => Response::Stopped,
        }
    }

    /// Serve requests until `stop` or end of input
    pub async fn serve<R, W>(&self, input: R, mut output: W) -> Result<(), ServerError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<Request>(&line) {
                Ok(request) => {
                    debug!("Request: {:?}", request);
                    self.handle(request).await
                }
                Err(e) => {
                    error!("Malformed request: {}", e);
                    Response::Diagnostics {
                        diagnostics: vec![Diagnostic::error("Malformed request", e.to_string())],
                    }
                }
            };

            let stop = matches!(response, Response::Stopped);
            let mut encoded = serde_json::to_vec(&response)?;
            encoded.push(b'\n');
            output.write_all(&encoded).await?;
            output.flush().await?;

            if stop {
                info!("Stop requested");
                break;
            }
        }

        Ok(())
    }
}
