pub mod config;
pub mod decode;
pub mod listen;
pub mod resolve;

use beacon_core::ChannelConfig;
use clap::Args;

/// Endpoint overrides shared by commands that connect or resolve
#[derive(Args, Debug, Default)]
pub struct EndpointArgs {
    /// Page location to resolve the socket for (e.g. https://app.example.com)
    #[arg(long)]
    pub page_url: Option<String>,

    /// Production API base used for non-development hosts
    #[arg(long)]
    pub base: Option<String>,
}

impl EndpointArgs {
    /// Apply flags on top of the loaded configuration
    pub fn apply(&self, config: &mut ChannelConfig) {
        if let Some(page_url) = &self.page_url {
            config.endpoint.page_url = page_url.clone();
        }
        if let Some(base) = &self.base {
            config.endpoint.production_base = base.clone();
        }
    }
}
