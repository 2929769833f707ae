//! CLI route: single route table and run context. Dispatches to the site API and output.

use crate::api::SiteApi;
use crate::cli::output::{
    format_blocks_text, format_navigation_text, format_pages_text, format_restore_outcome,
    format_routes_text, format_sync_outcome, navigation_json,
};
use crate::cli::parse::{BlocksCommands, Commands};
use crate::config::ConfigLoader;
use crate::controller::{NavMode, NavigationView};
use crate::error::CmsError;
use crate::types::{BlockId, Page};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tokio::runtime::Runtime;
use tokio::time::timeout;
use tracing::{debug, info};

/// Runtime context for CLI execution: workspace, site API and the async runtime
/// that drives it. Built from workspace path and optional config path using
/// ConfigLoader only.
pub struct RunContext {
    api: SiteApi,
    runtime: Runtime,
    workspace_root: PathBuf,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => ConfigLoader::load(&workspace_root)
                .context("Failed to load workspace configuration")?,
        };
        let runtime = Runtime::new().context("Failed to start async runtime")?;
        let api = SiteApi::open(&config, &workspace_root).context("Failed to open site store")?;
        Ok(Self {
            api,
            runtime,
            workspace_root,
        })
    }

    /// Reference to the underlying site API.
    pub fn api(&self) -> &SiteApi {
        &self.api
    }

    pub fn workspace_root(&self) -> &PathBuf {
        &self.workspace_root
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String> {
        let started = Instant::now();
        let result = self.runtime.block_on(self.execute_inner(command));
        info!(
            command = command.name(),
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    async fn execute_inner(&self, command: &Commands) -> Result<String> {
        match command {
            Commands::Routes { format } => {
                let routes = self.api.routes().routes();
                if format == "json" {
                    to_json(&routes)
                } else {
                    Ok(format_routes_text(routes))
                }
            }
            Commands::Sync => {
                let outcome = self.api.trigger_sync().await.context("Sync rejected")?;
                let text = format_sync_outcome(&outcome);
                if outcome.error().is_some() {
                    bail!("{}", text.trim_end());
                }
                Ok(text)
            }
            Commands::Bootstrap => {
                let view = self.settled_view().await;
                if view.mode != NavMode::Degraded {
                    return Ok(format!(
                        "Navigation is {}; nothing to restore.\n\n{}",
                        view.mode.as_str(),
                        format_navigation_text(&view)
                    ));
                }
                let outcome = self
                    .api
                    .trigger_force_bootstrap()
                    .await
                    .context("Restore hit a data-integrity fault")?;
                Ok(format_restore_outcome(&outcome, &self.api.view()))
            }
            Commands::Nav { format } => {
                let view = self.settled_view().await;
                if format == "json" {
                    to_json(&navigation_json(&view))
                } else {
                    Ok(format_navigation_text(&view))
                }
            }
            Commands::Pages { format } => {
                let pages = self.api.pages().await.context("Failed to list pages")?;
                if format == "json" {
                    to_json(pages.as_ref())
                } else {
                    Ok(format_pages_text(&pages))
                }
            }
            Commands::Blocks { command } => self.handle_blocks_command(command).await,
        }
    }

    async fn handle_blocks_command(&self, command: &BlocksCommands) -> Result<String> {
        match command {
            BlocksCommands::List { page, format } => {
                let page = self.page_by_slug(page).await?;
                let blocks = self
                    .api
                    .list_blocks(page.id)
                    .await
                    .context("Failed to list content blocks")?;
                if format == "json" {
                    to_json(blocks.as_ref())
                } else {
                    Ok(format_blocks_text(&page.slug, &blocks))
                }
            }
            BlocksCommands::Reorder { page, ids } => {
                let page = self.page_by_slug(page).await?;
                let ordered = ids.iter().copied().map(BlockId).collect();
                let blocks = self
                    .api
                    .reorder_content_blocks(page.id, ordered)
                    .await
                    .context("Failed to reorder content blocks")?;
                Ok(format_blocks_text(&page.slug, &blocks))
            }
        }
    }

    async fn page_by_slug(&self, slug: &str) -> Result<Page> {
        let pages = self.api.pages().await.context("Failed to list pages")?;
        pages
            .iter()
            .find(|page| page.slug == slug)
            .cloned()
            .ok_or_else(|| CmsError::not_found("page", slug).into())
    }

    /// Load navigation and wait out the settle window if the load was not good.
    async fn settled_view(&self) -> NavigationView {
        let controller = self.api.controller();
        if self.api.start().await == NavMode::Loading {
            let settle = controller.timing().settle;
            debug!(settle_ms = settle.as_millis() as u64, "Waiting for navigation to settle");
            let mut rx = controller.subscribe();
            let _ = timeout(settle * 2, rx.wait_for(|view| view.mode != NavMode::Loading)).await;
        }
        controller.view()
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize output")
}
