//! Sync command implementation.

use crate::client::ReqwestClient;
use async_trait::async_trait;
use clap::Args;
use docweave_engine::{
    HttpDocumentStore, ParentRepairPolicy, RetryConfig, StaticToken, StoreError, SyncOptions,
    Synchronizer, TenantTokenCache, TokenProvider, WriteResult,
};
use docweave_model::BlockId;
use docweave_store::MemoryDocumentStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Remote API connection flags.
#[derive(Args, Debug, Clone)]
pub struct ApiArgs {
    /// API base URL
    #[arg(long, env = "DOCWEAVE_BASE_URL", default_value = "https://open.feishu.cn")]
    pub base_url: String,

    /// Application ID used to obtain a tenant token
    #[arg(long, env = "DOCWEAVE_APP_ID")]
    pub app_id: Option<String>,

    /// Application secret used to obtain a tenant token
    #[arg(long, env = "DOCWEAVE_APP_SECRET", hide_env_values = true)]
    pub app_secret: Option<String>,

    /// Pre-issued access token (takes precedence over app credentials)
    #[arg(long, env = "DOCWEAVE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "20")]
    pub timeout_secs: u64,
}

/// Limits mapped onto [`SyncOptions`].
#[derive(Args, Debug, Clone)]
pub struct LimitArgs {
    /// Character ceiling before truncation
    #[arg(long, default_value = "60000")]
    pub max_chars: usize,

    /// Maximum blocks per write
    #[arg(long, default_value = "500")]
    pub batch_size: usize,

    /// Converted block count above which plain text is written instead
    #[arg(long, default_value = "1000")]
    pub max_blocks: usize,

    /// Attempts per write, including the first
    #[arg(long, default_value = "3")]
    pub max_attempts: u32,

    /// Seconds to wait between attempts
    #[arg(long, default_value = "5")]
    pub retry_delay_secs: u64,

    /// Fail instead of re-parenting blocks whose parent is out of reach
    #[arg(long)]
    pub strict_parents: bool,
}

impl LimitArgs {
    /// Builds the engine options.
    pub fn to_options(&self) -> SyncOptions {
        let policy = if self.strict_parents {
            ParentRepairPolicy::Strict
        } else {
            ParentRepairPolicy::Repair
        };
        SyncOptions::new()
            .with_max_chars(self.max_chars)
            .with_max_batch_size(self.batch_size)
            .with_max_total_blocks(self.max_blocks)
            .with_retry(
                RetryConfig::new(self.max_attempts)
                    .with_delay(Duration::from_secs(self.retry_delay_secs)),
            )
            .with_parent_repair(policy)
    }
}

/// Where to write.
#[derive(Debug, Clone)]
pub struct Target {
    /// Document ID.
    pub document: String,
    /// Container block; the document root if unset.
    pub container: Option<String>,
}

impl Target {
    /// Resolves the container block ID.
    pub fn container_id(&self) -> BlockId {
        BlockId::new(self.container.as_deref().unwrap_or(&self.document))
    }
}

/// How API calls are authorized.
pub enum Credentials {
    /// A fixed token.
    Static(StaticToken),
    /// Tenant token fetched from app credentials.
    Tenant(TenantTokenCache<ReqwestClient>),
}

impl ApiArgs {
    /// Picks credentials: an explicit token wins over app credentials.
    pub fn credentials(
        &self,
        client: Arc<ReqwestClient>,
    ) -> Result<Credentials, Box<dyn std::error::Error>> {
        if let Some(token) = &self.token {
            return Ok(Credentials::Static(StaticToken::new(token)));
        }
        match (&self.app_id, &self.app_secret) {
            (Some(app_id), Some(app_secret)) => Ok(Credentials::Tenant(TenantTokenCache::new(
                &self.base_url,
                app_id,
                app_secret,
                client,
            ))),
            _ => Err("either --token or both --app-id and --app-secret are required".into()),
        }
    }
}

#[async_trait]
impl TokenProvider for Credentials {
    async fn token(&self) -> Result<String, StoreError> {
        match self {
            Credentials::Static(token) => token.token().await,
            Credentials::Tenant(cache) => cache.token().await,
        }
    }
}

/// Runs the sync command.
pub async fn run(
    file: &Path,
    target: &Target,
    memory: bool,
    api: &ApiArgs,
    limits: &LimitArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let markdown = std::fs::read_to_string(file)?;
    let options = limits.to_options();
    options.validate()?;
    let container = target.container_id();

    let result = if memory {
        let store = MemoryDocumentStore::new();
        store.create_document(&target.document);
        let sync = Synchronizer::new(store);
        let result = sync
            .synchronize(&target.document, &container, &markdown, &options)
            .await;
        if let Some(document) = sync.store().document(&target.document) {
            println!("Stored blocks: {}", document.len());
        }
        result
    } else {
        let client = Arc::new(ReqwestClient::new(Duration::from_secs(api.timeout_secs))?);
        let credentials = api.credentials(Arc::clone(&client))?;
        let store = HttpDocumentStore::new(&api.base_url, client, credentials);
        Synchronizer::new(store)
            .synchronize(&target.document, &container, &markdown, &options)
            .await
    };

    print_summary(&result);
    match result.failure {
        Some(failure) => Err(format!("sync failed: {}", failure.error).into()),
        None => Ok(()),
    }
}

fn print_summary(result: &WriteResult) {
    println!("Phase:          {}", result.phase);
    println!("Blocks written: {}", result.blocks_written);
    println!("Batches:        {}", result.batches_written);
    println!(
        "Write calls:    {} ({} retries)",
        result.stats.write_calls, result.stats.retries
    );
    if result.stats.truncated {
        println!("Input was truncated");
    }
    if result.stats.repaired_blocks > 0 {
        println!("Re-parented:    {}", result.stats.repaired_blocks);
    }
    if let Some(reason) = &result.degraded {
        println!("Degraded:       {reason}");
    }
    println!("Elapsed:        {:?}", result.duration);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use docweave_testkit::TempFiles;

    #[derive(Parser)]
    struct LimitsOnly {
        #[command(flatten)]
        limits: LimitArgs,
    }

    fn api(token: Option<&str>, app_id: Option<&str>, app_secret: Option<&str>) -> ApiArgs {
        ApiArgs {
            base_url: "https://api.example.com".into(),
            app_id: app_id.map(String::from),
            app_secret: app_secret.map(String::from),
            token: token.map(String::from),
            timeout_secs: 20,
        }
    }

    fn client() -> Arc<ReqwestClient> {
        Arc::new(ReqwestClient::new(Duration::from_secs(1)).unwrap())
    }

    #[test]
    fn default_limits_match_engine_defaults() {
        let parsed = LimitsOnly::try_parse_from(["limits"]).unwrap();
        let options = parsed.limits.to_options();
        let defaults = SyncOptions::default();
        assert_eq!(options.max_chars, defaults.max_chars);
        assert_eq!(options.max_batch_size, defaults.max_batch_size);
        assert_eq!(options.max_total_blocks, defaults.max_total_blocks);
        assert_eq!(options.retry, defaults.retry);
        assert_eq!(options.parent_repair, ParentRepairPolicy::Repair);
    }

    #[test]
    fn limit_flags_map_to_options() {
        let parsed = LimitsOnly::try_parse_from([
            "limits",
            "--batch-size",
            "100",
            "--max-attempts",
            "5",
            "--retry-delay-secs",
            "1",
            "--strict-parents",
        ])
        .unwrap();
        let options = parsed.limits.to_options();
        assert_eq!(options.max_batch_size, 100);
        assert_eq!(options.retry.max_attempts, 5);
        assert_eq!(options.retry.delay, Duration::from_secs(1));
        assert_eq!(options.parent_repair, ParentRepairPolicy::Strict);
    }

    #[test]
    fn container_defaults_to_document() {
        let target = Target {
            document: "doc".into(),
            container: None,
        };
        assert_eq!(target.container_id(), BlockId::new("doc"));
        let nested = Target {
            container: Some("blk".into()),
            ..target
        };
        assert_eq!(nested.container_id(), BlockId::new("blk"));
    }

    #[test]
    fn credential_selection() {
        assert!(matches!(
            api(Some("t"), Some("id"), Some("secret")).credentials(client()),
            Ok(Credentials::Static(_))
        ));
        assert!(matches!(
            api(None, Some("id"), Some("secret")).credentials(client()),
            Ok(Credentials::Tenant(_))
        ));
        assert!(api(None, Some("id"), None).credentials(client()).is_err());
    }

    #[tokio::test]
    async fn static_credentials_yield_token() {
        let credentials = api(Some("t-123"), None, None)
            .credentials(client())
            .unwrap();
        assert_eq!(credentials.token().await.unwrap(), "t-123");
    }

    #[tokio::test]
    async fn memory_sync_succeeds() {
        let files = TempFiles::new();
        let path = files.write("notes.md", "# Notes\n\n- one\n- two\n");
        let target = Target {
            document: "doc".into(),
            container: None,
        };
        let limits = LimitsOnly::try_parse_from(["limits"]).unwrap().limits;

        run(&path, &target, true, &api(None, None, None), &limits)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn memory_sync_rejects_bad_batch_size() {
        let files = TempFiles::new();
        let path = files.write("notes.md", "text");
        let target = Target {
            document: "doc".into(),
            container: None,
        };
        let limits = LimitsOnly::try_parse_from(["limits", "--batch-size", "5000"])
            .unwrap()
            .limits;

        assert!(run(&path, &target, true, &api(None, None, None), &limits)
            .await
            .is_err());
    }
}
