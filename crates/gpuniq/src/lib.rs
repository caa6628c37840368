//! GPUniq - Rust client for the GPUniq GPU meta-cloud
//!
//! Browse GPU offers, rent and manage instances, keep data on persistent
//! volumes, run burst orders across providers and call the hosted LLM.
//!
//! # Example
//!
//! ```no_run
//! use gpuniq::{GPUniq, OfferFilters, OrderRequest, Paging, PollOptions, CancellationToken};
//!
//! async fn example() -> gpuniq::Result<()> {
//!     let client = GPUniq::new("gpuniq_your_key_here")?;
//!
//!     let offers = client
//!         .marketplace()
//!         .list(&OfferFilters::new().gpu_models(["RTX_4090"]), None, Paging::default())
//!         .await?;
//!     println!("{}", offers);
//!
//!     let job = client
//!         .marketplace()
//!         .create_order_async(&OrderRequest::new(123).pricing_type("hour"))
//!         .await?;
//!     let done = client
//!         .marketplace()
//!         .wait_for_order(&job.job_id, PollOptions::default(), &CancellationToken::new())
//!         .await?;
//!     println!("order finished as {}", done.status);
//!
//!     let reply = client.llm().chat("openai/gpt-oss-120b", "Hello!").await?;
//!     println!("{}", reply);
//!     Ok(())
//! }
//! ```

use std::time::Duration;

pub mod burst;
pub mod gpu_cloud;
pub mod instances;
pub mod llm;
pub mod marketplace;
pub mod params;
pub mod payments;
pub mod settings;
pub mod volumes;

pub use burst::{Burst, BurstOrder, FallbackGpu};
pub use gpu_cloud::{DeployRequest, GpuCloud, InstanceFilters};
pub use instances::Instances;
pub use llm::{ChatCompletion, ChatMessage, ChatRequest, CommandRequest, Llm, SessionMessage, TokenPackage};
pub use marketplace::{Marketplace, OfferFilters, OrderRequest, SubmittedJob};
pub use params::{Paging, Window};
pub use payments::{PaymentSystem, Payments};
pub use settings::Settings;
pub use volumes::{validate_volume_name, CreateVolume, UpdateVolume, Volumes};

pub use gpuniq_core::{
    CancellationToken, Client, ClientConfig, ClientConfigBuilder, Error, JobPoller, JobSnapshot,
    JobStatus, PollOptions, Result, RetryPolicy, TransferProgress, DEFAULT_BASE_URL,
    DEFAULT_TIMEOUT,
};

/// Deadline of the single-call [`GPUniq::request`]
pub const LEGACY_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// GPUniq platform client.
///
/// Holds an immutable configuration; resource APIs are borrowed views over
/// the same connection pool. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct GPUniq {
    client: Client,
}

/// Name kept for code written against the 1.x client
pub type GPUniqClient = GPUniq;

impl GPUniq {
    /// Client with default settings
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(ClientConfig::new(api_key)?)
    }

    /// Client with a custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            client: Client::new(config)?,
        })
    }

    /// Client configured from `GPUNIQ_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::with_config(ClientConfig::from_env()?)
    }

    /// Underlying request engine, for endpoints without a typed wrapper
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn marketplace(&self) -> Marketplace<'_> {
        Marketplace::new(&self.client)
    }

    pub fn instances(&self) -> Instances<'_> {
        Instances::new(&self.client)
    }

    pub fn volumes(&self) -> Volumes<'_> {
        Volumes::new(&self.client)
    }

    pub fn burst(&self) -> Burst<'_> {
        Burst::new(&self.client)
    }

    pub fn payments(&self) -> Payments<'_> {
        Payments::new(&self.client)
    }

    pub fn settings(&self) -> Settings<'_> {
        Settings::new(&self.client)
    }

    pub fn llm(&self) -> Llm<'_> {
        Llm::new(&self.client)
    }

    pub fn gpu_cloud(&self) -> GpuCloud<'_> {
        GpuCloud::new(&self.client)
    }

    /// One chat completion, returning only the text.
    ///
    /// Prefer [`Llm::chat`] in new code.
    pub async fn request(&self, model: &str, message: &str) -> Result<String> {
        self.request_as(model, message, "user", LEGACY_REQUEST_TIMEOUT)
            .await
    }

    /// [`GPUniq::request`] with an explicit role and deadline
    pub async fn request_as(
        &self,
        model: &str,
        message: &str,
        role: &str,
        timeout: Duration,
    ) -> Result<String> {
        let request = ChatRequest::new(vec![ChatMessage::new(role, message)])
            .model(model)
            .timeout(timeout);
        Ok(self.llm().chat_completion(&request).await?.content)
    }
}

/// Build a client from an API key.
///
/// Equivalent to [`GPUniq::new`]; nothing is stored globally.
pub fn init(api_key: impl Into<String>) -> Result<GPUniq> {
    GPUniq::new(api_key)
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
