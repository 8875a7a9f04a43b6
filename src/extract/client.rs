//! Extraction client for the vision-language service.
//!
//! Wraps the three extraction tasks behind a uniform three-tier availability
//! contract: live when a plausible credential is present, simulated when it
//! is not, and a configurable policy for live calls that fail.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::gemini::GeminiTransport;
use super::parse::{
    match_defect_category, parse_factory_details, parse_oc_details, FactoryDetails, OcDetails,
    DEFECT_CATEGORIES,
};
use super::{simulate, ExtractError};
use crate::models::ImagePayload;

/// Shortest credential the client will attempt a live call with.
pub const MIN_CREDENTIAL_LEN: usize = 8;

/// Returned when the model produces no usable description text.
pub const DEFAULT_DESCRIPTION: &str = "No description generated.";

/// Prompt for the free-text defect description task.
pub const DEFECT_ANALYSIS_PROMPT: &str = "Analyze this defective electronic panel image and provide a professional, technical \
     \"Defect Description\" for an RMA claim. Focus on visible patterns, cracks, \
     discolorations, or structural failures. Keep it concise. Current user notes: {notes}";

/// Prompt for the OC serial label extraction task.
pub const OC_LABEL_PROMPT: &str = "Look at this panel label image and extract the following 4 specific values:\n\
     1. The primary OC Serial Number. This is typically a long alphanumeric string near a \
     barcode or QR code (e.g., 'TA5144...', '1500258...', '0MF2L9...').\n\
     2. The W/C (Week/Cycle), usually a 4-digit code (e.g., '2505').\n\
     3. The Model P/N (Panel Part No). Examples: 'ST3151A07-2', 'CV500U5-L04', 'V430DJ2-Q01'.\n\
     4. The Ver. (Version or Revision). Examples: 'Ver.2.9', 'Rev: 02', 'P2'.\n\
     Return ONLY a valid JSON object with keys: ocSerialNumber, wc, modelPN, ver.";

/// Prompt for the factory batch label extraction task.
pub const FACTORY_LABEL_PROMPT: &str = "Look at this factory label image:\n\
     1. Find the ODF Number or P/O Number. It is usually a string like 'TS2501-291' or 'IDL2507002'.\n\
     2. Identify the Screen Size. Look for model codes like 'CX320...', 'LVU430...'. The digits \
     after the prefix (like '32' in 'CX320') indicate the size.\n\
     3. Find the Expressluck BOM. It is a specific alphanumeric string, often located at the \
     bottom of the label, e.g., '2300132VA1Z01510'.\n\
     Return the results as a JSON object with 'odf', 'size', and 'bom' keys.";

/// What to do when the live tier is unavailable or fails.
///
/// Selected once at startup and injected into the client; never decided per
/// call site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Never simulate; missing credential and live failures are errors.
    LiveOnly,
    /// Simulate only when no credential is configured; live failures surface.
    #[default]
    SimulateOnMissingCredential,
    /// Simulate on missing credential and on any live failure.
    SimulateOnAnyFailure,
}

/// Configuration for the extraction client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// API credential. Usually supplied via the GEMINI_API_KEY environment
    /// variable rather than the config file.
    #[serde(default)]
    pub api_key: String,
    /// Service base URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Vision-capable model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Degraded-mode behavior.
    #[serde(default)]
    pub policy: FallbackPolicy,
    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Artificial delay for the simulated tier, in milliseconds.
    #[serde(default = "default_simulate_delay_ms")]
    pub simulate_delay_ms: u64,
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_model() -> String {
    "gemini-3-flash-preview".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_simulate_delay_ms() -> u64 {
    900
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_endpoint(),
            model: default_model(),
            policy: FallbackPolicy::default(),
            timeout_secs: default_timeout_secs(),
            simulate_delay_ms: default_simulate_delay_ms(),
        }
    }
}

impl ExtractionConfig {
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = key.to_string();
        self
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Whether the credential looks valid enough to attempt a live call.
    pub fn has_credential(&self) -> bool {
        self.api_key.trim().len() >= MIN_CREDENTIAL_LEN
    }
}

/// Client for the three extraction operations.
pub struct ExtractionClient {
    config: ExtractionConfig,
    transport: GeminiTransport,
}

impl ExtractionClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ExtractionConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        let transport = GeminiTransport::new(
            http,
            config.endpoint.clone(),
            config.model.clone(),
            config.api_key.clone(),
        );
        Self { config, transport }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Tier selection for the no-credential case.
    fn degraded_allowed(&self) -> Result<(), ExtractError> {
        match self.config.policy {
            FallbackPolicy::LiveOnly => Err(ExtractError::MissingCredential),
            _ => Ok(()),
        }
    }

    /// Whether a failed live call falls back to simulation.
    fn simulate_after_failure(&self) -> bool {
        self.config.policy == FallbackPolicy::SimulateOnAnyFailure
    }

    /// Free-text professional defect description, conditioned on the user's
    /// existing notes. Raw text is accepted as-is, trimmed.
    pub async fn analyze_defect(
        &self,
        image: &ImagePayload,
        existing_notes: &str,
    ) -> Result<String, ExtractError> {
        if !self.config.has_credential() {
            self.degraded_allowed()?;
            debug!("No credential configured; simulating defect analysis");
            return Ok(simulate::defect_description(self.config.simulate_delay_ms).await);
        }

        let prompt = DEFECT_ANALYSIS_PROMPT.replace("{notes}", existing_notes);
        match self.transport.generate(image, &prompt, None).await {
            Ok(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    Ok(DEFAULT_DESCRIPTION.to_string())
                } else {
                    Ok(trimmed.to_string())
                }
            }
            Err(e) if self.simulate_after_failure() => {
                warn!("Defect analysis failed ({}); falling back to simulation", e);
                Ok(simulate::defect_description(self.config.simulate_delay_ms).await)
            }
            Err(e) => Err(e),
        }
    }

    /// Closed-set defect classification.
    ///
    /// Always resolves to a member of the eight-category set; an unparseable
    /// live response is matched by containment and falls back to the default
    /// category rather than erroring.
    pub async fn detect_defect_category(
        &self,
        image: &ImagePayload,
    ) -> Result<String, ExtractError> {
        if !self.config.has_credential() {
            self.degraded_allowed()?;
            debug!("No credential configured; simulating defect classification");
            return Ok(simulate::defect_category(self.config.simulate_delay_ms).await);
        }

        let prompt = format!(
            "Look at this electronic display defect. Categorize it into EXACTLY ONE of the \
             following types: {}. If it doesn't clearly fit one, choose the closest match or \
             \"Abnormal Display\". Return ONLY the category name string.",
            DEFECT_CATEGORIES.join(", ")
        );

        match self.transport.generate(image, &prompt, None).await {
            Ok(text) => Ok(match_defect_category(&text).to_string()),
            Err(e) if self.simulate_after_failure() => {
                warn!("Defect classification failed ({}); falling back to simulation", e);
                Ok(simulate::defect_category(self.config.simulate_delay_ms).await)
            }
            Err(e) => Err(e),
        }
    }

    /// Structured extraction from an OC serial label.
    pub async fn extract_oc_details(
        &self,
        image: &ImagePayload,
    ) -> Result<OcDetails, ExtractError> {
        if !self.config.has_credential() {
            self.degraded_allowed()?;
            debug!("No credential configured; simulating OC label extraction");
            return Ok(simulate::oc_details(self.config.simulate_delay_ms).await);
        }

        let schema = json!({
            "type": "OBJECT",
            "properties": {
                "ocSerialNumber": { "type": "STRING", "description": "The extracted OC Serial Number" },
                "wc": { "type": "STRING", "description": "The extracted Week/Cycle code" },
                "modelPN": { "type": "STRING", "description": "The extracted Model P/N" },
                "ver": { "type": "STRING", "description": "The extracted Version/Revision code" }
            },
            "required": ["ocSerialNumber", "wc", "modelPN", "ver"]
        });

        match self
            .transport
            .generate(image, OC_LABEL_PROMPT, Some(schema))
            .await
        {
            Ok(text) => Ok(parse_oc_details(&text)),
            Err(e) if self.simulate_after_failure() => {
                warn!("OC label extraction failed ({}); falling back to simulation", e);
                Ok(simulate::oc_details(self.config.simulate_delay_ms).await)
            }
            Err(e) => Err(e),
        }
    }

    /// Structured extraction from a factory batch label.
    pub async fn extract_factory_details(
        &self,
        image: &ImagePayload,
    ) -> Result<FactoryDetails, ExtractError> {
        if !self.config.has_credential() {
            self.degraded_allowed()?;
            debug!("No credential configured; simulating factory label extraction");
            return Ok(simulate::factory_details(self.config.simulate_delay_ms).await);
        }

        let schema = json!({
            "type": "OBJECT",
            "properties": {
                "odf": { "type": "STRING", "description": "The extracted ODF/P/O Number" },
                "size": { "type": "STRING", "description": "The extracted screen size (e.g., '32\"')" },
                "bom": { "type": "STRING", "description": "The extracted Expressluck BOM string" }
            },
            "required": ["odf", "size", "bom"]
        });

        match self
            .transport
            .generate(image, FACTORY_LABEL_PROMPT, Some(schema))
            .await
        {
            Ok(text) => Ok(parse_factory_details(&text)),
            Err(e) if self.simulate_after_failure() => {
                warn!("Factory label extraction failed ({}); falling back to simulation", e);
                Ok(simulate::factory_details(self.config.simulate_delay_ms).await)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_image() -> ImagePayload {
        ImagePayload::new("image/jpeg", b"\xff\xd8\xff\xe0test")
    }

    fn client(policy: FallbackPolicy, api_key: &str) -> ExtractionClient {
        ExtractionClient::new(ExtractionConfig {
            api_key: api_key.to_string(),
            simulate_delay_ms: 0,
            policy,
            ..ExtractionConfig::default()
        })
    }

    #[test]
    fn test_credential_sanity_threshold() {
        let config = ExtractionConfig::default();
        assert!(!config.has_credential());
        assert!(!config.with_api_key("short").has_credential());
        let config = ExtractionConfig::default().with_api_key("AIzaSyExampleKey123");
        assert!(config.has_credential());
    }

    #[tokio::test]
    async fn test_missing_credential_simulates_under_default_policy() {
        let client = client(FallbackPolicy::SimulateOnMissingCredential, "");

        let category = client.detect_defect_category(&test_image()).await.unwrap();
        assert!(DEFECT_CATEGORIES.contains(&category.as_str()));

        let oc = client.extract_oc_details(&test_image()).await.unwrap();
        assert!(!oc.oc_serial_number.is_empty());

        let factory = client.extract_factory_details(&test_image()).await.unwrap();
        assert!(!factory.odf.is_empty());

        let description = client.analyze_defect(&test_image(), "").await.unwrap();
        assert!(!description.is_empty());
    }

    #[tokio::test]
    async fn test_missing_credential_errors_under_live_only() {
        let client = client(FallbackPolicy::LiveOnly, "");
        let err = client
            .detect_defect_category(&test_image())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::MissingCredential));
    }

    #[tokio::test]
    async fn test_live_failure_surfaces_under_default_policy() {
        // Plausible credential but an unreachable endpoint: the live attempt
        // fails and the default policy propagates rather than simulating.
        let mut config = ExtractionConfig::default().with_api_key("AIzaSyExampleKey123");
        config.endpoint = "http://127.0.0.1:1".to_string();
        config.timeout_secs = 2;
        config.simulate_delay_ms = 0;
        let client = ExtractionClient::new(config);

        let err = client
            .extract_factory_details(&test_image())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Service(_)));
    }

    #[tokio::test]
    async fn test_live_failure_simulates_under_permissive_policy() {
        let mut config = ExtractionConfig::default()
            .with_api_key("AIzaSyExampleKey123")
            .with_policy(FallbackPolicy::SimulateOnAnyFailure);
        config.endpoint = "http://127.0.0.1:1".to_string();
        config.timeout_secs = 2;
        config.simulate_delay_ms = 0;
        let client = ExtractionClient::new(config);

        let factory = client.extract_factory_details(&test_image()).await.unwrap();
        assert!(!factory.bom.is_empty());
    }
}
