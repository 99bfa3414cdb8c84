//! Application state: the AI gateway and the document stores.
//!
//! Everything the handlers need is carried explicitly in `AppState` and
//! passed down as parameters; there is no ambient auth or store state.
//! The user identity arrives with each request/connection instead.

use tracing::{info, instrument};

use crate::achievements::MemoryAchievementStore;
use crate::config::load_prompt_config_from_env;
use crate::history::MemoryHistoryStore;
use crate::openai::OpenAI;

pub struct AppState {
    pub openai: OpenAI,
    pub history: MemoryHistoryStore,
    pub achievements: MemoryAchievementStore,
}

impl AppState {
    /// Build state from env: load prompt config, init the gateway and the
    /// stores. The gateway is required; there is no local grading fallback,
    /// so a missing key is a startup error rather than a degraded mode.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Result<Self, String> {
        let prompts = load_prompt_config_from_env().unwrap_or_default().prompts;

        let openai = OpenAI::from_env(prompts).ok_or_else(|| {
            "OPENAI_API_KEY not set; the AI gateway is required to start".to_string()
        })?;
        info!(
            target: "codecrafter_backend",
            base_url = %openai.base_url,
            fast_model = %openai.fast_model,
            strong_model = %openai.strong_model,
            "OpenAI gateway enabled."
        );

        Ok(Self {
            openai,
            history: MemoryHistoryStore::new(),
            achievements: MemoryAchievementStore::new(),
        })
    }
}
