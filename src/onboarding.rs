//! API-key onboarding.
//!
//! `AwaitingKey → ValidatingKey → {Complete | Failed}`. A key with the wrong
//! format drops straight back to `AwaitingKey` without touching the network.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{Error, Result};

static API_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-f0-9]{32}$").expect("valid API key regex"));

/// Exactly 32 lowercase hexadecimal characters.
pub fn is_valid_api_key(candidate: &str) -> bool {
    API_KEY_RE.is_match(candidate)
}

/// Trim and validate user input.
pub fn validate_api_key(input: &str) -> Result<String> {
    let key = input.trim();
    if is_valid_api_key(key) {
        Ok(key.to_string())
    } else {
        Err(Error::InvalidApiKey)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnboardingStage {
    AwaitingKey,
    ValidatingKey { candidate: String },
    Complete,
    Failed,
}

/// One user's progress through onboarding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingFlow {
    stage: OnboardingStage,
}

impl Default for OnboardingFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl OnboardingFlow {
    pub fn new() -> Self {
        Self {
            stage: OnboardingStage::AwaitingKey,
        }
    }

    pub fn stage(&self) -> &OnboardingStage {
        &self.stage
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.stage,
            OnboardingStage::Complete | OnboardingStage::Failed
        )
    }

    /// AwaitingKey → ValidatingKey, or back to AwaitingKey on a bad format.
    pub fn receive(&mut self, text: &str) -> Result<String> {
        if self.stage != OnboardingStage::AwaitingKey {
            return Err(Error::InvalidArgument(
                "onboarding is not waiting for a key".to_string(),
            ));
        }

        match validate_api_key(text) {
            Ok(candidate) => {
                self.stage = OnboardingStage::ValidatingKey {
                    candidate: candidate.clone(),
                };
                Ok(candidate)
            }
            Err(err) => {
                debug!("Rejected API key with invalid format");
                Err(err)
            }
        }
    }

    /// ValidatingKey → Complete on HTTP 200, Failed otherwise.
    pub fn resolve(&mut self, probe: &Result<u16>) -> Result<()> {
        if !matches!(self.stage, OnboardingStage::ValidatingKey { .. }) {
            return Err(Error::InvalidArgument(
                "onboarding has no key under validation".to_string(),
            ));
        }

        match probe {
            Ok(200) => {
                self.stage = OnboardingStage::Complete;
                Ok(())
            }
            Ok(status) => {
                self.stage = OnboardingStage::Failed;
                Err(Error::AuthProbe(*status))
            }
            Err(err) => {
                self.stage = OnboardingStage::Failed;
                Err(Error::Network(err.to_string()))
            }
        }
    }
}

/// Active onboarding flows keyed by Telegram user id.
#[derive(Debug, Default)]
pub struct OnboardingStore {
    flows: RwLock<HashMap<u64, OnboardingFlow>>,
}

impl OnboardingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) onboarding for `user_id`.
    pub async fn begin(&self, user_id: u64) {
        self.flows.write().await.insert(user_id, OnboardingFlow::new());
    }

    pub async fn is_awaiting_key(&self, user_id: u64) -> bool {
        self.flows
            .read()
            .await
            .get(&user_id)
            .is_some_and(|f| f.stage == OnboardingStage::AwaitingKey)
    }

    pub async fn stage(&self, user_id: u64) -> Option<OnboardingStage> {
        self.flows
            .read()
            .await
            .get(&user_id)
            .map(|f| f.stage.clone())
    }

    /// Feed a text message into the user's flow. `Ok(None)` when there is no
    /// flow waiting for a key.
    pub async fn receive(&self, user_id: u64, text: &str) -> Result<Option<String>> {
        let mut flows = self.flows.write().await;
        match flows.get_mut(&user_id) {
            Some(flow) if flow.stage == OnboardingStage::AwaitingKey => flow.receive(text).map(Some),
            _ => Ok(None),
        }
    }

    /// Apply the probe result and drop the finished flow. `Ok` means the
    /// flow reached `Complete`; any error leaves it `Failed` and says why.
    pub async fn resolve(&self, user_id: u64, probe: &Result<u16>) -> Result<OnboardingStage> {
        let mut flows = self.flows.write().await;
        let Some(mut flow) = flows.remove(&user_id) else {
            return Err(Error::InvalidArgument(
                "no onboarding flow is validating a key".to_string(),
            ));
        };
        flow.resolve(probe)?;
        Ok(flow.stage)
    }

    pub async fn cancel(&self, user_id: u64) {
        self.flows.write().await.remove(&user_id);
    }
}
