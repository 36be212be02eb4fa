//! The guard every outbound model request passes through.

use screenpilot_core::error::{AiProviderError, Result};
use screenpilot_core::message::AgentMessage;
use screenpilot_core::provider::{
    AiProvider, GenerateObjectRequest, GenerateObjectResponse, GenerateTextRequest,
    GenerateTextResponse,
};
use std::sync::Arc;
use tracing::debug;

use crate::budget::{FamilyRules, ModelFamily, PayloadBudget};
use crate::image::{ImageFetcher, ImageResolver};
use crate::retry::{RetryPolicy, retry};

/// Resolves images, trims the payload for the target model family, and
/// retries transient provider failures.
pub struct TransportGuard {
    resolver: ImageResolver,
    rules: FamilyRules,
    budget: PayloadBudget,
    policy: RetryPolicy,
}

impl TransportGuard {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, cache_capacity: usize) -> Self {
        let policy = RetryPolicy::default();
        Self {
            resolver: ImageResolver::new(fetcher, cache_capacity, policy),
            rules: FamilyRules::default(),
            budget: PayloadBudget::default(),
            policy,
        }
    }

    pub fn with_rules(mut self, rules: FamilyRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_budget(mut self, budget: PayloadBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Retry policy for both image fetches and provider calls.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        let fetcher = self.resolver.fetcher();
        let capacity = self.resolver.capacity();
        self.resolver = ImageResolver::new(fetcher, capacity, policy);
        self.policy = policy;
        self
    }

    pub fn family(&self, model_name: &str) -> ModelFamily {
        self.rules.classify(model_name)
    }

    pub fn resolver(&self) -> &ImageResolver {
        &self.resolver
    }

    /// Apply the family's payload budget and inline URL images.
    ///
    /// Count limits do not depend on image size, so count-bounded payloads
    /// are trimmed first and only the surviving images are fetched. Byte
    /// limits need real sizes and run after resolution.
    pub async fn prepare(
        &self,
        model_name: &str,
        messages: Vec<AgentMessage>,
    ) -> Result<Vec<AgentMessage>> {
        let before = messages.len();
        let family = self.family(model_name);
        let limited = match family {
            ModelFamily::CountBounded => {
                let kept = self.budget.apply(family, messages);
                self.resolver.resolve_messages(kept).await?
            }
            ModelFamily::ByteBounded | ModelFamily::Unrecognized => {
                let resolved = self.resolver.resolve_messages(messages).await?;
                self.budget.apply(family, resolved)
            }
        };
        debug!(
            model = model_name,
            ?family,
            messages_in = before,
            messages_out = limited.len(),
            "Prepared model payload"
        );
        Ok(limited)
    }

    /// `generate_text` with a guarded payload and retry on transient failures.
    pub async fn generate_text(
        &self,
        provider: &dyn AiProvider,
        mut request: GenerateTextRequest,
    ) -> Result<GenerateTextResponse> {
        request.messages = self.prepare(provider.model_name(), request.messages).await?;
        let response = retry(self.policy, AiProviderError::is_retryable, || {
            provider.generate_text(request.clone())
        })
        .await?;
        Ok(response)
    }

    /// `generate_object` with a guarded payload and retry on transient failures.
    pub async fn generate_object(
        &self,
        provider: &dyn AiProvider,
        mut request: GenerateObjectRequest,
    ) -> Result<GenerateObjectResponse> {
        request.messages = self.prepare(provider.model_name(), request.messages).await?;
        let response = retry(self.policy, AiProviderError::is_retryable, || {
            provider.generate_object(request.clone())
        })
        .await?;
        Ok(response)
    }
}
