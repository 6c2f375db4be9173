use dotenv::dotenv;
use reqwest::Client;
use std::env;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::endpoints::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Provider, DEFAULT_MAX_TOKENS,
    DEFAULT_TEMPERATURE, DEFAULT_TOP_P,
};

#[derive(Debug, Error)]
pub enum ApiConnectionError {
    #[error("API key not found in environment: {0}")]
    MissingApiKey(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("API error {status}: {error_body}")]
    ApiError {
        status: reqwest::StatusCode,
        error_body: String,
    },
    #[error("API returned no content")]
    EmptyResponse,
    #[error("Backend call timed out after {0:?}")]
    Timeout(Duration),
}

impl ApiConnectionError {
    /// Whether another attempt may succeed. Missing credentials and client
    /// errors other than rate limiting are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiConnectionError::MissingApiKey(_) => false,
            ApiConnectionError::SerializationError(_) => false,
            ApiConnectionError::ApiError { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            ApiConnectionError::NetworkError(_)
            | ApiConnectionError::EmptyResponse
            | ApiConnectionError::Timeout(_) => true,
        }
    }
}

impl Provider {
    pub fn openrouter(api_key_env_var_name: &str, url: &str, model: &str) -> Self {
        dotenv().ok();
        Self::OpenRouter {
            api_key: api_key_env_var_name.to_string(),
            url: url.to_string(),
            model: model.to_string(),
            client: Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::OpenRouter { model, .. } => model,
        }
    }

    /// Single-turn request with the planner's sampling settings.
    pub fn user_request(&self, prompt: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model().to_string(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: Some(DEFAULT_TEMPERATURE),
            top_p: Some(DEFAULT_TOP_P),
            max_tokens: Some(DEFAULT_MAX_TOKENS),
        }
    }

    pub async fn call_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ApiConnectionError> {
        match self {
            Provider::OpenRouter {
                api_key: api_key_env_var_name,
                url,
                client,
                ..
            } => {
                dotenv().ok();
                let actual_api_key = env::var(api_key_env_var_name)
                    .map_err(|_| ApiConnectionError::MissingApiKey(api_key_env_var_name.clone()))?;

                let site_url = env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
                let app_name = env::var("APP_NAME").unwrap_or_else(|_| "MealPlanner".to_string());

                debug!(model = %request.model, url = %url, "sending chat completion");
                let response = client
                    .post(url.as_str())
                    .bearer_auth(actual_api_key)
                    .header("HTTP-Referer", site_url)
                    .header("X-Title", app_name)
                    .json(&request)
                    .send()
                    .await?;

                if response.status().is_success() {
                    let chat_response = response.json::<ChatCompletionResponse>().await?;
                    Ok(chat_response)
                } else {
                    let status = response.status();
                    let error_body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Failed to read error body".to_string());
                    Err(ApiConnectionError::ApiError { status, error_body })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(!ApiConnectionError::MissingApiKey("KEY".into()).is_retryable());
        assert!(ApiConnectionError::EmptyResponse.is_retryable());
        assert!(ApiConnectionError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(ApiConnectionError::ApiError {
            status: reqwest::StatusCode::TOO_MANY_REQUESTS,
            error_body: String::new(),
        }
        .is_retryable());
        assert!(ApiConnectionError::ApiError {
            status: reqwest::StatusCode::BAD_GATEWAY,
            error_body: String::new(),
        }
        .is_retryable());
        assert!(!ApiConnectionError::ApiError {
            status: reqwest::StatusCode::UNAUTHORIZED,
            error_body: String::new(),
        }
        .is_retryable());
    }

    #[test]
    fn user_request_uses_provider_model() {
        let provider = Provider::openrouter("SOME_KEY", "http://localhost", "test/model");
        let request = provider.user_request("составь план");
        assert_eq!(request.model, "test/model");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].content, "составь план");
        assert_eq!(request.temperature, Some(DEFAULT_TEMPERATURE));
    }
}
