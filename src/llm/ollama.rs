use crate::llm::client::LLMClient;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage, request::ChatMessageRequest},
};
use std::time::Duration;

pub struct OllamaClient {
    client: Ollama,
    model: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String, timeout: Duration) -> Result<Self> {
        let url = reqwest::Url::parse(&base_url)
            .map_err(|e| AppError::Configuration(format!("Invalid Ollama URL '{}': {}", base_url, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| AppError::Configuration(format!("Ollama URL '{}' has no host", base_url)))?;
        let port = url.port_or_known_default().unwrap_or(11434);

        let client = Ollama::new(format!("{}://{}", url.scheme(), host), port);

        Ok(Self {
            client,
            model,
            timeout,
        })
    }

    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let request = ChatMessageRequest::new(self.model.clone(), messages);

        let response = tokio::time::timeout(self.timeout, self.client.send_chat_messages(request))
            .await
            .map_err(|_| AppError::LLM(format!("Ollama did not answer within {:?}", self.timeout)))?
            .map_err(|e| AppError::LLM(format!("Ollama error: {}", e)))?;

        Ok(response.message.content)
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat(vec![
            ChatMessage::system(system.to_string()),
            ChatMessage::user(prompt.to_string()),
        ])
        .await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
