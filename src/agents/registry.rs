//! Agent Registry
//!
//! Maps agent identifiers to implementations together with the routing data
//! the planner needs (trigger keywords) and the per-agent timeout enforced by
//! the executor. The registry is built once at startup and shared read-only.
//!
//! Registration order is significant: planned agents run in that order.

use crate::agents::telegram::{BotApiChannelFeed, TelegramAgent};
use crate::agents::web::{HttpWebFeed, WebAgent};
use crate::agents::{Agent, DocumentationAgent};
use crate::rag::DocumentRetriever;
use crate::types::{AgentId, AgentInfo, AppError, Result};
use crate::utils::toml_config::CyberSenseConfig;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Default timeout for agents registered without one
pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(30);

/// An agent plus its routing metadata
#[derive(Clone)]
pub struct RegisteredAgent {
    id: AgentId,
    agent: Arc<dyn Agent>,
    triggers: Vec<String>,
    timeout: Duration,
}

impl RegisteredAgent {
    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn agent(&self) -> &Arc<dyn Agent> {
        &self.agent
    }

    /// Lowercased trigger keywords
    pub fn triggers(&self) -> &[String] {
        &self.triggers
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl std::fmt::Debug for RegisteredAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredAgent")
            .field("id", &self.id)
            .field("triggers", &self.triggers)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Immutable registry of the agents available to the executor
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    entries: Vec<RegisteredAgent>,
}

impl AgentRegistry {
    pub fn builder() -> AgentRegistryBuilder {
        AgentRegistryBuilder::new()
    }

    /// Create the registry described by the configuration
    ///
    /// Disabled agents are left out; the documentation agent is always present.
    pub fn from_config(
        config: &CyberSenseConfig,
        retriever: Arc<dyn DocumentRetriever>,
    ) -> Result<Self> {
        let agents = &config.agents;
        let mut builder = AgentRegistryBuilder::new().with_agent(
            Arc::new(DocumentationAgent::new(retriever)),
            Vec::new(),
            Duration::from_secs(agents.documentation.timeout_secs),
        );

        if agents.web.enabled {
            let timeout = Duration::from_secs(agents.web.timeout_secs);
            let feed = HttpWebFeed::new(timeout)?;
            builder = builder.with_agent(
                Arc::new(WebAgent::new(Arc::new(feed), agents.web.sources.clone())),
                agents.web.triggers.clone(),
                timeout,
            );
        }

        if agents.telegram.enabled {
            let telegram = &agents.telegram;
            let timeout = Duration::from_secs(telegram.timeout_secs);
            let token = telegram.bot_token();
            if token.is_none() {
                warn!(
                    "{} is not set; the telegram agent will report its source as unavailable",
                    telegram.bot_token_env
                );
            }
            let feed = BotApiChannelFeed::new(&telegram.api_base, token, timeout)?;
            builder = builder.with_agent(
                Arc::new(TelegramAgent::new(
                    Arc::new(feed),
                    telegram.channels.clone(),
                    telegram.message_limit,
                )),
                telegram.triggers.clone(),
                timeout,
            );
        }

        let registry = builder.build()?;
        info!("Agent registry ready: {:?}", registry.ids());
        Ok(registry)
    }

    pub fn get(&self, id: &AgentId) -> Option<&RegisteredAgent> {
        self.entries.iter().find(|entry| &entry.id == id)
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.get(id).is_some()
    }

    /// All identifiers in registration order
    pub fn ids(&self) -> Vec<AgentId> {
        self.entries.iter().map(|entry| entry.id.clone()).collect()
    }

    /// Agents eligible for planning, in registration order
    pub fn fan_out(&self) -> impl Iterator<Item = &RegisteredAgent> {
        self.entries.iter().filter(|entry| !entry.id.is_documentation())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredAgent> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Listing used by the HTTP API and the CLI
    pub fn infos(&self) -> Vec<AgentInfo> {
        self.entries
            .iter()
            .map(|entry| AgentInfo {
                id: entry.id.clone(),
                description: entry.agent.description(),
                triggers: entry.triggers.clone(),
                timeout_secs: entry.timeout.as_secs(),
            })
            .collect()
    }
}

/// Builder for creating AgentRegistry with fluent API
pub struct AgentRegistryBuilder {
    entries: Vec<RegisteredAgent>,
}

impl AgentRegistryBuilder {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add an agent with its trigger keywords and timeout
    pub fn with_agent(
        mut self,
        agent: Arc<dyn Agent>,
        triggers: Vec<String>,
        timeout: Duration,
    ) -> Self {
        let triggers = triggers
            .into_iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        self.entries.push(RegisteredAgent {
            id: agent.id(),
            agent,
            triggers,
            timeout,
        });
        self
    }

    /// Add an agent with no triggers and the default timeout
    pub fn with_default_agent(self, agent: Arc<dyn Agent>) -> Self {
        self.with_agent(agent, Vec::new(), DEFAULT_AGENT_TIMEOUT)
    }

    /// Build the AgentRegistry
    pub fn build(self) -> Result<AgentRegistry> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.id.clone()) {
                return Err(AppError::Configuration(format!(
                    "Agent '{}' is registered more than once",
                    entry.id
                )));
            }
            if entry.timeout.is_zero() {
                return Err(AppError::Configuration(format!(
                    "Agent '{}' needs a timeout greater than zero",
                    entry.id
                )));
            }
        }

        if !seen.contains(&AgentId::documentation()) {
            return Err(AppError::Configuration(
                "The documentation agent is required".into(),
            ));
        }

        Ok(AgentRegistry {
            entries: self.entries,
        })
    }
}

impl Default for AgentRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentRequest;
    use crate::rag::Retrieval;
    use crate::types::AgentResponse;
    use async_trait::async_trait;

    struct NamedAgent(&'static str);

    #[async_trait]
    impl Agent for NamedAgent {
        fn id(&self) -> AgentId {
            AgentId::new(self.0)
        }

        fn description(&self) -> String {
            format!("{} agent", self.0)
        }

        async fn invoke(&self, _request: &AgentRequest) -> AgentResponse {
            AgentResponse::success(self.id(), Vec::new(), "")
        }
    }

    struct EmptyRetriever;

    #[async_trait]
    impl DocumentRetriever for EmptyRetriever {
        async fn retrieve(&self, _query: &str) -> Result<Retrieval> {
            Ok(Retrieval {
                text: String::new(),
                confidence: 0.0,
            })
        }
    }

    #[test]
    fn test_build_requires_documentation() {
        let result = AgentRegistry::builder()
            .with_default_agent(Arc::new(NamedAgent("web")))
            .build();
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_build_rejects_duplicates() {
        let result = AgentRegistry::builder()
            .with_default_agent(Arc::new(NamedAgent("documentation")))
            .with_default_agent(Arc::new(NamedAgent("web")))
            .with_default_agent(Arc::new(NamedAgent("web")))
            .build();
        assert!(matches!(result, Err(AppError::Configuration(msg)) if msg.contains("web")));
    }

    #[test]
    fn test_build_rejects_zero_timeout() {
        let result = AgentRegistry::builder()
            .with_agent(Arc::new(NamedAgent("documentation")), vec![], Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_registration_order_and_triggers() {
        let registry = AgentRegistry::builder()
            .with_default_agent(Arc::new(NamedAgent("documentation")))
            .with_agent(
                Arc::new(NamedAgent("telegram")),
                vec![" Channel ".into(), "".into()],
                Duration::from_secs(5),
            )
            .with_default_agent(Arc::new(NamedAgent("web")))
            .build()
            .unwrap();

        assert_eq!(
            registry.ids(),
            vec![
                AgentId::new("documentation"),
                AgentId::new("telegram"),
                AgentId::new("web")
            ]
        );
        let fan_out: Vec<&AgentId> = registry.fan_out().map(|e| e.id()).collect();
        assert_eq!(fan_out, vec![&AgentId::new("telegram"), &AgentId::new("web")]);

        let telegram = registry.get(&AgentId::new("telegram")).unwrap();
        assert_eq!(telegram.triggers(), ["channel".to_string()]);
        assert_eq!(telegram.timeout(), Duration::from_secs(5));
        assert!(!registry.contains(&AgentId::new("darkweb")));
    }

    #[test]
    fn test_from_config_respects_enabled_flags() {
        let mut config = CyberSenseConfig::default();
        config.agents.telegram.enabled = false;

        let registry = AgentRegistry::from_config(&config, Arc::new(EmptyRetriever)).unwrap();
        assert_eq!(
            registry.ids(),
            vec![AgentId::documentation(), AgentId::new("web")]
        );

        let infos = registry.infos();
        assert_eq!(infos[1].timeout_secs, 30);
        assert!(infos[1].triggers.contains(&"cve".to_string()));
    }
}
