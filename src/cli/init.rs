//! Init command implementation
//!
//! Scaffolds a CyberSense working directory: configuration, an environment
//! template and a starter knowledge-base document.

use super::output::Output;
use crate::utils::toml_config::CyberSenseConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
#[derive(Debug, PartialEq, Eq)]
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// Project already exists (cybersense.toml found)
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// Host address for the server
    pub host: String,
    /// Port for the server
    pub port: u16,
}

pub const CONFIG_FILE: &str = "cybersense.toml";

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing CyberSense");

    let base_path = &config.path;
    let config_path = base_path.join(CONFIG_FILE);
    if config_path.exists() && !config.force {
        output.warning(&format!("{} already exists!", CONFIG_FILE));
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    let settings = default_settings(&config);

    output.subheader("Creating directories");
    let docs_dir = base_path.join(&settings.rag.documents_dir);
    if docs_dir.exists() {
        output.skipped(&settings.rag.documents_dir.display().to_string(), "already exists");
    } else {
        if let Err(e) = fs::create_dir_all(&docs_dir) {
            output.error(&format!("Failed to create {}: {}", docs_dir.display(), e));
            return InitResult::Error(e.to_string());
        }
        output.created_dir(&settings.rag.documents_dir.display().to_string());
    }

    output.subheader("Creating configuration files");
    let toml_content = match settings.to_toml_string() {
        Ok(content) => content,
        Err(e) => {
            output.error(&format!("Failed to render configuration: {}", e));
            return InitResult::Error(e.to_string());
        }
    };
    let files = [
        (config_path, toml_content, "config"),
        (base_path.join(".env.example"), generate_env_example(), "env"),
        (docs_dir.join("incident-response.md"), generate_starter_doc(), "document"),
    ];
    for (path, content, kind) in &files {
        if let Err(e) = write_file(path, content, config.force) {
            output.error(&format!("Failed to create {}: {}", path.display(), e));
            return InitResult::Error(e.to_string());
        }
        output.created(kind, &path.display().to_string());
    }

    let gitignore_path = base_path.join(".gitignore");
    if !gitignore_path.exists() {
        if let Err(e) = write_file(&gitignore_path, ".env\ntarget/\n", false) {
            output.warning(&format!("Failed to create .gitignore: {}", e));
        } else {
            output.created("file", ".gitignore");
        }
    }

    output.complete("CyberSense initialized successfully!");

    output.header("Next Steps");
    output.newline();
    output.info("1. Optionally set a Telegram bot token:");
    output.command("cp .env.example .env");
    output.newline();
    output.info("2. Add markdown or text documents to the knowledge base:");
    output.command(&format!("cp my-notes.md {}", settings.rag.documents_dir.display()));
    output.newline();
    output.info("3. Ask a question or start the server:");
    output.command("cybersense-server ask \"What CVE vulnerabilities affect Apache?\"");
    output.command("cybersense-server serve");

    InitResult::Success
}

fn default_settings(config: &InitConfig) -> CyberSenseConfig {
    let mut settings = CyberSenseConfig::default();
    settings.server.host = config.host.clone();
    settings.server.port = config.port;
    settings
}

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(());
    }
    fs::write(path, content)
}

fn generate_env_example() -> String {
    r#"# CyberSense environment
# Copy to .env and fill in the values you need.

# Telegram Bot API token used by the telegram agent (optional)
TELEGRAM_BOT_TOKEN=

# Log filter, overrides server.log_level
RUST_LOG=info
"#
    .to_string()
}

fn generate_starter_doc() -> String {
    r#"# Incident Response Basics

Incident response follows six phases: preparation, identification,
containment, eradication, recovery and lessons learned.

## Vulnerability management

Track every CVE that affects deployed software, rank it by CVSS score and
exploitability, and patch actively exploited vulnerabilities first.

## Ransomware

Keep offline backups, segment networks, and monitor for mass file
encryption. Isolate affected hosts before attempting recovery.
"#
    .to_string()
}
