//! coffre: local key custody and field encryption CLI
//!
//! Commands:
//!   init                 - onboard this device, print the 12-word recovery phrase
//!   phrase verify        - check a transcribed phrase without touching the keychain
//!   restore              - reinstall the master key from a recovery phrase
//!   encrypt [<text>|-]   - encrypt a field with the installed master key
//!   decrypt <field>      - decrypt a field produced by `encrypt`
//!   status               - show keystore, onboarding, and identifier state
//!   link show            - print the device-link payload for a new device
//!   config show          - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::{ExposeSecret, SecretString};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

use coffre_core::{CoffreConfig, KeyLineage, KeystoreBackend};
use coffre_crypto::EncryptedField;
use coffre_recovery::{RecoveryService, RestoreOutcome};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "coffre",
    version,
    about = "Local key custody and field encryption",
    long_about = "coffre: keep a master key in the platform keychain, encrypt fields with it, \
                  and recover it from a 12-word phrase"
)]
struct Cli {
    /// Path to coffre.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "COFFRE_CONFIG",
        default_value = "~/.config/coffre/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [logging] level
    #[arg(long, env = "COFFRE_LOG")]
    log: Option<String>,

    /// Log format; overrides [logging] format
    #[arg(long, env = "COFFRE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Onboard this device: issue a recovery phrase and install a master key
    Init,

    /// Recovery phrase utilities
    Phrase {
        #[command(subcommand)]
        action: PhraseAction,
    },

    /// Restore the master key from a recovery phrase
    ///
    /// The phrase is read from the terminal without echo, or from one line
    /// of stdin with --stdin.
    Restore {
        /// Read the phrase from stdin instead of prompting
        #[arg(long)]
        stdin: bool,
    },

    /// Encrypt a field with the installed master key
    Encrypt {
        /// Plaintext; omit or pass "-" to read stdin
        plaintext: Option<String>,
    },

    /// Decrypt a field produced by `coffre encrypt`
    Decrypt {
        /// base64 encrypted field
        field: String,
    },

    /// Show keystore and onboarding state
    Status,

    /// Device link payloads
    Link {
        #[command(subcommand)]
        action: LinkAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum PhraseAction {
    /// Check a phrase's words and checksum; nothing is stored
    Verify {
        /// Read the phrase from stdin instead of prompting
        #[arg(long)]
        stdin: bool,
    },
}

#[derive(Subcommand, Debug)]
enum LinkAction {
    /// Print the JSON payload a new device scans to link to this one
    Show,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = CoffreConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.as_deref().unwrap_or(&config.logging.level);
    let format = cli
        .log_format
        .unwrap_or_else(|| log_format_from_config(&config.logging.format));
    init_logging(level, format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "coffre starting"
    );
    if !config_path.exists() {
        tracing::warn!("config file not found: {}  (using defaults)", config_path.display());
    }

    match cli.command {
        Commands::Init => cmd_init(&config),
        Commands::Phrase { action: PhraseAction::Verify { stdin } } => {
            cmd_phrase_verify(&config, stdin)
        }
        Commands::Restore { stdin } => cmd_restore(&config, stdin),
        Commands::Encrypt { plaintext } => cmd_encrypt(&config, plaintext),
        Commands::Decrypt { field } => cmd_decrypt(&config, field),
        Commands::Status => cmd_status(&config),
        Commands::Link { action: LinkAction::Show } => cmd_link_show(&config),
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so stdout carries only command output.
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn log_format_from_config(format: &str) -> LogFormat {
    LogFormat::from_str(format, true).unwrap_or(LogFormat::Text)
}

/// Expand `~` in path to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            PathBuf::from(home).join(rest)
        }
        None => path.to_path_buf(),
    }
}

fn open_service(config: &CoffreConfig) -> Result<RecoveryService> {
    if config.keystore.backend == KeystoreBackend::Memory {
        eprintln!("warning: memory keystore selected; nothing persists past this command");
    }
    RecoveryService::from_config(config).context("opening secret store")
}

fn read_phrase(from_stdin: bool) -> Result<SecretString> {
    let line = if from_stdin {
        let mut line = String::new();
        std::io::stdin()
            .read_line(&mut line)
            .context("reading recovery phrase from stdin")?;
        line
    } else {
        rpassword::prompt_password("Recovery phrase (12 words): ")
            .context("reading recovery phrase")?
    };
    Ok(SecretString::from(line))
}

/// Drop one trailing line ending, as left by `echo` or a heredoc
fn strip_newline(mut s: String) -> String {
    if s.ends_with('\n') {
        s.pop();
        if s.ends_with('\r') {
            s.pop();
        }
    }
    s
}

fn backend_name(backend: KeystoreBackend) -> &'static str {
    match backend {
        KeystoreBackend::Keyring => "keyring",
        KeystoreBackend::Memory => "memory",
    }
}

fn lineage_name(lineage: KeyLineage) -> &'static str {
    match lineage {
        KeyLineage::Derived => "derived",
        KeyLineage::Independent => "independent",
    }
}

// ── `coffre init` ─────────────────────────────────────────────────────────────

fn cmd_init(config: &CoffreConfig) -> Result<()> {
    let service = open_service(config)?;
    let bundle = service
        .generate_onboarding()
        .context("onboarding failed")?;

    eprintln!("Write these 12 words down, in order, and keep them offline.");
    eprintln!("They are shown once and are the only way to recover this vault.");
    eprintln!();
    for (i, word) in bundle.phrase.words().iter().enumerate() {
        println!("{:>2}. {word}", i + 1);
    }
    eprintln!();
    eprintln!("device: {}", bundle.device_id);
    eprintln!("vault:  {}", bundle.vault_id);
    if service.lineage() == KeyLineage::Independent {
        eprintln!("note: key_lineage = \"independent\"; the phrase alone cannot restore the key");
    }
    Ok(())
}

// ── `coffre phrase verify` ────────────────────────────────────────────────────

fn cmd_phrase_verify(config: &CoffreConfig, from_stdin: bool) -> Result<()> {
    let service = open_service(config)?;
    let phrase = read_phrase(from_stdin)?;
    service
        .verify(phrase.expose_secret())
        .context("recovery phrase rejected")?;
    println!("recovery phrase OK ({})", coffre_crypto::WORDLIST_VERSION);
    Ok(())
}

// ── `coffre restore` ──────────────────────────────────────────────────────────

fn cmd_restore(config: &CoffreConfig, from_stdin: bool) -> Result<()> {
    let service = open_service(config)?;
    let phrase = read_phrase(from_stdin)?;
    let outcome = service
        .restore(phrase.expose_secret())
        .context("restore failed")?;

    match outcome {
        RestoreOutcome::KeyInstalled => println!("master key restored"),
        RestoreOutcome::KeyAlreadyPresent => println!("master key already installed; nothing to do"),
        RestoreOutcome::PhraseVerified => {
            println!("recovery phrase verified");
            println!("key_lineage is \"independent\": link this device to one holding the key");
        }
    }
    Ok(())
}

// ── `coffre encrypt` / `coffre decrypt` ───────────────────────────────────────

fn cmd_encrypt(config: &CoffreConfig, plaintext: Option<String>) -> Result<()> {
    let plaintext = match plaintext.as_deref() {
        Some(text) if text != "-" => text.to_string(),
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading plaintext from stdin")?;
            strip_newline(buf)
        }
    };

    let service = open_service(config)?;
    let field = service
        .cipher()
        .context("loading master key")?
        .encrypt(&plaintext)
        .context("encrypting field")?;
    println!("{field}");
    Ok(())
}

fn cmd_decrypt(config: &CoffreConfig, field: String) -> Result<()> {
    let field = EncryptedField::parse(field.trim()).context("parsing encrypted field")?;
    let service = open_service(config)?;
    let plaintext = service
        .cipher()
        .context("loading master key")?
        .decrypt(&field)
        .context("decrypting field")?;
    println!("{plaintext}");
    Ok(())
}

// ── `coffre status` ───────────────────────────────────────────────────────────

fn cmd_status(config: &CoffreConfig) -> Result<()> {
    let service = open_service(config)?;
    let key_present = service.has_master_key().context("reading master key")?;
    let onboarded = service.is_onboarding_completed()?;
    let device_id = service.device_id()?;
    let vault_id = service.vault_id()?;

    println!("coffre v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "  keystore:      {} (service: {})",
        backend_name(config.keystore.backend),
        config.keystore.service
    );
    println!("  key lineage:   {}", lineage_name(config.recovery.key_lineage));
    println!("  master key:    {}", if key_present { "present" } else { "ABSENT" });
    println!("  onboarded:     {}", if onboarded { "yes" } else { "no" });
    println!(
        "  device id:     {}",
        device_id.map_or_else(|| "-".to_string(), |id| id.to_string())
    );
    println!(
        "  vault id:      {}",
        vault_id.map_or_else(|| "-".to_string(), |id| id.to_string())
    );
    if !key_present {
        println!();
        println!("  Run `coffre init` on a new device or `coffre restore` with your phrase.");
    }
    Ok(())
}

// ── `coffre link show` ────────────────────────────────────────────────────────

fn cmd_link_show(config: &CoffreConfig) -> Result<()> {
    let service = open_service(config)?;
    let link = service.device_link().context("building device link")?;
    println!("{}", link.to_payload()?);
    Ok(())
}

// ── `coffre config show` ──────────────────────────────────────────────────────

fn cmd_config_show(config: &CoffreConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
