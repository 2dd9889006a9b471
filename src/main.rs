use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;
use wavstream_core::{ClientConfig, ExchangeError};

#[derive(Parser, Debug)]
#[command(name = "wavstream", about = "Stream a WAV file to a speech recognition service")]
struct Cli {
    /// Path to an optional TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 16 kHz mono 16-bit WAV file to recognize
    #[arg(long)]
    sound_file: PathBuf,

    /// File the "<id> <text>" line is appended to
    #[arg(long)]
    result_file: PathBuf,

    #[arg(long)]
    server_addr: Option<String>,

    #[arg(long)]
    server_port: Option<u16>,

    /// Language tag sent before the audio
    #[arg(long)]
    lang_tag: Option<String>,

    #[arg(long)]
    samples_per_message: Option<usize>,

    /// Delay after each audio message, in seconds
    #[arg(long)]
    seconds_per_message: Option<f64>,

    /// Seconds to wait for the final result after the audio is sent
    #[arg(long)]
    timeout: Option<f64>,

    /// CA bundle used to verify the service (enables wss://)
    #[arg(long)]
    ca_file: Option<PathBuf>,

    /// PEM client certificate, used together with --key-file
    #[arg(long)]
    cert_file: Option<PathBuf>,

    /// PEM client private key in PKCS#8 form ("BEGIN PRIVATE KEY"); convert a
    /// PKCS#1 "BEGIN RSA PRIVATE KEY" file with `openssl pkcs8 -topk8 -nocrypt`
    #[arg(long)]
    key_file: Option<PathBuf>,

    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn load_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load_from_file(path)
                .with_context(|| format!("failed to load config from {:?}", path))?,
            None => ClientConfig::default(),
        };
        self.apply_overrides(&mut config);
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    /// Command-line values win over the config file.
    fn apply_overrides(&self, config: &mut ClientConfig) {
        if let Some(addr) = &self.server_addr {
            config.server.addr = addr.clone();
        }
        if let Some(port) = self.server_port {
            config.server.port = port;
        }
        if let Some(tag) = &self.lang_tag {
            config.server.lang_tag = Some(tag.clone());
        }
        if let Some(n) = self.samples_per_message {
            config.stream.samples_per_message = n;
        }
        if let Some(secs) = self.seconds_per_message {
            config.stream.seconds_per_message = secs;
        }
        if let Some(secs) = self.timeout {
            config.stream.final_result_timeout_secs = secs;
        }
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }

        if self.ca_file.is_some() || self.cert_file.is_some() || self.key_file.is_some() {
            let tls = config.tls.get_or_insert_with(Default::default);
            if let Some(ca) = &self.ca_file {
                tls.ca_file = Some(ca.clone());
            }
            if let Some(cert) = &self.cert_file {
                tls.cert_file = Some(cert.clone());
            }
            if let Some(key) = &self.key_file {
                tls.key_file = Some(key.clone());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    let env_filter =
        EnvFilter::try_new(&config.general.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::Registry::default().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false),
    );

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let id = wavstream_audio::utterance_id(&cli.sound_file);
    let buffer = wavstream_audio::read_wav(&cli.sound_file)
        .with_context(|| format!("failed to read audio from {:?}", cli.sound_file))?;

    let connector = wavstream_transport::WsConnector::from_config(&config)
        .context("failed to set up the connection")?;
    tracing::info!(id = %id, server = %connector.url(), "wavstream starting");

    let client = wavstream_client::StreamClient::from_config(connector, &config)
        .context("invalid stream settings")?;
    let sink = wavstream_destination::FileSink::new(&cli.result_file);

    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    match client.run_until(&id, &buffer, &sink, interrupted).await {
        Ok(result) => {
            tracing::info!(id = %result.id, path = ?sink.path(), "result written");
            Ok(())
        }
        Err(ExchangeError::Cancelled) => {
            tracing::warn!(id = %id, "interrupted, nothing written");
            anyhow::bail!("interrupted")
        }
        Err(e) => Err(e).with_context(|| format!("recognition of '{id}' failed")),
    }
}
