use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use wavewatch::config::MonitorConfig;
use wavewatch::dispatch::{Dispatcher, MessageTemplates};
use wavewatch::escalation::EscalationTracker;
use wavewatch::poller::EventPoller;
use wavewatch::session::MonitorSession;
use wavewatch::sink::JsonlSink;
use wavewatch::source::{ConnectionManager, NumericLineAnalyzer, TcpTransport};
use wavewatch_adapters::bmkg::BmkgClient;
use wavewatch_adapters::sms::SmsSender;
use wavewatch_adapters::twilio::TwilioClient;
use wavewatch_adapters::whatsapp::WhatsAppSender;
use wavewatch_types::{Channel, SourceKind};

#[derive(Parser, Debug)]
#[command(name = "wavewatch")]
#[command(about = "Coastal wave monitoring with tsunami escalation alerts")]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "wavewatch.json")]
    config: PathBuf,

    /// Override the reading feed descriptor (host:port)
    #[arg(long)]
    stream: Option<String>,

    /// Override the location label stamped into alerts
    #[arg(long)]
    location: Option<String>,

    /// Override the observation log path
    #[arg(long)]
    log_path: Option<PathBuf>,

    /// Run only the earthquake poller
    #[arg(long, conflicts_with = "stream_only")]
    poll_only: bool,

    /// Run only the stream monitor
    #[arg(long)]
    stream_only: bool,

    /// Print the merged configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wavewatch=info")),
        )
        .init();

    let args = Args::parse();
    let mut cfg = MonitorConfig::load(&args.config)?;
    if let Some(stream) = args.stream {
        cfg.stream_url = stream;
    }
    if let Some(location) = args.location {
        cfg.location = location;
    }
    if let Some(log_path) = args.log_path {
        cfg.log_path = log_path;
    }

    if args.print_config {
        println!("{}", cfg.export()?);
        return Ok(());
    }

    let dispatcher = Arc::new(build_dispatcher(&cfg));
    // A channel disabled at the transport level stays out of cooldown
    // bookkeeping too.
    let mut policy = cfg.escalation_policy();
    for channel in Channel::ALL {
        if !dispatcher.has_channel(channel) {
            policy.channel_mut(channel).enabled = false;
        }
    }
    if policy.enabled_channels().is_empty() {
        warn!("no notification channels available; alerts will only be logged");
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            let _ = stop_tx.send(true);
        }
    });

    let mut tasks = Vec::new();

    let run_stream = !args.poll_only && !cfg.stream_url.is_empty();
    if run_stream {
        let mut session = MonitorSession::new(
            ConnectionManager::new(TcpTransport, cfg.connection_config()),
            NumericLineAnalyzer,
            cfg.wave_scale()?,
            EscalationTracker::new(policy.clone(), SourceKind::Stream, cfg.location.clone()),
            dispatcher.clone(),
            Box::new(JsonlSink::new(cfg.log_path.clone())),
            cfg.gap_policy,
            cfg.idle_backoff(),
        );
        let stop = stop_rx.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(err) = session.run(stop).await {
                error!(error = %err, "monitoring session failed");
            }
        }));
    } else if !args.poll_only {
        warn!("no stream configured, skipping the stream monitor");
    }

    let run_poller = !args.stream_only && cfg.quake.enabled;
    if run_poller {
        let mut poller = EventPoller::new(
            BmkgClient::builder().build(),
            cfg.quake_scale()?,
            EscalationTracker::new(policy, SourceKind::ExternalEvent, cfg.location.clone()),
            dispatcher,
            Box::new(JsonlSink::new(cfg.log_path.clone())),
            cfg.poll_interval(),
        );
        let stop = stop_rx.clone();
        tasks.push(tokio::spawn(async move {
            poller.run(stop).await;
        }));
    }

    if tasks.is_empty() {
        anyhow::bail!("nothing to run: no stream configured and earthquake polling disabled");
    }

    for task in tasks {
        let _ = task.await;
    }
    Ok(())
}

/// Build the dispatcher from configured channels and Twilio credentials.
///
/// Missing credentials disable channels rather than aborting: the monitor
/// still observes and logs.
fn build_dispatcher(cfg: &MonitorConfig) -> Dispatcher {
    let mut dispatcher = Dispatcher::new(MessageTemplates::default());
    if !cfg.whatsapp.enabled && !cfg.sms.enabled {
        return dispatcher;
    }
    let client = match TwilioClient::from_env() {
        Ok(client) => client,
        Err(err) => {
            warn!(error = %err, "Twilio unavailable, notification channels disabled");
            return dispatcher;
        }
    };
    if cfg.whatsapp.enabled {
        match WhatsAppSender::from_env(client.clone()) {
            Ok(sender) => dispatcher.register(Arc::new(sender)),
            Err(err) => warn!(error = %err, "WhatsApp channel disabled"),
        }
    }
    if cfg.sms.enabled {
        match SmsSender::from_env(client) {
            Ok(sender) => dispatcher.register(Arc::new(sender)),
            Err(err) => warn!(error = %err, "SMS channel disabled"),
        }
    }
    dispatcher
}
