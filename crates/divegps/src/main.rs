//! `divegps` - capture dive-site fixes and send them to an online dive log.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use divegps::cli::{
    ctrl_c_interrupts, run_flow, Cli, Command, ConfigCommand, ListCommand, LocateCommand,
    SendCommand,
};
use divegps::location::{FixedProvider, GpsdProvider, LocationProvider};
use divegps::upload::HttpUploadClient;
use divegps::{
    init_logging, CancelHandle, CaptureOutcome, Config, EventSink, FlowEvent, Session, Storage,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Locate(cmd) => handle_locate(&config, &cmd).await,
        Command::Send(cmd) => handle_send(&config, &cmd).await,
        Command::List(cmd) => handle_list(&config, &cmd),
        Command::Delete(cmd) => handle_delete(&config, cmd.id),
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_storage(config: &Config) -> anyhow::Result<Storage> {
    let path = config.database_path();
    Storage::open(&path).with_context(|| format!("failed to open store at {}", path.display()))
}

fn open_session(config: &Config) -> anyhow::Result<(Session, UnboundedReceiver<FlowEvent>)> {
    let storage = Arc::new(open_storage(config)?);
    let client = Arc::new(HttpUploadClient::new(config.upload.timeout())?);
    let (events, rx) = EventSink::channel();
    let session = Session::new(storage, client, config.upload.clone(), events);
    debug!("Opened {session:?}");
    Ok((session, rx))
}

/// Print events until every sender is gone.
async fn render_events(mut rx: UnboundedReceiver<FlowEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            FlowEvent::Progress { processed, total } => {
                let mut stderr = std::io::stderr();
                let _ = write!(stderr, "\rSending {processed}/{total}");
                if processed == total {
                    let _ = writeln!(stderr);
                }
                let _ = stderr.flush();
            }
            FlowEvent::Notice(notice) => println!("{notice}"),
        }
    }
}

/// Run a flow while rendering its events. Ctrl-C cancels, twice aborts.
async fn run_with_events<F, T>(
    rx: UnboundedReceiver<FlowEvent>,
    cancel: &CancelHandle,
    flow: F,
) -> anyhow::Result<T>
where
    F: Future<Output = divegps::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let renderer = tokio::spawn(render_events(rx));
    let mut interrupts = ctrl_c_interrupts();

    let result = run_flow(flow, cancel, &mut interrupts).await?;
    renderer.await.context("event renderer failed")?;
    Ok(result)
}

async fn handle_locate(config: &Config, cmd: &LocateCommand) -> anyhow::Result<()> {
    let provider: Box<dyn LocationProvider> = match cmd.manual_fix() {
        Some(fix) => Box::new(FixedProvider::new(fix)),
        None => Box::new(GpsdProvider::new(config.location.gpsd_address())),
    };
    let fix_timeout = match cmd.timeout {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => config.location.fix_timeout(),
    };

    let (session, rx) = open_session(config)?;
    let cancel = CancelHandle::new();
    let name = cmd.name.clone();
    let flow = {
        let cancel = cancel.clone();
        async move {
            session
                .capture(name, provider.as_ref(), fix_timeout, &cancel)
                .await
        }
    };

    match run_with_events(rx, &cancel, flow).await? {
        CaptureOutcome::Cancelled => println!("Cancelled."),
        CaptureOutcome::Sent(record) => debug!("Sent {record}"),
        CaptureOutcome::Saved(record) => debug!("Saved {record}"),
    }
    Ok(())
}

async fn handle_send(config: &Config, cmd: &SendCommand) -> anyhow::Result<()> {
    let (session, rx) = open_session(config)?;
    let cancel = CancelHandle::new();
    let after_upload = cmd.after_upload();
    let flow = {
        let cancel = cancel.clone();
        async move { session.send_pending(after_upload, &cancel).await }
    };

    let report = run_with_events(rx, &cancel, flow).await?;
    if report.cancelled {
        println!(
            "Cancelled, {} location(s) left for the next run.",
            report.total - report.success
        );
    }
    Ok(())
}

fn handle_list(config: &Config, cmd: &ListCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let records = if cmd.pending {
        storage.pending()?
    } else {
        storage.all()?
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No stored locations.");
        return Ok(());
    }

    println!(
        "{:>5}  {:<16}  {:>11}  {:>11}  {:<4}  NAME",
        "ID", "CAPTURED (UTC)", "LATITUDE", "LONGITUDE", "SENT"
    );
    for record in &records {
        println!(
            "{:>5}  {:<16}  {:>11.6}  {:>11.6}  {:<4}  {}",
            record.id.unwrap_or_default(),
            record.datetime().format("%Y-%m-%d %H:%M"),
            record.latitude,
            record.longitude,
            if record.sent { "yes" } else { "no" },
            record.display_name()
        );
    }
    Ok(())
}

fn handle_delete(config: &Config, id: i64) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    if !storage.delete(id)? {
        bail!("no stored location with id {id}");
    }
    println!("Deleted location {id}.");
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let stats = storage.stats()?;
    let upload_ready = config.upload.resolve().is_ok();

    if json {
        let status = serde_json::json!({
            "database_path": config.database_path(),
            "total_records": stats.total_records,
            "pending_records": stats.pending_records,
            "oldest_record": stats.oldest_record,
            "newest_record": stats.newest_record,
            "db_size_bytes": stats.db_size_bytes,
            "upload_configured": upload_ready,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("divegps status");
        println!("--------------");
        println!("Database:      {}", config.database_path().display());
        println!("Size:          {} bytes", stats.db_size_bytes);
        println!("Records:       {}", stats.total_records);
        println!("Pending:       {}", stats.pending_records);
        if let (Some(oldest), Some(newest)) = (stats.oldest_record, stats.newest_record) {
            println!("Oldest:        {}", oldest.format("%Y-%m-%d %H:%M UTC"));
            println!("Newest:        {}", newest.format("%Y-%m-%d %H:%M UTC"));
        }
        println!(
            "Upload:        {}",
            if upload_ready {
                "configured"
            } else {
                "not configured"
            }
        );
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                let unset = "(not set)";
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Upload]");
                println!(
                    "  Destination URL:    {}",
                    config.upload.destination_url.as_deref().unwrap_or(unset)
                );
                println!(
                    "  User id:            {}",
                    config.upload.user_id.as_deref().unwrap_or(unset)
                );
                match config.upload.timeout_secs {
                    Some(secs) => println!("  Timeout (secs):     {secs}"),
                    None => println!("  Timeout (secs):     default"),
                }
                println!();
                println!("[Location]");
                println!("  gpsd:               {}", config.location.gpsd_address());
                println!(
                    "  Fix timeout (secs): {}",
                    config.location.fix_timeout_secs
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
