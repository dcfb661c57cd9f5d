#[cfg(test)]
use {http_body_util as _, rstest as _, tempfile as _, tokio_test as _, tower as _, tracing_subscriber as _};

#[macro_use]
extern crate tracing;

use std::sync::Arc;

use anyhow::Context;
use peac_gateway::config::ConfHandle;
use peac_gateway::state::AppState;
use peac_gateway::{config, log, make_http_service, tasks};

enum CliAction {
    ShowHelp,
    ConfigInitOnly,
    Run,
}

fn main() -> anyhow::Result<()> {
    run().inspect_err(|error| {
        let boot_stacktrace_path = config::get_data_dir().join("boot.stacktrace");
        if let Err(write_error) = std::fs::write(&boot_stacktrace_path, format!("{error:?}")) {
            eprintln!("Failed to write the boot stacktrace to {boot_stacktrace_path}: {write_error}");
        }
    })
}

fn run() -> anyhow::Result<()> {
    let mut args = std::env::args();
    let executable = args.next().context("executable name is missing from the environment")?;

    let mut config_path = None;
    let mut remaining_args = Vec::new();

    while let Some(arg) = args.next() {
        if arg == "--config-path" {
            config_path = Some(args.next().context("missing value for --config-path")?);
        } else {
            remaining_args.push(arg);
        }
    }

    if let Some(path) = config_path {
        // SAFETY: at this point the program is single-threaded.
        unsafe { std::env::set_var("PEAC_GATEWAY_CONFIG_PATH", &path) };
    }

    let action = match remaining_args.first().map(String::as_str) {
        Some("--config-init-only") => CliAction::ConfigInitOnly,
        None => CliAction::Run,
        Some(_) => CliAction::ShowHelp,
    };

    match action {
        CliAction::ShowHelp => {
            println!(
                r#"HELP:

    Run:
        "{executable}"

    Initialize configuration only (will not override existing configuration):
        "{executable}" --config-init-only

    Options:
        --config-path <CONFIG_PATH>
"#
            );
        }
        CliAction::ConfigInitOnly => {
            let conf_file = config::load_conf_file_or_generate_new()?;
            let conf_file_json = serde_json::to_string_pretty(&conf_file).context("couldn't represent config file as JSON")?;
            println!("{conf_file_json}");
        }
        CliAction::Run => {
            let conf_handle = ConfHandle::init().context("unable to initialize configuration")?;

            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to build the async runtime")?;

            rt.block_on(serve(conf_handle))?;
        }
    }

    Ok(())
}

async fn serve(conf_handle: ConfHandle) -> anyhow::Result<()> {
    let conf = conf_handle.get_conf();

    let _logger_guard = log::init_logging(&conf.log_file).context("failed to initialize logging")?;

    info!(id = %conf.id, hostname = %conf.hostname, bind_address = %conf.bind_address, "Starting up");

    let bind_address = conf.bind_address;
    let state = AppState::new(conf_handle);

    let (shutdown_handle, shutdown_signal) = peac_task::ShutdownHandle::new();
    let _sweep_task = peac_task::spawn_task(tasks::ReplaySweepTask::new(Arc::clone(&state.replay_cache)), shutdown_signal);

    let app = make_http_service(state);

    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("failed to bind to {bind_address}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = build_signals_fut().await;
            shutdown_handle.signal();
        })
        .await
        .context("HTTP server failed")?;

    Ok(())
}

#[cfg(unix)]
async fn build_signals_fut() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate_signal = signal(SignalKind::terminate()).context("failed to create terminate signal stream")?;
    let mut quit_signal = signal(SignalKind::quit()).context("failed to create quit signal stream")?;
    let mut interrupt_signal = signal(SignalKind::interrupt()).context("failed to create interrupt signal stream")?;

    tokio::select! {
        _ = terminate_signal.recv() => {}
        _ = quit_signal.recv() => {}
        _ = interrupt_signal.recv() => {}
    }

    Ok(())
}

#[cfg(not(unix))]
async fn build_signals_fut() -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await.context("CTRL_C signal failed")
}
