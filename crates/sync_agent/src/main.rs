mod args;
mod config;
mod local_channel;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sync_core::skip::{DotGitSkip, GlobSkip, NoneSkip, SkipPredicate};
use sync_core::Orchestrator;
use sync_proto::Mapping;

use crate::args::AgentArgs;
use crate::config::{AgentConfig, SkipConfig};
use crate::local_channel::LocalDirChannel;

/// How often the built-in polling "watcher" re-walks each mapping's local
/// root and re-enqueues every path it finds.
///
/// The core's real watcher source is an explicit non-goal; this stands in
/// for one only so the binary can exercise the engine without an OS-level
/// filesystem event API wired in.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() {
    match std::env::var("RUST_LOG") {
        Ok(_) => (),
        Err(_) => std::env::set_var("RUST_LOG", "info"),
    }

    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&std::env::var("RUST_LOG").expect("RUST_LOG environment variable not set"))
        .init();

    let args = AgentArgs::parse();

    let (mappings, skip_policy, roots): (Vec<Mapping>, SkipConfig, HashMap<String, PathBuf>) =
        match (&args.config, &args.local, &args.remote) {
            (Some(path), _, _) => {
                let config = AgentConfig::load(path).unwrap_or_else(|e| {
                    log::error!("failed to load config: {e}");
                    std::process::exit(1);
                });

                let roots = config
                    .mapping
                    .iter()
                    .map(|m| (m.remote_dest.clone(), m.local_root.clone()))
                    .collect();

                (config.mappings(), config.skip, roots)
            }
            (None, Some(local), Some(remote)) => {
                let mapping = Mapping::new(local.clone(), "default".to_string());
                let mut roots = HashMap::new();
                roots.insert("default".to_string(), remote.clone());
                (vec![mapping], SkipConfig::None, roots)
            }
            _ => {
                log::error!("either --config or both --local and --remote must be given");
                std::process::exit(2);
            }
        };

    let skip: Arc<dyn SkipPredicate> = match skip_policy {
        SkipConfig::None => Arc::new(NoneSkip),
        SkipConfig::DotGit => Arc::new(DotGitSkip),
        SkipConfig::Glob { patterns } => {
            let skip = GlobSkip::new(patterns).unwrap_or_else(|e| {
                log::error!("invalid skip glob pattern: {e}");
                std::process::exit(1);
            });
            log::debug!("skip policy: glob {:?}", skip.patterns());
            Arc::new(skip)
        }
    };

    let channel = LocalDirChannel::new(roots);

    let mut orchestrator = Orchestrator::new(mappings.clone(), channel, skip)
        .with_debounce(args.debounce.into())
        .with_on_complete(|| log::debug!("sync pass complete, event queue drained"));

    if let Err(e) = orchestrator.initial_scan().await {
        log::error!("initial scan failed: {e}");
        std::process::exit(1);
    }

    spawn_poller(&orchestrator, mappings);

    if let Err(e) = orchestrator.run().await {
        log::error!("sync loop terminated: {e}");
        std::process::exit(1);
    }
}

fn spawn_poller<C: sync_proto::RpcChannel + 'static>(
    orchestrator: &Orchestrator<C>,
    mappings: Vec<Mapping>,
) {
    let sender = orchestrator.event_sender();

    std::thread::spawn(move || loop {
        std::thread::sleep(POLL_INTERVAL);

        for mapping in &mappings {
            let paths: Vec<String> = walkdir::WalkDir::new(&mapping.local_root)
                .min_depth(1)
                .into_iter()
                .filter_map(Result::ok)
                .map(|e| e.path().to_string_lossy().into_owned())
                .collect();

            if !paths.is_empty() && sender.send(paths).is_err() {
                return;
            }
        }
    });
}
