mod cli;
mod config;
mod output;

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dirwatch::{Filter, Monitor, Poller};

use cli::{Cli, Commands};
use config::{DirwatchConfig, Engine};
use output::print_batch;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Monitor {
            dirs,
            pattern,
            events,
            duration,
            json,
        } => {
            let mask = config::parse_event_kinds(&events)?;
            let monitor = Monitor::new();
            for dir in &dirs {
                monitor
                    .add_directory(dir, Filter::new("cli", &pattern).with_events(mask))
                    .with_context(|| format!("cannot watch {}", dir.display()))?;
            }
            let _tap = monitor.connect(move |batch| print_batch("monitor", batch, json));
            let _faults = monitor.connect_faults(|fault| {
                eprintln!("worker for {} died: {}", fault.path.display(), fault.error);
            });

            monitor.start();
            run_until(duration, || monitor.stop());
            monitor.join();
        }

        Commands::Poll {
            dirs,
            pattern,
            interval,
            recursive,
            min_size,
            min_age,
            duration,
            json,
        } => {
            let poller = Poller::new();
            let filter = Filter::new("cli", &pattern)
                .with_recursive(recursive)
                .with_min_size(min_size)
                .with_min_age(min_age);
            for dir in &dirs {
                poller
                    .add_directory(dir, filter.clone(), Duration::from_millis(interval))
                    .with_context(|| format!("cannot scan {}", dir.display()))?;
            }
            let _tap = poller.connect(move |batch| print_batch("poll", batch, json));
            let _faults = poller.connect_faults(|fault| {
                eprintln!("worker for {} died: {}", fault.path.display(), fault.error);
            });

            poller.start();
            run_until(duration, || poller.stop());
            poller.join();
        }

        Commands::Watch {
            config,
            duration,
            json,
        } => {
            let watch_list = DirwatchConfig::load(&config);
            ensure!(
                !watch_list.watches.is_empty(),
                "no [[watch]] entries in {}",
                config.display()
            );

            let monitor = Monitor::new();
            let poller = Poller::new();
            let mut monitored = 0usize;
            let mut polled = 0usize;

            for entry in &watch_list.watches {
                let filter = entry.filter()?;
                if matches!(entry.engine, Engine::Monitor | Engine::Both) {
                    monitor
                        .add_directory(&entry.path, filter.clone())
                        .with_context(|| format!("cannot watch {}", entry.path.display()))?;
                    monitored += 1;
                }
                if matches!(entry.engine, Engine::Poll | Engine::Both) {
                    poller
                        .add_directory(&entry.path, filter, entry.interval())
                        .with_context(|| format!("cannot scan {}", entry.path.display()))?;
                    polled += 1;
                }
            }

            let _monitor_tap = monitor.connect(move |batch| print_batch("monitor", batch, json));
            let _poll_tap = poller.connect(move |batch| print_batch("poll", batch, json));
            let _monitor_faults = monitor.connect_faults(|fault| {
                eprintln!(
                    "monitor worker for {} died: {}",
                    fault.path.display(),
                    fault.error
                );
            });
            let _poll_faults = poller.connect_faults(|fault| {
                eprintln!(
                    "poll worker for {} died: {}",
                    fault.path.display(),
                    fault.error
                );
            });

            if monitored > 0 {
                monitor.start();
            }
            if polled > 0 {
                poller.start();
            }
            run_until(duration, || {
                monitor.stop();
                poller.stop();
            });
            monitor.join();
            poller.join();
        }
    }

    Ok(())
}

/// Block on the watchers; with a duration, stop them from a timer thread
/// first so the trailing joins return.
fn run_until(duration: Option<u64>, stop: impl FnOnce() + Send) {
    let Some(seconds) = duration else {
        return;
    };
    thread::scope(|scope| {
        scope.spawn(move || {
            thread::sleep(Duration::from_secs(seconds));
            stop();
        });
    });
}
