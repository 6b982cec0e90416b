use anyhow::Context;
use clap::Parser;

/// Spawn a few cooperative threads, let them take turns, then reap them.
#[derive(Parser, Debug)]
#[command(name = "lwp-demo", version, about = "Cooperative thread walkthrough")]
struct Cli {
    /// Number of worker threads
    #[arg(short, long, default_value_t = 4)]
    threads: usize,

    /// Times each worker prints and yields
    #[arg(short, long, default_value_t = 3)]
    rounds: usize,

    /// Process exit status once every worker is reaped
    #[arg(short, long, default_value_t = 0)]
    exit_code: i32,

    /// Stack size for each worker, e.g. 256KiB or 2M
    #[arg(long, env = "LWP_STACK_SIZE", value_parser = parse_stack_size)]
    stack_size: Option<usize>,
}

fn parse_stack_size(s: &str) -> Result<usize, String> {
    let bytes = parse_size::parse_size(s).map_err(|e| e.to_string())?;
    usize::try_from(bytes).map_err(|e| e.to_string())
}

fn worker(rounds: usize) -> i32 {
    let tid = lwp::gettid().unwrap_or(lwp::NO_THREAD);
    for round in 0..rounds {
        println!("thread {tid} round {round}");
        lwp::yield_now();
    }
    tid as i32
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let mut builder = lwp::LwpConfigBuilder::default();
    if let Some(size) = cli.stack_size {
        builder.stack_size(size);
    }
    lwp::configure(builder.build().context("invalid runtime configuration")?);

    for _ in 0..cli.threads {
        let rounds = cli.rounds;
        lwp::spawn(move || worker(rounds)).context("failed to spawn worker")?;
    }
    log::info!("spawned {} workers", cli.threads);

    lwp::start();
    while let Some((tid, status)) = lwp::wait() {
        println!("thread {tid} exited with {}", status.exit_code());
    }

    lwp::exit(cli.exit_code)
}
