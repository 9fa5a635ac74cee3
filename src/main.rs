use echo_ping::icmp::MIN_PAYLOAD_SIZE;
use echo_ping::{resolve, GenericError, PingConfig, PingRunner, SocketType, Ttl};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(argh::FromArgs)]
/// echo-ping - send ICMP ECHO_REQUEST to a host and report round-trip times
struct Args {
    #[argh(option, short = 'c', default = "-1")]
    /// stop after <count> replies, -1 for no limit
    count: i64,

    #[argh(option, short = 'i', default = "Duration::from_secs(1)", from_str_fn(parse_duration))]
    /// time between echo requests, e.g. 500ms
    interval: Duration,

    #[argh(option, short = 't', from_str_fn(parse_duration))]
    /// stop after this much time, e.g. 5s
    timeout: Option<Duration>,

    #[argh(option, short = 's', default = "32")]
    /// payload size in bytes, at least 24
    size: usize,

    #[argh(option, short = 'l', default = "64")]
    /// time to live of outgoing requests
    ttl: u8,

    #[argh(option, short = 'W', default = "Duration::from_secs(1)", from_str_fn(parse_duration))]
    /// how long to wait for outstanding replies after the last request
    linger: Duration,

    #[argh(switch)]
    /// use a raw socket (needs privileges) instead of a datagram ICMP socket
    raw: bool,

    #[argh(switch, short = 'v')]
    /// trace logging on stderr
    verbose: bool,

    #[argh(positional)]
    /// host name or IP address
    host: String,
}

/// Accepts humantime durations such as `250ms`, `2s` or `1m 30s`, or a bare number of seconds.
fn parse_duration(value: &str) -> Result<Duration, String> {
    if let Ok(secs) = value.trim().parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(value).map_err(|e| format!("invalid duration {value:?}: {e}"))
}

fn main() -> Result<(), GenericError> {
    let args: Args = argh::from_env();

    let level = if args.verbose { Level::TRACE } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let addr = resolve(&args.host)?;
    let socket_type = if args.raw { SocketType::Raw } else { SocketType::default() };
    let config = PingConfig::new(addr)
        .with_ttl(Ttl(args.ttl))
        .with_interval(args.interval)
        .with_run_timeout(args.timeout)
        .with_payload_size(args.size)
        .with_count(u32::try_from(args.count).ok())
        .with_linger(args.linger)
        .with_socket_type(socket_type);
    tracing::trace!("{config:?}");

    let mut ping_runner = PingRunner::open(config)?;
    let stop_signal = ping_runner.stop_signal();
    ctrlc::set_handler(move || stop_signal.stop())?;

    println!("PING {} ({addr}) {} bytes of data.", args.host, args.size.max(MIN_PAYLOAD_SIZE));
    let mut stdout = std::io::stdout().lock();
    ping_runner.run(&mut stdout)?;
    Ok(())
}
