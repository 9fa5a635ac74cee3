use crate::PingReply;
use parking_lot::Mutex;
use std::net::IpAddr;
use std::time::Duration;

#[derive(Default)]
struct Records {
    sent: u64,
    received: u64,
    rtts: Vec<Duration>,
    min: Option<Duration>,
    max: Option<Duration>,
}

/// Run-wide counters and RTT samples. The lock is held for single updates only.
#[derive(Default)]
pub struct Statistics {
    records: Mutex<Records>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self) {
        self.records.lock().sent += 1;
    }

    pub fn record_reply(&self, reply: &PingReply) {
        self.record_rtt(reply.rtt);
    }

    pub fn record_rtt(&self, rtt: Duration) {
        let mut records = self.records.lock();
        records.received += 1;
        records.rtts.push(rtt);
        records.min = Some(records.min.map_or(rtt, |min| min.min(rtt)));
        records.max = Some(records.max.map_or(rtt, |max| max.max(rtt)));
    }

    pub fn sent(&self) -> u64 {
        self.records.lock().sent
    }

    pub fn received(&self) -> u64 {
        self.records.lock().received
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn summarize(&self, destination: IpAddr) -> Summary {
        let records = self.records.lock();
        let Records { sent, received, ref rtts, min, max } = *records;

        let loss_percent = if sent == 0 {
            0.0
        } else {
            sent.saturating_sub(received) as f64 / sent as f64 * 100.0
        };

        Summary {
            destination,
            sent,
            received,
            loss_percent,
            min: min.unwrap_or_default(),
            max: max.unwrap_or_default(),
            avg: mean(rtts),
            mdev: mean_deviation(rtts),
        }
    }
}

fn mean(rtts: &[Duration]) -> Duration {
    if rtts.is_empty() {
        return Duration::ZERO;
    }
    let total: u128 = rtts.iter().map(Duration::as_nanos).sum();
    let avg = total / rtts.len() as u128;
    Duration::from_nanos(u64::try_from(avg).unwrap_or(u64::MAX))
}

/// Population standard deviation: `sqrt(mean(rtt²) - mean(rtt)²)`, computed in seconds.
#[allow(clippy::cast_precision_loss)]
fn mean_deviation(rtts: &[Duration]) -> Duration {
    if rtts.is_empty() {
        return Duration::ZERO;
    }
    let n = rtts.len() as f64;
    let (sum, sum_squared) = rtts
        .iter()
        .map(Duration::as_secs_f64)
        .fold((0.0, 0.0), |(sum, sum_squared), rtt| (sum + rtt, sum_squared + rtt * rtt));
    let mean = sum / n;
    let variance = (sum_squared / n - mean * mean).max(0.0);
    let mdev = variance.sqrt();
    if mdev.is_finite() {
        Duration::from_secs_f64(mdev)
    } else {
        Duration::ZERO
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    pub destination: IpAddr,
    pub sent: u64,
    pub received: u64,
    pub loss_percent: f64,
    pub min: Duration,
    pub max: Duration,
    pub avg: Duration,
    pub mdev: Duration,
}

fn as_millis_f64(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "--- {} ping statistics ---", self.destination)?;
        writeln!(
            f,
            "{} packets transmitted, {} received, {:.0}% packet loss",
            self.sent, self.received, self.loss_percent
        )?;
        if self.received > 0 {
            writeln!(
                f,
                "rtt min/avg/max/mdev = {:.3}/{:.3}/{:.3}/{:.3} ms",
                as_millis_f64(self.min),
                as_millis_f64(self.avg),
                as_millis_f64(self.max),
                as_millis_f64(self.mdev)
            )?;
        }
        Ok(())
    }
}
