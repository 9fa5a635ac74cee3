use crate::icmp::{
    decode_echo_reply, encode_echo_request, DecodedMessage, EchoProtocol, SequenceNumber, Timestamp,
};
use crate::socket::{IcmpSocket, Socket};
use crate::transport::Transport;
use crate::{PingConfig, PingError, PingReply, PingResult, Statistics, StopSignal, Summary};
use std::io::Write;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

// One reply in flight between receiver and sender; the receiver blocks while it is taken.
const RELAY_SIZE: usize = 1;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum State {
    Idle,
    Running,
    Stopping,
    Stopped,
}

struct ReceiverContext<S> {
    transport: Arc<Transport<S>>,
    statistics: Arc<Statistics>,
    stop_signal: StopSignal,
    relay_tx: mpsc::SyncSender<PingReply>,
    protocol: EchoProtocol,
    identifier: u16,
    match_identifier: bool,
    buffer_size: usize,
}

pub struct PingRunner<S> {
    config: PingConfig,
    states: Vec<State>,
    transport: Arc<Transport<S>>,
    statistics: Arc<Statistics>,
    stop_signal: StopSignal,
}

impl PingRunner<IcmpSocket> {
    /// Opens and configures the ICMP socket. Fails before anything is sent.
    pub fn open(config: PingConfig) -> PingResult<Self> {
        config.validate()?;
        let socket = IcmpSocket::open(
            config.protocol(),
            config.socket_type,
            config.read_timeout,
            config.write_timeout,
        )?;
        socket.set_ttl(config.ttl)?;
        Ok(Self::with_socket(config, socket))
    }
}

impl<S> PingRunner<S>
where
    S: Socket + 'static,
{
    pub fn with_socket(config: PingConfig, socket: S) -> Self {
        let transport = Arc::new(Transport::new(socket, config.write_timeout));
        PingRunner {
            config,
            states: vec![State::Idle],
            transport,
            statistics: Arc::new(Statistics::new()),
            stop_signal: StopSignal::new(),
        }
    }

    pub fn get_states(&self) -> Vec<State> {
        self.states.clone()
    }

    /// Hand this to whoever may end the run early (a signal handler, another thread).
    pub fn stop_signal(&self) -> StopSignal {
        self.stop_signal.clone()
    }

    pub fn summary(&self) -> Summary {
        self.statistics.summarize(self.config.addr)
    }

    /// Runs both loops to completion, writing one line per reply and then the summary to `out`.
    /// On a fatal error the summary is still written before the error is returned.
    pub fn run<W: Write>(&mut self, out: &mut W) -> PingResult<Summary> {
        if self.states.last() != Some(&State::Idle) {
            return Err(PingError::InvalidState("a ping runner can only run once"));
        }
        self.config.validate()?;
        self.states.push(State::Running);
        tracing::debug!(
            "pinging {} with {} bytes of data",
            self.config.addr,
            self.config.payload_size
        );

        let (relay_tx, relay_rx) = mpsc::sync_channel::<PingReply>(RELAY_SIZE);
        let receiver_thread = self.start_receiver_thread(relay_tx);

        let sender_result = self.run_sender(relay_rx, out);
        if let Err(e) = &sender_result {
            tracing::error!("sender stopped: {e}");
        }
        self.stop_signal.stop();
        self.states.push(State::Stopping);

        let receiver_result = match receiver_thread.join() {
            Ok(result) => result,
            Err(_) => Err(PingError::ReceiverPanicked),
        };
        self.states.push(State::Stopped);
        tracing::debug!("ping runner stopped");

        let summary = self.summary();
        writeln!(out)?;
        write!(out, "{summary}")?;
        out.flush()?;

        sender_result.and(receiver_result).map(|()| summary)
    }

    fn start_receiver_thread(
        &self,
        relay_tx: mpsc::SyncSender<PingReply>,
    ) -> JoinHandle<PingResult<()>> {
        let context = ReceiverContext {
            transport: self.transport.clone(),
            statistics: self.statistics.clone(),
            stop_signal: self.stop_signal.clone(),
            relay_tx,
            protocol: self.config.protocol(),
            identifier: self.config.identifier,
            match_identifier: !self.config.socket_type.rewrites_identifier(),
            buffer_size: self.config.receive_buffer_size(),
        };
        std::thread::spawn(move || {
            tracing::trace!("receiver thread start");
            let result = receive_loop(&context);
            if let Err(e) = &result {
                tracing::error!("receiver stopped: {e}");
            }
            context.stop_signal.stop();
            tracing::trace!("receiver thread end");
            result
        })
    }

    fn run_sender<W: Write>(
        &self,
        relay_rx: mpsc::Receiver<PingReply>,
        out: &mut W,
    ) -> PingResult<()> {
        let start = Instant::now();
        // A deadline too far out to be represented never expires.
        let run_deadline = self.config.run_timeout.and_then(|timeout| start.checked_add(timeout));
        let count = self.config.count_limit();

        let mut sequence_number = SequenceNumber::start_value();
        let mut requests_sent: u32 = 0;
        let mut replies_shown: u32 = 0;
        let mut next_send = Some(start);
        let mut linger_deadline: Option<Instant> = None;

        loop {
            if self.stop_signal.is_stopped() {
                tracing::debug!("sender observed stop signal");
                break;
            }
            let now = Instant::now();
            if run_deadline.is_some_and(|deadline| now >= deadline) {
                tracing::debug!("run timeout elapsed");
                break;
            }
            if linger_deadline.is_some_and(|deadline| now >= deadline) {
                tracing::debug!("gave up waiting for outstanding replies");
                break;
            }

            if next_send.is_some_and(|at| now >= at) {
                match self.send_request(sequence_number) {
                    Ok(()) => {
                        sequence_number = sequence_number.next();
                        requests_sent += 1;
                    }
                    Err(e @ PingError::Encode(_)) => return Err(e),
                    Err(e) => tracing::warn!("could not send echo request {sequence_number}: {e}"),
                }
                next_send = next_send.and_then(|at| next_tick(at, self.config.interval, now));
                if count == Some(requests_sent) {
                    next_send = None;
                    linger_deadline = Instant::now().checked_add(self.config.linger);
                }
            }

            let now = Instant::now();
            let wait = [next_send, run_deadline, linger_deadline]
                .into_iter()
                .flatten()
                .map(|deadline| deadline.saturating_duration_since(now))
                .fold(self.config.read_timeout, Duration::min);

            match relay_rx.recv_timeout(wait) {
                Ok(reply) => {
                    writeln!(out, "{reply}")?;
                    replies_shown += 1;
                    if count.is_some_and(|count| replies_shown >= count) {
                        tracing::debug!("received {replies_shown} replies");
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::debug!("receiver is gone");
                    break;
                }
            }
        }
        Ok(())
    }

    fn send_request(&self, sequence_number: SequenceNumber) -> PingResult<()> {
        let package = encode_echo_request(
            self.config.protocol(),
            self.config.identifier,
            sequence_number,
            self.config.payload_size,
        )?;
        self.transport.send_to(&package, self.config.addr)?;
        self.statistics.record_sent();
        tracing::trace!("echo request {sequence_number} sent to {}", self.config.addr);
        Ok(())
    }
}

/// First tick after `now` on the grid `tick + k * interval`; `None` once the grid runs past what
/// an `Instant` can hold.
fn next_tick(mut tick: Instant, interval: Duration, now: Instant) -> Option<Instant> {
    while tick <= now {
        tick = tick.checked_add(interval)?;
    }
    Some(tick)
}

fn receive_loop<S>(context: &ReceiverContext<S>) -> PingResult<()>
where
    S: Socket + 'static,
{
    let mut buf = vec![0u8; context.buffer_size];
    // The read deadline bounds each iteration, so the stop signal is seen promptly.
    while !context.stop_signal.is_stopped() {
        let Some((n, source, ttl)) = context.transport.try_receive(&mut buf)? else {
            continue;
        };
        let received_at = Timestamp::now();
        match decode_echo_reply(&buf[..n], context.protocol, source, ttl, received_at)? {
            DecodedMessage::Other { icmp_type, icmp_code } => {
                tracing::trace!("skipping ICMP type {icmp_type} code {icmp_code} from {source}");
            }
            DecodedMessage::EchoReply(reply)
                if context.match_identifier && reply.identifier != context.identifier =>
            {
                tracing::trace!("skipping echo reply for identifier {}", reply.identifier);
            }
            DecodedMessage::EchoReply(reply) => {
                tracing::trace!("echo reply {} received from {source}", reply.sequence_number);
                context.statistics.record_reply(&reply);
                if context.relay_tx.send(reply).is_err() {
                    tracing::debug!("sender is gone");
                    break;
                }
            }
        }
    }
    Ok(())
}
