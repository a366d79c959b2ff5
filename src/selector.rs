use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, trace, warn};

use crate::channel::{Channel, ChannelBuilder};
use crate::clock::Clock;
use crate::config::SelectorConfig;
use crate::epoll::{Epoll, EpollOpt, Evented, Events, Ready, Token};
use crate::error::{Result, SelectorError};
use crate::framing::{Receive, Send};
use crate::idle::IdleTracker;
use crate::metrics::SelectorMetrics;
use crate::net::tcp::{connect_nonblocking, TcpStream};
use crate::registry::{ConnectionId, Registry};
use crate::waker::Waker;

/// Token reserved for the wakeup eventfd; channel tokens come from the
/// registry's slab and never collide with it (slab keys are allocated
/// densely from zero).
const WAKE_TOKEN: Token = Token(usize::MAX);

/// Why a connection left `disconnected()`. Additive beyond spec.md, which
/// only needs the id back: a caller deciding whether to retry a peer needs
/// to know whether it reaped for inactivity or failed outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    IdleTimeout,
    IoError,
    PeerClosed,
    ExplicitClose,
    FailedSend,
}

pub struct Selector {
    epoll: Epoll,
    waker: Waker,
    registry: Registry,
    idle: IdleTracker,
    clock: Box<dyn Clock>,
    channel_builder: Box<dyn ChannelBuilder>,
    metrics: SelectorMetrics,
    config: SelectorConfig,
    events: Events,

    immediately_connected: Vec<Token>,
    completed_sends: Vec<Send>,
    completed_receives: Vec<(ConnectionId, Receive)>,
    connected: Vec<ConnectionId>,
    disconnected: Vec<(ConnectionId, DisconnectReason)>,
    failed_sends: Vec<ConnectionId>,

    next_idle_close_check: Instant,
}

impl Selector {
    pub fn new(
        config: SelectorConfig,
        channel_builder: Box<dyn ChannelBuilder>,
        clock: Box<dyn Clock>,
    ) -> io::Result<Selector> {
        let epoll = Epoll::new()?;
        let waker = Waker::new(&epoll, WAKE_TOKEN)?;
        let metrics = SelectorMetrics::new(
            config.metric_group_prefix.clone(),
            config.metric_tags.clone(),
            config.metrics_per_connection,
        );
        let now = clock.now();

        Ok(Selector {
            events: Events::with_capacity(config.max_events),
            next_idle_close_check: now + config.idle_timeout,
            epoll,
            waker,
            registry: Registry::new(),
            idle: IdleTracker::new(),
            clock,
            channel_builder,
            metrics,
            config,
            immediately_connected: Vec::new(),
            completed_sends: Vec::new(),
            completed_receives: Vec::new(),
            connected: Vec::new(),
            disconnected: Vec::new(),
            failed_sends: Vec::new(),
        })
    }

    #[instrument(skip_all)]
    pub fn connect(
        &mut self,
        id: impl Into<ConnectionId>,
        addr: SocketAddr,
        send_buf_size: Option<usize>,
        recv_buf_size: Option<usize>,
    ) -> Result<()> {
        let id = id.into();
        if self.registry.contains(&id) {
            return Err(SelectorError::DuplicateId(id));
        }

        let (stream, completed_immediately) = connect_nonblocking(addr)?;
        stream.set_nodelay(true)?;
        stream.set_keepalive(Some(Duration::from_secs(60)))?;
        if let Some(size) = send_buf_size {
            stream.set_send_buffer_size(size)?;
        }
        if let Some(size) = recv_buf_size {
            stream.set_recv_buffer_size(size)?;
        }

        let connect_pending = !completed_immediately;
        let builder = &self.channel_builder;
        let max_receive_size = self.config.max_receive_size;
        if connect_pending {
            trace!(id = %id, "connect pending, registering for connect-ready interest");
        }
        let token = self
            .registry
            .insert(id.clone(), |_token| builder.build(id.clone(), stream, connect_pending, max_receive_size));

        // Even a synchronously-completed connect needs an initial
        // `EPOLL_CTL_ADD` — epoll has no notion of a key registered with no
        // interest, and the dispatch that finishes this connect next poll
        // will `modify` it to read-ready, which requires the fd to already
        // be registered.
        let register_result = self
            .registry
            .get(token)
            .expect("just inserted")
            .stream()
            .add(&self.epoll, token, if connect_pending { Ready::writable() } else { Ready::readable() }, EpollOpt::level());

        if register_result.is_ok() && !connect_pending {
            self.immediately_connected.push(token);
        }

        if let Err(e) = register_result {
            self.registry.remove(token);
            return Err(e.into());
        }

        self.idle.touch(&id, self.clock.now());
        self.metrics.connection_count(self.registry.len() as u64);
        Ok(())
    }

    #[instrument(skip_all)]
    pub fn register(&mut self, id: impl Into<ConnectionId>, socket: TcpStream) -> Result<()> {
        let id = id.into();
        let builder = &self.channel_builder;
        let max_receive_size = self.config.max_receive_size;
        let token = self
            .registry
            .insert(id.clone(), |_| builder.build(id.clone(), socket, false, max_receive_size));

        self.registry
            .get(token)
            .expect("just inserted")
            .stream()
            .add(&self.epoll, token, Ready::readable(), EpollOpt::level())?;

        self.idle.touch(&id, self.clock.now());
        self.metrics.connection_count(self.registry.len() as u64);
        Ok(())
    }

    pub fn send(&mut self, send: Send) -> Result<()> {
        let id: ConnectionId = send.destination().into();
        let token = self
            .registry
            .token_for(&id)
            .ok_or_else(|| SelectorError::NoSuchConnection(id.clone()))?;

        let Some(channel) = self.registry.get_mut(token) else {
            self.failed_sends.push(id);
            return Ok(());
        };

        if !channel.set_send(send) {
            return Err(SelectorError::InvalidArgument(format!(
                "connection `{id}` already has an unsent send in flight"
            )));
        }

        if let Err(e) = channel.stream().modify(&self.epoll, token, Ready::readable() | Ready::writable(), EpollOpt::level()) {
            warn!(error = %e, "failed to enable write interest after send(), treating as a failed send");
            self.failed_sends.push(id);
            if let Some((_, mut ch)) = self.registry.remove(token) {
                ch.close();
            }
        }

        Ok(())
    }

    pub fn poll(&mut self, timeout: Duration) -> Result<()> {
        // Step 1: clear. `disconnected` is cleared here too (the spec's
        // "freshly-moved parts of disconnected" are the failed-send entries
        // below; last poll's already-observed entries don't survive into
        // this one — result buffers are only valid until the next poll).
        self.disconnected.clear();
        for id in self.failed_sends.drain(..) {
            self.disconnected.push((id, DisconnectReason::FailedSend));
        }
        self.completed_sends.clear();
        self.completed_receives.clear();
        self.connected.clear();

        // Step 2: timeout collapse.
        let has_staged = self
            .registry
            .ids()
            .cloned()
            .collect::<Vec<_>>()
            .iter()
            .any(|id| {
                self.registry
                    .by_id(id)
                    .map(|c| c.has_staged_receives() && !c.is_mute())
                    .unwrap_or(false)
            });
        let timeout = if has_staged || !self.immediately_connected.is_empty() {
            Duration::ZERO
        } else {
            timeout
        };

        // Step 3: select.
        let select_started = Instant::now();
        self.epoll.wait(&mut self.events, Some(timeout))?;
        self.metrics.select();
        self.metrics.io_wait_time(select_started.elapsed());

        // Step 4: dispatch ready keys, then the immediate-connect set.
        let ready: Vec<(Token, Ready)> = self.events.iter().map(|e| (e.token(), e.readiness())).collect();
        for (token, readiness) in ready {
            if token == WAKE_TOKEN {
                self.waker.reset();
                continue;
            }
            self.dispatch(token, readiness, false);
        }

        let immediate = std::mem::take(&mut self.immediately_connected);
        for token in immediate {
            self.dispatch(token, Ready::empty(), true);
        }

        // Step 5: drain staged receives.
        self.drain_staged_receives();

        self.metrics.io_time(select_started.elapsed());

        // Step 7: idle reap.
        self.reap_idle();

        Ok(())
    }

    /// One ready key's worth of work, steps 1-7 of the per-key algorithm.
    /// Every phase borrows the channel inside its own block and yields an
    /// owned outcome, so the borrow never overlaps the `self.disconnected`/
    /// `self.connected`/`self.registry.remove` calls that follow it.
    fn dispatch(&mut self, token: Token, readiness: Ready, is_immediate: bool) {
        let Some(id) = self.registry.get(token).map(|c| c.id().clone()) else {
            return;
        };
        self.idle.touch(&id, self.clock.now());
        self.metrics.network_io();

        let outcome = self.dispatch_channel(token, readiness, is_immediate);

        match outcome {
            DispatchOutcome::Continue => {}
            DispatchOutcome::Connected => {
                self.connected.push(id);
                self.metrics.connection_created();
            }
            DispatchOutcome::Closed(reason) => {
                if let Some((id, mut channel)) = self.registry.remove(token) {
                    channel.close();
                    self.idle.remove(&id);
                    self.disconnected.push((id, reason));
                    self.metrics.connection_closed();
                    self.metrics.connection_count(self.registry.len() as u64);
                }
            }
        }
    }

    fn dispatch_channel(&mut self, token: Token, readiness: Ready, is_immediate: bool) -> DispatchOutcome {
        let Some(channel) = self.registry.get_mut(token) else {
            return DispatchOutcome::Continue;
        };

        let mut connected_now = false;

        if is_immediate || readiness.is_writable() && channel.is_connecting() {
            match channel.finish_connect() {
                Ok(true) => {
                    connected_now = true;
                    if let Err(e) = channel.stream().modify(&self.epoll, token, Ready::readable(), EpollOpt::level()) {
                        debug!(error = %e, "failed to switch to read-ready after connect");
                        return DispatchOutcome::Closed(DisconnectReason::IoError);
                    }
                }
                Ok(false) => return DispatchOutcome::Continue,
                Err(e) => {
                    debug!(error = %e, "connect failed");
                    return DispatchOutcome::Closed(DisconnectReason::IoError);
                }
            }
        }

        if channel.is_connecting() {
            return DispatchOutcome::Continue;
        }

        if !channel.is_ready() {
            match channel.prepare(readiness) {
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, "transport handshake failed");
                    return DispatchOutcome::Closed(DisconnectReason::IoError);
                }
            }
            if !channel.is_ready() {
                return if connected_now { DispatchOutcome::Connected } else { DispatchOutcome::Continue };
            }
        }

        if readiness.is_readable() && !channel.has_staged_receives() {
            if let Err(e) = channel.read() {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    debug!("peer closed connection");
                    return DispatchOutcome::Closed(DisconnectReason::PeerClosed);
                }
                debug!(error = %e, "read failed");
                return DispatchOutcome::Closed(DisconnectReason::IoError);
            }
        }

        if readiness.is_writable() && channel.has_send() {
            match channel.write() {
                Ok(Some(send)) => {
                    self.metrics.request_sent(channel.id().as_str(), send.payload_len());
                    self.completed_sends.push(send);
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(error = %e, "write failed");
                    return DispatchOutcome::Closed(DisconnectReason::IoError);
                }
            }
        }

        if readiness.is_error() || readiness.is_hup() {
            return DispatchOutcome::Closed(DisconnectReason::IoError);
        }

        if connected_now {
            DispatchOutcome::Connected
        } else {
            DispatchOutcome::Continue
        }
    }

    fn drain_staged_receives(&mut self) {
        let ids: Vec<ConnectionId> = self.registry.ids().cloned().collect();
        for id in ids {
            let Some(channel) = self.registry.by_id_mut(&id) else { continue };
            if channel.is_mute() || !channel.has_staged_receives() {
                continue;
            }
            let Some(receive) = channel.pop_staged_receive() else { continue };
            if let Some(payload) = receive.payload() {
                self.metrics.response_received(id.as_str(), payload.len());
            }
            self.completed_receives.push((id, receive));
        }
    }

    fn reap_idle(&mut self) {
        let now = self.clock.now();
        if now <= self.next_idle_close_check {
            return;
        }

        if self.idle.is_empty() {
            self.next_idle_close_check = now + self.config.idle_timeout;
            return;
        }

        // Only the single least-recently-active entry is inspected; at most
        // one connection is reaped per poll (§4.8), and subsequent idle
        // connections are picked up on later polls as the check advances.
        let Some((id, last_active)) = self.idle.peek_oldest() else { return };
        let id = id.clone();
        self.next_idle_close_check = last_active + self.config.idle_timeout;

        if now.duration_since(last_active) < self.config.idle_timeout {
            return;
        }

        self.idle.pop_oldest();
        if let Some(token) = self.registry.token_for(&id) {
            if let Some((id, mut channel)) = self.registry.remove(token) {
                channel.close();
                self.disconnected.push((id, DisconnectReason::IdleTimeout));
                self.metrics.connection_closed();
                self.metrics.connection_count(self.registry.len() as u64);
            }
        }
    }

    pub fn mute(&mut self, id: &ConnectionId) -> Result<()> {
        self.registry
            .by_id_mut(id)
            .map(|c| c.mute())
            .ok_or_else(|| SelectorError::NoSuchConnection(id.clone()))
    }

    pub fn unmute(&mut self, id: &ConnectionId) -> Result<()> {
        self.registry
            .by_id_mut(id)
            .map(|c| c.unmute())
            .ok_or_else(|| SelectorError::NoSuchConnection(id.clone()))
    }

    pub fn mute_all(&mut self) {
        let ids: Vec<ConnectionId> = self.registry.ids().cloned().collect();
        for id in ids {
            if let Some(c) = self.registry.by_id_mut(&id) {
                c.mute();
            }
        }
    }

    pub fn unmute_all(&mut self) {
        let ids: Vec<ConnectionId> = self.registry.ids().cloned().collect();
        for id in ids {
            if let Some(c) = self.registry.by_id_mut(&id) {
                c.unmute();
            }
        }
    }

    pub fn wakeup(&self) -> io::Result<()> {
        self.waker.wake()
    }

    pub fn close(&mut self, id: &ConnectionId) {
        if let Some(token) = self.registry.token_for(id) {
            if let Some((id, mut channel)) = self.registry.remove(token) {
                channel.close();
                self.idle.remove(&id);
                self.disconnected.push((id, DisconnectReason::ExplicitClose));
                self.metrics.connection_closed();
                self.metrics.connection_count(self.registry.len() as u64);
            }
        }
    }

    pub fn close_all(&mut self) {
        let ids: Vec<ConnectionId> = self.registry.ids().cloned().collect();
        for id in ids {
            self.close(&id);
        }
    }

    pub fn completed_sends(&self) -> &[Send] {
        &self.completed_sends
    }

    pub fn completed_receives(&self) -> &[(ConnectionId, Receive)] {
        &self.completed_receives
    }

    pub fn connected(&self) -> &[ConnectionId] {
        &self.connected
    }

    pub fn disconnected(&self) -> &[(ConnectionId, DisconnectReason)] {
        &self.disconnected
    }

    pub fn channel(&self, id: &ConnectionId) -> Option<&Channel> {
        self.registry.by_id(id)
    }

    pub fn channels(&self) -> impl Iterator<Item = &ConnectionId> {
        self.registry.ids()
    }

    pub fn is_channel_ready(&self, id: &ConnectionId) -> bool {
        self.registry.by_id(id).map(|c| c.is_ready()).unwrap_or(false)
    }
}

enum DispatchOutcome {
    Continue,
    Connected,
    Closed(DisconnectReason),
}
