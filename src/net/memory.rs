//! In-process loopback transport
//!
//! A shared hub standing in for the signalling broker and the peer data
//! channels. Payloads still go through the JSON codec, so a loopback run
//! exercises the same validation as a real one. Used by the headless co-op
//! runner and the multi-peer tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use super::protocol::{NetMessage, encode};
use super::session::{Connector, Messenger, NetSession};
use crate::error::NetError;
use crate::sim::entity::PeerId;

/// How long a connector waits for the broker unless told otherwise
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Default)]
struct Hub {
    rooms: BTreeMap<String, PeerId>,
    host: Option<PeerId>,
    queues: BTreeMap<PeerId, VecDeque<(PeerId, String)>>,
    /// Simulated time for the broker to answer
    handshake_delay: Duration,
    /// Close notices waiting for each peer
    departures: BTreeMap<PeerId, Vec<PeerId>>,
}

impl Hub {
    fn post(&mut self, from: &PeerId, to: &PeerId, raw: &str) {
        if let Some(queue) = self.queues.get_mut(to) {
            queue.push_back((from.clone(), raw.to_string()));
        }
    }
}

/// Shared loopback network. Cheap to clone; every clone sees the same hub.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    hub: Rc<RefCell<Hub>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self, peer: PeerId) -> MemoryConnector {
        MemoryConnector {
            hub: Rc::clone(&self.hub),
            peer,
            timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Make the broker this slow to answer create and join requests.
    pub fn set_handshake_delay(&self, delay: Duration) {
        self.hub.borrow_mut().handshake_delay = delay;
    }

    /// Outbound link for `peer`. The peer must have created or joined a room
    /// for anything to reach it.
    pub fn link(&self, peer: PeerId) -> MemoryLink {
        MemoryLink {
            hub: Rc::clone(&self.hub),
            local: peer,
        }
    }

    /// Take everything queued for `peer`, oldest first.
    pub fn drain(&self, peer: &PeerId) -> Vec<(PeerId, String)> {
        self.hub
            .borrow_mut()
            .queues
            .get_mut(peer)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default()
    }

    /// Hand every queued payload to `session`, then any close notices.
    /// Rejected payloads are already logged by the session and otherwise
    /// ignored.
    pub fn deliver<M: Messenger>(&self, session: &mut NetSession<M>) -> usize {
        let inbound = self.drain(session.local_id());
        let count = inbound.len();
        for (from, raw) in inbound {
            let _ = session.receive(from, &raw);
        }
        let left = self
            .hub
            .borrow_mut()
            .departures
            .remove(session.local_id())
            .unwrap_or_default();
        for peer in left {
            session.peer_left(peer);
        }
        count
    }

    /// Close every channel to `peer`. Undelivered traffic to it is lost and
    /// the remaining peers get a close notice.
    pub fn disconnect(&self, peer: &PeerId) {
        let mut hub = self.hub.borrow_mut();
        if hub.queues.remove(peer).is_none() {
            return;
        }
        log::info!("{peer} disconnected");
        hub.rooms.retain(|_, host| host != peer);
        if hub.host.as_ref() == Some(peer) {
            hub.host = None;
        }
        let remaining: Vec<PeerId> = hub.queues.keys().cloned().collect();
        for other in remaining {
            hub.departures.entry(other).or_default().push(peer.clone());
        }
    }

    /// Register a raw payload as if `from` had sent it to `to`.
    pub fn inject(&self, from: &PeerId, to: &PeerId, raw: &str) {
        self.hub.borrow_mut().post(from, to, raw);
    }

    pub fn peers(&self) -> Vec<PeerId> {
        self.hub.borrow().queues.keys().cloned().collect()
    }
}

/// Room broker half of the loopback network
#[derive(Debug)]
pub struct MemoryConnector {
    hub: Rc<RefCell<Hub>>,
    peer: PeerId,
    timeout: Duration,
}

impl MemoryConnector {
    /// Give up on a handshake slower than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn handshake(&self, room: Option<&str>) -> Result<(), NetError> {
        let delay = self.hub.borrow().handshake_delay;
        if delay > self.timeout {
            log::warn!("{} gave up after {:?}", self.peer, self.timeout);
            return Err(NetError::ConnectTimeout {
                room: room.map(str::to_string),
            });
        }
        Ok(())
    }
}

impl Connector for MemoryConnector {
    fn create_room(&mut self, room: &str) -> Result<(), NetError> {
        self.handshake(None)?;
        let mut hub = self.hub.borrow_mut();
        if hub.rooms.contains_key(room) {
            return Err(NetError::RoomIdTaken);
        }
        log::info!("{} created room {room}", self.peer);
        hub.rooms.insert(room.to_string(), self.peer.clone());
        hub.host = Some(self.peer.clone());
        hub.queues.entry(self.peer.clone()).or_default();
        Ok(())
    }

    fn join_room(&mut self, room: &str) -> Result<PeerId, NetError> {
        self.handshake(Some(room))?;
        let mut hub = self.hub.borrow_mut();
        let Some(host) = hub.rooms.get(room).cloned() else {
            return Err(NetError::Rejected(format!("no room {room}")));
        };
        log::info!("{} joined room {room}", self.peer);
        hub.queues.entry(self.peer.clone()).or_default();
        Ok(host)
    }
}

/// One peer's outbound channel on the loopback network
#[derive(Debug)]
pub struct MemoryLink {
    hub: Rc<RefCell<Hub>>,
    local: PeerId,
}

impl MemoryLink {
    fn encoded(msg: &NetMessage) -> Option<String> {
        match encode(msg) {
            Ok(raw) => Some(raw),
            Err(e) => {
                log::warn!("Dropping outbound message: {e}");
                None
            }
        }
    }
}

impl Messenger for MemoryLink {
    fn broadcast(&mut self, msg: &NetMessage, exclude: &[PeerId]) {
        let Some(raw) = Self::encoded(msg) else {
            return;
        };
        let mut hub = self.hub.borrow_mut();
        let targets: BTreeSet<PeerId> = hub
            .queues
            .keys()
            .filter(|p| **p != self.local && !exclude.contains(p))
            .cloned()
            .collect();
        for to in &targets {
            hub.post(&self.local, to, &raw);
        }
    }

    fn send_to_authority(&mut self, msg: &NetMessage) {
        let mut hub = self.hub.borrow_mut();
        let Some(host) = hub.host.clone() else {
            log::debug!("No host to send to");
            return;
        };
        if host == self.local {
            return;
        }
        if let Some(raw) = Self::encoded(msg) {
            hub.post(&self.local, &host, &raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::net::protocol::decode;
    use crate::net::session::open_room;
    use crate::sim::collision::damage_local_player;
    use crate::sim::enemy::{Enemy, EnemyKind};
    use crate::sim::player::Role;
    use crate::sim::state::{Authority, GamePhase, GameState};
    use crate::sim::tick::{Reconciler, TickInput, tick};
    use glam::Vec2;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    struct Peer {
        state: GameState,
        session: NetSession<MemoryLink>,
    }

    impl Peer {
        fn step(&mut self, net: &MemoryNetwork, input: &TickInput) {
            net.deliver(&mut self.session);
            let reconciler: &mut dyn Reconciler = &mut self.session;
            tick(&mut self.state, input, SIM_DT, Some(reconciler));
        }
    }

    fn bounds() -> Vec2 {
        Vec2::new(ARENA_WIDTH, ARENA_HEIGHT)
    }

    /// Host plus `clients` joined peers, all sharing one loopback hub.
    fn room(clients: &[&str]) -> (MemoryNetwork, Peer, Vec<Peer>) {
        let net = MemoryNetwork::new();
        let host_id = PeerId::new("HOST");
        let mut rng = Pcg32::seed_from_u64(5);
        let room = open_room(&mut net.connector(host_id.clone()), &mut rng).unwrap();
        let host = Peer {
            state: GameState::new(1, Role::Giant, bounds()).with_authority(Authority::Host),
            session: NetSession::host(host_id.clone(), net.link(host_id)),
        };
        let clients = clients
            .iter()
            .map(|name| {
                let id = PeerId::new(*name);
                let host_id = net.connector(id.clone()).join_room(&room).unwrap();
                Peer {
                    state: GameState::new(2, Role::Healer, bounds()).with_authority(Authority::Client),
                    session: NetSession::client(id.clone(), host_id, net.link(id)),
                }
            })
            .collect();
        (net, host, clients)
    }

    #[test]
    fn duplicate_room_id_is_rejected() {
        let net = MemoryNetwork::new();
        net.connector(PeerId::new("A")).create_room("ABC123").unwrap();
        assert_eq!(
            net.connector(PeerId::new("B")).create_room("ABC123"),
            Err(NetError::RoomIdTaken)
        );
        assert!(matches!(
            net.connector(PeerId::new("C")).join_room("NOPE00"),
            Err(NetError::Rejected(_))
        ));
    }

    #[test]
    fn slow_broker_times_out_and_can_be_retried() {
        let net = MemoryNetwork::new();
        net.connector(PeerId::new("A")).create_room("ROOM01").unwrap();
        net.set_handshake_delay(Duration::from_secs(12));

        let err = net.connector(PeerId::new("B")).join_room("ROOM01").unwrap_err();
        assert_eq!(err, NetError::ConnectTimeout { room: Some("ROOM01".into()) });
        assert!(err.is_retryable());

        let patient = net
            .connector(PeerId::new("B"))
            .with_timeout(Duration::from_secs(15))
            .join_room("ROOM01");
        assert_eq!(patient, Ok(PeerId::new("A")));
    }

    #[test]
    fn client_mirrors_host_world() {
        let (net, mut host, mut clients) = room(&["A"]);
        let id = host.state.next_entity_id();
        host.state.enemies.push(Enemy::new(id, EnemyKind::Tank, Vec2::new(100.0, 100.0)));
        host.state.shards = 42;

        for _ in 0..30 {
            host.step(&net, &TickInput::default());
            for c in &mut clients {
                c.step(&net, &TickInput::default());
            }
        }

        let client = &clients[0].state;
        assert!(client.enemies.iter().any(|e| e.id == id && e.kind == EnemyKind::Tank));
        assert_eq!(client.shards, host.state.shards);
        assert_eq!(client.wave, host.state.wave);
        assert!(host.state.remotes.contains_key(&PeerId::new("A")));
        assert!(client.remotes.contains_key(&PeerId::new("HOST")));
    }

    #[test]
    fn host_relays_between_clients() {
        let (net, mut host, mut clients) = room(&["A", "B"]);
        for _ in 0..10 {
            for c in &mut clients {
                c.step(&net, &TickInput::default());
            }
            host.step(&net, &TickInput::default());
        }
        let b = &clients[1].state;
        assert!(b.remotes.contains_key(&PeerId::new("A")));
        assert!(b.remotes.contains_key(&PeerId::new("HOST")));
    }

    #[test]
    fn mission_failed_reaches_clients_exactly_once() {
        let (net, mut host, mut clients) = room(&["A"]);
        for _ in 0..5 {
            host.step(&net, &TickInput::default());
            clients[0].step(&net, &TickInput::default());
        }

        damage_local_player(&mut host.state, 10_000.0);
        for _ in 0..5 {
            host.step(&net, &TickInput::default());
            clients[0].step(&net, &TickInput::default());
        }
        assert_eq!(host.state.phase, GamePhase::Playing);
        assert_eq!(clients[0].state.phase, GamePhase::Playing);

        damage_local_player(&mut clients[0].state, 10_000.0);
        let mut failures = 0;
        for _ in 0..10 {
            // Client speaks first so the host sees the death this round
            clients[0].step(&net, &TickInput::default());
            host.step(&net, &TickInput::default());
            let inbound = net.drain(&PeerId::new("A"));
            failures += inbound
                .iter()
                .filter(|(_, raw)| matches!(decode(raw), Ok(NetMessage::MissionFailed(_))))
                .count();
            for (from, raw) in inbound {
                let _ = clients[0].session.receive(from, &raw);
            }
        }

        assert_eq!(failures, 1);
        assert_eq!(host.state.phase, GamePhase::GameOver);
        assert_eq!(clients[0].state.phase, GamePhase::GameOver);
        assert!(clients[0].state.mission_failed);
    }

    #[test]
    fn boss_kill_by_a_client_rewards_that_client() {
        let (net, mut host, mut clients) = room(&["A"]);
        for _ in 0..5 {
            host.step(&net, &TickInput::default());
            clients[0].step(&net, &TickInput::default());
        }

        let id = host.state.next_entity_id();
        let mut boss = Enemy::new(id, EnemyKind::Boss, Vec2::new(100.0, 100.0));
        boss.hp = 1.0;
        host.state.enemies.push(boss);
        clients[0].state.player.hp = 5.0;
        let killer = Some(crate::sim::entity::PlayerKey::Remote(PeerId::new("A")));
        let idx = host.state.enemy_index(id).unwrap();
        assert!(crate::sim::collision::damage_enemy(
            &mut host.state,
            idx,
            10.0,
            crate::sim::state::HitTier::Primary,
            killer,
        ));
        assert!(host.state.overlay.is_none());

        host.step(&net, &TickInput::default());
        clients[0].step(&net, &TickInput::default());
        let a = &clients[0].state;
        assert_eq!(a.player.hp, a.player.max_hp);
        assert_eq!(a.overlay, Some(crate::sim::state::Overlay::Arsenal));
    }

    #[test]
    fn disconnect_lets_the_host_call_a_wipe() {
        let (net, mut host, mut clients) = room(&["A"]);
        for _ in 0..5 {
            host.step(&net, &TickInput::default());
            clients[0].step(&net, &TickInput::default());
        }
        damage_local_player(&mut host.state, 10_000.0);
        host.step(&net, &TickInput::default());
        assert_eq!(host.state.phase, GamePhase::Playing);

        net.disconnect(&PeerId::new("A"));
        assert_eq!(net.peers(), vec![PeerId::new("HOST")]);
        host.step(&net, &TickInput::default());
        assert!(host.state.remotes.is_empty());
        assert!(host.state.mission_failed);
        assert_eq!(host.state.phase, GamePhase::GameOver);
    }

    #[test]
    fn garbage_on_the_wire_is_dropped() {
        let (net, mut host, _clients) = room(&["A"]);
        net.inject(&PeerId::new("A"), &PeerId::new("HOST"), "{\"type\":\"FIRE_BULLET\",\"payload\":{\"x\":1}}");
        assert_eq!(net.deliver(&mut host.session), 1);
        assert_eq!(host.session.pending(), 0);
    }
}
