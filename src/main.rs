//! Antigravity headless runner
//!
//! Plays a run with the autopilot and records high scores on exit.
//!
//! ```text
//! antigravity [--coop] [--seed N] [--role gunner|giant|healer] [--secs S]
//! ```
//!
//! `--coop` hosts a room on the in-process loopback network and adds an
//! autopiloted teammate, exercising the full host/client reconciliation path.

use antigravity::autopilot;
use antigravity::consts::SIM_DT;
use antigravity::net::memory::DEFAULT_CONNECT_TIMEOUT;
use antigravity::net::{Connector, MemoryLink, MemoryNetwork, NetSession, open_room};
use antigravity::persistence;
use antigravity::platform;
use antigravity::sim::{Authority, GamePhase, GameState, PeerId, Reconciler, Role, tick};
use antigravity::{HighScores, NetError, Settings};
use rand::SeedableRng;
use rand_pcg::Pcg32;
use std::time::Duration;

#[derive(Debug, Default)]
struct Options {
    coop: bool,
    seed: Option<u64>,
    role: Option<Role>,
    secs: Option<f32>,
}

fn parse_role(s: &str) -> Option<Role> {
    match s.to_lowercase().as_str() {
        "gunner" => Some(Role::Gunner),
        "giant" => Some(Role::Giant),
        "healer" => Some(Role::Healer),
        _ => None,
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options, String> {
    let mut opts = Options::default();
    while let Some(arg) = args.next() {
        let mut value = |name: &str| args.next().ok_or(format!("{name} needs a value"));
        match arg.as_str() {
            "--coop" => opts.coop = true,
            "--seed" => {
                let v = value("--seed")?;
                opts.seed = Some(v.parse().map_err(|_| format!("bad seed {v}"))?);
            }
            "--role" => {
                let v = value("--role")?;
                opts.role = Some(parse_role(&v).ok_or(format!("unknown role {v}"))?);
            }
            "--secs" => {
                let v = value("--secs")?;
                opts.secs = Some(v.parse().map_err(|_| format!("bad duration {v}"))?);
            }
            other => return Err(format!("unknown argument {other}")),
        }
    }
    Ok(opts)
}

fn ticks_for(secs: f32) -> usize {
    (secs / SIM_DT).ceil() as usize
}

/// Single-player run. Returns the final score and wave.
fn run_solo(settings: &Settings, seed: u64) -> (u64, u32) {
    let mut state = GameState::new(seed, settings.role, settings.bounds());
    for _ in 0..ticks_for(settings.autopilot_secs) {
        autopilot::tend_overlays(&mut state);
        let input = autopilot::input_for(&state);
        tick(&mut state, &input, SIM_DT, None);
        state.events.clear();
        if state.phase == GamePhase::GameOver {
            break;
        }
    }
    (state.score, state.wave)
}

struct CoopPeer {
    state: GameState,
    session: NetSession<MemoryLink>,
}

impl CoopPeer {
    fn step(&mut self, net: &MemoryNetwork) {
        net.deliver(&mut self.session);
        autopilot::tend_overlays(&mut self.state);
        let input = autopilot::input_for(&self.state);
        let reconciler: &mut dyn Reconciler = &mut self.session;
        tick(&mut self.state, &input, SIM_DT, Some(reconciler));
        self.state.events.clear();
    }
}

/// Host plus one loopback teammate. Returns the host's final score and wave.
fn run_coop(settings: &Settings, seed: u64) -> Result<(u64, u32), NetError> {
    let net = MemoryNetwork::new();
    let mut rng = Pcg32::seed_from_u64(seed);
    let timeout =
        Duration::try_from_secs_f32(settings.connect_timeout_secs).unwrap_or(DEFAULT_CONNECT_TIMEOUT);

    let host_id = PeerId::new("HOST");
    let room = open_room(
        &mut net.connector(host_id.clone()).with_timeout(timeout),
        &mut rng,
    )?;
    log::info!("Hosting room {room}");

    let guest_id = PeerId::new("GUEST");
    let joined_host = net
        .connector(guest_id.clone())
        .with_timeout(timeout)
        .join_room(&room)?;

    let (player_sync, world_sync) = (settings.player_sync_interval, settings.world_sync_interval);
    let mut host = CoopPeer {
        state: GameState::new(seed, settings.role, settings.bounds()).with_authority(Authority::Host),
        session: NetSession::host(host_id.clone(), net.link(host_id)).with_intervals(player_sync, world_sync),
    };
    let guest_role = Role::ALL
        .into_iter()
        .find(|r| *r != settings.role)
        .unwrap_or(settings.role);
    let mut guest = CoopPeer {
        state: GameState::new(seed.wrapping_add(1), guest_role, settings.bounds())
            .with_authority(Authority::Client),
        session: NetSession::client(guest_id.clone(), joined_host, net.link(guest_id))
            .with_intervals(player_sync, world_sync),
    };

    for _ in 0..ticks_for(settings.autopilot_secs) {
        host.step(&net);
        guest.step(&net);
        if host.state.phase == GamePhase::GameOver && guest.state.phase == GamePhase::GameOver {
            break;
        }
    }
    log::info!(
        "Guest finished on wave {} with {} shards",
        guest.state.wave,
        guest.state.shards
    );
    Ok((host.state.score, host.state.wave))
}

fn main() {
    platform::init_logging();

    let opts = match parse_args(std::env::args().skip(1)) {
        Ok(opts) => opts,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(2);
        }
    };

    let store = persistence::default_store();
    let mut settings = Settings::load(&store);
    // Persist before command-line overrides so they stay one-off
    if let Err(e) = settings.save(&store) {
        log::warn!("Could not save settings: {e}");
    }
    if let Some(seed) = opts.seed {
        settings.seed = Some(seed);
    }
    if let Some(role) = opts.role {
        settings.role = role;
    }
    if let Some(secs) = opts.secs {
        settings.autopilot_secs = secs;
    }
    let settings = settings.sanitized();
    let seed = settings.run_seed();
    log::info!(
        "Antigravity starting: {} run as {:?}, seed {seed}",
        if opts.coop { "co-op" } else { "solo" },
        settings.role
    );

    let (score, wave) = if opts.coop {
        match run_coop(&settings, seed) {
            Ok(result) => result,
            Err(e) => {
                log::error!("Co-op setup failed: {e}");
                std::process::exit(1);
            }
        }
    } else {
        run_solo(&settings, seed)
    };
    log::info!("Run over: score {score}, wave {wave}");

    let mut scores = HighScores::load(&store);
    if scores.record(score, wave) {
        log::info!("New high-water mark: {scores:?}");
        if let Err(e) = scores.save(&store) {
            log::warn!("Could not save high scores: {e}");
        }
    }
}
