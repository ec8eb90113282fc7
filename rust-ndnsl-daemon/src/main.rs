//! Self-learning micro NDN forwarding daemon.

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use rust_ndnsl_common::lp::NdnPacket;
use rust_ndnsl_common::metrics::FwdMetrics;
use rust_ndnsl_common::ndn::{Interest, Name};
use rust_ndnsl_common::types::{FaceScope, LinkType};
use rust_ndnsl_fwd::{strategy, Engine, Face, Forwarder, FwEvent, RibBridge};
use rust_ndnsl_rib::RibService;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

mod udp;

/// Self-learning NDN forwarder
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// UDP address to bind
    #[clap(short, long, default_value = "0.0.0.0:6363")]
    listen: SocketAddr,

    /// Multicast group used for discovery flooding
    #[clap(short, long, default_value = "224.0.23.170:6363")]
    group: SocketAddr,

    /// Peer address to create a point-to-point face for (repeatable)
    #[clap(short, long)]
    peer: Vec<SocketAddr>,

    /// Static route "/prefix=peer-addr" (repeatable; the peer must also be
    /// listed with --peer)
    #[clap(short, long)]
    route: Vec<String>,

    /// Forwarding strategy instance name
    #[clap(short, long, default_value = "/localhost/nfd/strategy/self-learning/%FD%02")]
    strategy: String,

    /// Content store capacity (entries)
    #[clap(long, default_value_t = 4096)]
    cs_capacity: usize,

    /// Express an Interest for this name after startup (demo consumer)
    #[clap(short, long)]
    express: Option<String>,

    /// Verbose logging
    #[clap(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "info" }),
    )
    .init();

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (rib_tx, rib_rx) = mpsc::unbounded_channel();
    let (main_tx, main_rx) = mpsc::unbounded_channel();
    let (fib_tx, fib_rx) = mpsc::unbounded_channel();

    let metrics = Arc::new(FwdMetrics::new());
    let bridge = RibBridge::new(rib_tx.clone(), main_tx.clone());

    let strategy_name =
        Name::from_string(&cli.strategy).context("invalid strategy instance name")?;
    let strategy = strategy::create(&strategy_name, bridge)
        .with_context(|| format!("cannot instantiate strategy {strategy_name}"))?;
    info!("using strategy {}", strategy.instance_name());

    let mut forwarder = Forwarder::with_cs_capacity(metrics.clone(), cli.cs_capacity);

    // Internal face for this box's own consumer/producer role.
    let (app_tx, mut app_rx) = mpsc::unbounded_channel();
    let app_face = forwarder.add_face(Face::new(
        FaceScope::Local,
        LinkType::PointToPoint,
        app_tx,
    ));
    tokio::spawn(async move {
        while let Some(packet) = app_rx.recv().await {
            match packet {
                NdnPacket::Data(data) => info!(
                    "[app] received {} ({} bytes)",
                    data.name(),
                    data.content().len()
                ),
                NdnPacket::Nack(nack) => warn!("[app] received {nack}"),
                NdnPacket::Interest(interest) => info!("[app] received {interest}"),
            }
        }
    });

    let driver = udp::UdpFaceDriver::bind(
        cli.listen,
        cli.group,
        &cli.peer,
        &mut forwarder,
        events_tx.clone(),
        main_tx.clone(),
    )
    .await?;

    // Static routes go through the RIB so the FIB stays consistent.
    for route in &cli.route {
        let (prefix, addr) = route
            .split_once('=')
            .with_context(|| format!("route '{route}' is not of the form /prefix=addr"))?;
        let prefix = Name::from_string(prefix)
            .with_context(|| format!("invalid route prefix '{prefix}'"))?;
        let addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("invalid route peer address '{addr}'"))?;
        let Some(face) = driver.face_for(addr) else {
            bail!("route peer {addr} is not listed with --peer");
        };
        let prefix_for_log = prefix.clone();
        if rib_tx
            .send(Box::new(move |rib: &mut RibService| {
                rib.register(prefix, face, 0);
            }))
            .is_err()
        {
            bail!("RIB loop unavailable");
        }
        info!("static route {prefix_for_log} via {addr}");
    }

    tokio::spawn(RibService::new(fib_tx, metrics.clone()).run(rib_rx));
    tokio::spawn(driver.run());

    if let Some(express) = &cli.express {
        let name = Name::from_string(express).context("invalid --express name")?;
        events_tx
            .send(FwEvent::Packet {
                face: app_face.id(),
                endpoint: None,
                packet: NdnPacket::Interest(Interest::new(name)),
            })
            .ok();
    }

    let engine = Engine::new(forwarder, strategy, events_rx, main_rx, fib_rx);
    tokio::select! {
        _ = engine.run() => {}
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }
    Ok(())
}
