use clap::{App, Arg};
use common::logging;
use proxy_core::admin::Admin;
use proxy_core::beacon::BroadcastListener;
use proxy_core::broadcast::{Broadcast, EndpointTriple};
use proxy_core::connectors::{self, AdminEndpoint};
use proxy_core::message_hub::{HubBuilder, MessageHub, MessageHubWrapper};
use proxy_core::pinger::BroadcastPinger;
use proxy_core::program::{self, Program};
use proxy_core::sockets::SocketsLister;
use proxy_core::ProxyConfig;
use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::Instant;

fn build_cli() -> App<'static, 'static> {
    App::new("Orwell Proxy")
        .version("1.0")
        .author("Bush Hammer Industries")
        .about("Bridges the game server and the robot fleet")
        .arg(Arg::with_name("config").long("config").takes_value(true).help("Path to a TOML configuration file"))
        .arg(Arg::with_name("address").long("address").takes_value(true).help("Game server address"))
        .arg(Arg::with_name("publisher-port").long("publisher-port").takes_value(true))
        .arg(Arg::with_name("puller-port").long("puller-port").takes_value(true))
        .arg(Arg::with_name("server-broadcast-port").long("server-broadcast-port").takes_value(true))
        .arg(Arg::with_name("no-server-broadcast").long("no-server-broadcast"))
        .arg(Arg::with_name("proxy-broadcast-port").long("proxy-broadcast-port").takes_value(true))
        .arg(Arg::with_name("no-proxy-broadcast").long("no-proxy-broadcast"))
        .arg(Arg::with_name("admin-port").long("admin-port").takes_value(true))
        .arg(Arg::with_name("ports-count").long("ports-count").takes_value(true))
        .arg(Arg::with_name("verbose").long("verbose").short("v"))
}

fn load_config(matches: &clap::ArgMatches<'_>) -> ProxyConfig {
    let mut config = match matches.value_of("config") {
        Some(path) => ProxyConfig::load(path),
        None => ProxyConfig::default(),
    };

    if let Some(address) = matches.value_of("address") {
        config.server.address = address.to_string();
    }
    if let Some(port) = matches.value_of("publisher-port") {
        config.server.publisher_port = port.parse().expect("--publisher-port must be a valid port");
    }
    if let Some(port) = matches.value_of("puller-port") {
        config.server.puller_port = port.parse().expect("--puller-port must be a valid port");
    }
    if let Some(port) = matches.value_of("server-broadcast-port") {
        config.server.broadcast_port = port.parse().expect("--server-broadcast-port must be a valid port");
    }
    if matches.is_present("no-server-broadcast") {
        config.server.use_broadcast = false;
    }
    if let Some(port) = matches.value_of("proxy-broadcast-port") {
        config.proxy.broadcast_port = port.parse().expect("--proxy-broadcast-port must be a valid port");
    }
    if matches.is_present("no-proxy-broadcast") {
        config.proxy.use_broadcast = false;
    }
    if let Some(port) = matches.value_of("admin-port") {
        config.proxy.admin_port = port.parse().expect("--admin-port must be a valid port");
    }
    if let Some(count) = matches.value_of("ports-count") {
        config.proxy.ports_count = count.parse().expect("--ports-count must be a non-negative integer");
    }
    if matches.is_present("verbose") {
        config.verbose = true;
    }

    config
}

/// Builds the endpoint triple used when `--no-server-broadcast` is set: the
/// reply channel has no dedicated CLI flag (spec §6 lists none), so it is
/// derived from the puller port by a fixed offset — see DESIGN.md.
fn static_endpoint_triple(config: &ProxyConfig) -> EndpointTriple {
    EndpointTriple {
        push_address: format!("tcp://{}:{}", config.server.address, config.server.puller_port),
        subscribe_address: format!("tcp://{}:{}", config.server.address, config.server.publisher_port),
        reply_address: format!("tcp://{}:{}", config.server.address, config.server.puller_port + 1),
    }
}

fn main() {
    let matches = build_cli().get_matches();
    let config = load_config(&matches);
    let log = logging::init(config.verbose);

    logging::info!(log, "starting proxy"; "address" => config.server.address.clone());

    let context = connectors::new_context();

    let wrapper = if config.server.use_broadcast {
        let discovery_log = log.new(logging::o!());
        let broadcast = Broadcast::new(
            config.server.broadcast_port,
            config.discovery.retries,
            config.discovery_timeout(),
            &discovery_log,
        );
        let pinger = BroadcastPinger::start(broadcast, config.pinger_sleep(), &log);
        let builder = HubBuilder::new(context.clone(), &log);
        Rc::new(RefCell::new(MessageHubWrapper::broadcaster(pinger, builder)))
    } else {
        let triple = static_endpoint_triple(&config);
        let hub = MessageHub::new(
            &triple.subscribe_address,
            &triple.push_address,
            &triple.reply_address,
            &context,
            &log,
        )
        .expect("failed to connect to the game server");
        Rc::new(RefCell::new(MessageHubWrapper::with_hub(hub)))
    };

    let admin_endpoint = AdminEndpoint::new(config.proxy.admin_port, &context, &log)
        .expect("failed to bind the admin endpoint");
    let admin = Admin::new(admin_endpoint);

    let sockets = SocketsLister::new(config.proxy.ports_count).expect("failed to pre-bind the socket pool");

    let beacon = if config.proxy.use_broadcast {
        let queue = program::port_queue_from_pool(&sockets).expect("failed to read socket pool ports");
        let listener = BroadcastListener::start(config.proxy.broadcast_port, queue, &log)
            .expect("failed to bind the beacon socket");
        Some(listener)
    } else {
        None
    };

    let mut program = Program::new(wrapper, admin, sockets, beacon, &log);

    let tick_sleep = ProxyConfig::tick_sleep();
    loop {
        let started = Instant::now();

        if let Err(e) = program.tick() {
            logging::error!(log, "fatal error during tick"; "error" => e.to_string());
            std::process::exit(1);
        }

        let elapsed = started.elapsed();
        if elapsed < tick_sleep {
            thread::sleep(tick_sleep - elapsed);
        }
    }
}
