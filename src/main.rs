// Copyright (C) 2021  Anthony DeDominic <adedomin@gmail.com>

// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

mod config;
mod irc;

use std::io;
use std::net::ToSocketAddrs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, warn};
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token, Waker};
use mio_signals::{Signal, SignalSet, Signals};

use config::cmdline::ParsedArgs;
use config::config_file::Config;
use irc::dispatcher::{Dispatcher, ReferenceDispatcher};
use irc::error::IrcdError;
use irc::registry;
use irc::worker;

const LISTENER: Token = Token(0);
const SIGNAL_TOKEN: Token = Token(1);

/// Bootstrap and accept loop: binds the listener, brings up the registry,
/// then spawns one thread per accepted connection. The main thread's only
/// other job is reacting to process signals (graceful shutdown, config
/// reload) and the occasional accept-queue drain.
fn run(config_path: &Path, config: &mut Config) -> Result<(), IrcdError> {
    let addr = config
        .listen_address()
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "could not resolve listen address"))?;

    let mut listener = TcpListener::bind(addr)?;
    let mut poll = Poll::new()?;
    let mut events = Events::with_capacity(128);
    let mut signals = Signals::new(SignalSet::all())?;

    poll.registry().register(&mut listener, LISTENER, Interest::READABLE)?;
    poll.registry().register(&mut signals, SIGNAL_TOKEN, Interest::READABLE)?;

    registry::init(config.general.max_nick_length);

    let dispatcher: Arc<dyn Dispatcher> = Arc::new(ReferenceDispatcher::new(config.server_name().to_owned()));
    let worker_cfg = Arc::new(config.worker_config());
    let shutdown = Arc::new(AtomicBool::new(false));
    let (waker_tx, waker_rx) = mpsc::channel::<Arc<Waker>>();
    let mut workers: Vec<JoinHandle<()>> = Vec::new();

    info!("mjolnircd listening on {}", addr);

    'outer: loop {
        poll.poll(&mut events, Some(Duration::from_secs(1)))?;

        for event in events.iter() {
            match event.token() {
                LISTENER => loop {
                    match listener.accept() {
                        Ok((stream, peer)) => {
                            let dispatcher = Arc::clone(&dispatcher);
                            let worker_cfg = Arc::clone(&worker_cfg);
                            let shutdown = Arc::clone(&shutdown);
                            let waker_tx = waker_tx.clone();
                            workers.push(thread::spawn(move || {
                                if let Err(e) = worker::run(stream, peer.to_string(), worker_cfg, dispatcher, shutdown, waker_tx)
                                {
                                    warn!("worker exited with i/o error: {}", e);
                                }
                            }));
                        }
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                        Err(e) => return Err(e.into()),
                    }
                },
                SIGNAL_TOKEN => loop {
                    match signals.receive()? {
                        Some(Signal::Interrupt) | Some(Signal::Terminate) | Some(Signal::Quit) => {
                            info!("shutdown signal received");
                            break 'outer;
                        }
                        Some(Signal::User1) => match Config::from_path(config_path) {
                            Ok(c) => {
                                *config = c;
                                info!("config reloaded from {}", config_path.display());
                            }
                            Err(e) => warn!("config reload failed, keeping old config: {}", e),
                        },
                        Some(_) => {}
                        None => break,
                    }
                },
                _ => unreachable!("main poll only registers LISTENER and SIGNAL_TOKEN"),
            }
        }
    }

    // Wake every worker that has registered its waker so far; this is
    // best-effort, since a connection accepted in the same instant as
    // shutdown may not have sent its waker back yet.
    shutdown.store(true, Ordering::Release);
    for waker in waker_rx.try_iter() {
        let _ = waker.wake();
    }
    for worker in workers {
        let _ = worker.join();
    }

    registry::destroy();
    Ok(())
}

fn main() -> Result<(), IrcdError> {
    let args = ParsedArgs::new()?;
    env_logger::Builder::new()
        .parse_filters(&args.log_level)
        .init();

    let config_path = Path::new(&args.config);
    let mut config = Config::from_path(config_path)?;
    run(config_path, &mut config)
}
