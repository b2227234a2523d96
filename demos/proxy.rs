extern crate argparse;
extern crate env_logger;
extern crate futures;
extern crate tokio_core;
extern crate tk_http_proxy;

use std::env;
use std::net::SocketAddr;

use argparse::{ArgumentParser, Collect, Store};
use futures::{Future, Stream};
use tokio_core::net::TcpListener;
use tokio_core::reactor::Core;

use tk_http_proxy::origin::Pool;
use tk_http_proxy::ua::{Config, Proto};

const BANNER: &'static str = concat!("tk-http-proxy/",
                                     env!("CARGO_PKG_VERSION"));

fn main() {
    let mut listen = "127.0.0.1:8080".to_string();
    let mut origins: Vec<String> = Vec::new();
    {
        let mut ap = ArgumentParser::new();
        ap.set_description("HTTP/1.x forwarding proxy");
        ap.refer(&mut listen)
            .add_option(&["-l", "--listen"], Store,
                "Address to listen on (default 127.0.0.1:8080)");
        ap.refer(&mut origins)
            .add_argument("origin", Collect,
                "Upstream origin address (host:port), may be repeated");
        ap.parse_args_or_exit();
    }
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init().expect("init logging");

    let addr: SocketAddr = listen.parse().expect("valid listen address");
    let origins: Vec<SocketAddr> = origins.iter()
        .map(|x| x.parse().expect("valid origin address"))
        .collect();

    let mut lp = Core::new().unwrap();
    let handle = lp.handle();
    let listener = TcpListener::bind(&addr, &handle).unwrap();
    let cfg = Config::new().done();

    let done = listener.incoming()
        .map_err(|e| { println!("Accept error: {}", e); })
        .map(move |(socket, _addr)| {
            Proto::new(socket, BANNER,
                       Pool::new(origins.clone(), &handle), &cfg)
            .map_err(|e| { println!("Connection error: {}", e); })
        })
        .buffer_unordered(1000)
        .for_each(|()| Ok(()));

    lp.run(done).unwrap();
}
