// Copyright 2024 Cloudflare, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! TCP connection factory

use log::debug;
use pingora_error::{Error, ErrorType::*, OrErr, Result};
use std::io::ErrorKind;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Connect to `addr`, trying each resolved address in turn.
///
/// `connect_timeout` applies to each address separately.
pub fn dial(addr: &str, connect_timeout: Option<Duration>) -> Result<TcpStream> {
    let addrs = addr
        .to_socket_addrs()
        .or_err_with(ConnectError, || format!("unable to resolve {addr}"))?;

    let mut last_err = None;
    for sock_addr in addrs {
        let res = match connect_timeout {
            Some(t) => TcpStream::connect_timeout(&sock_addr, t),
            None => TcpStream::connect(sock_addr),
        };
        match res {
            Ok(stream) => {
                stream
                    .set_nodelay(true)
                    .or_err(SocketError, "failed to set TCP_NODELAY")?;
                return Ok(stream);
            }
            Err(e) => {
                debug!("connecting to {sock_addr} failed: {e}");
                last_err = Some((sock_addr, e));
            }
        }
    }

    match last_err {
        Some((sock_addr, e)) => {
            let etype = match e.kind() {
                ErrorKind::TimedOut => ConnectTimedout,
                ErrorKind::ConnectionRefused => ConnectRefused,
                _ => ConnectError,
            };
            Error::e_because(etype, format!("connecting to {addr} ({sock_addr})"), e)
        }
        None => Error::e_explain(ConnectError, format!("{addr} resolved to no address")),
    }
}

/// A [ConnectionPool](crate::ConnectionPool) factory that dials `addr` on every call.
///
/// ```no_run
/// use connpool::{tcp, ConnectionPool};
///
/// let pool = ConnectionPool::new(tcp::factory("127.0.0.1:3540", None));
/// let conn = pool.acquire().unwrap();
/// pool.release(conn);
/// ```
pub fn factory(
    addr: impl Into<String>,
    connect_timeout: Option<Duration>,
) -> impl Fn() -> Result<TcpStream> + Send + Sync + 'static {
    let addr = addr.into();
    move || dial(&addr, connect_timeout)
}
