use tracing::info;

use crate::config::ServerConfig;
use crate::net::{Acceptor, Endpoint, NetResult, SocketOption};

/// Opens the listening acceptor described by `config`.
///
/// `SO_REUSEADDR` is always set before binding.
pub fn bind(config: &ServerConfig) -> NetResult<Acceptor> {
    let endpoint = Endpoint::resolve(&config.host, &config.port.to_string())?;

    let mut acceptor = Acceptor::new();
    acceptor.open(endpoint.protocol())?;
    acceptor.set_option(SocketOption::ReuseAddress(true))?;
    acceptor.bind(&endpoint)?;
    acceptor.listen(config.backlog)?;

    info!(
        address = %acceptor.local_addr()?,
        backlog = config.backlog,
        "listening"
    );
    Ok(acceptor)
}
