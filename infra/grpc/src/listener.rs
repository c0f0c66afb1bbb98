use crate::error::GrpcError;
use cmdkit_kernel::{ListenAddr, Network};
use std::future::Future;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::server::Router;

#[cfg(unix)]
use tokio::net::UnixListener;
#[cfg(unix)]
use tokio_stream::wrappers::UnixListenerStream;

/// A bound listener waiting to be handed to [`GrpcAdapter::serve`](crate::GrpcAdapter::serve).
#[derive(Debug)]
pub enum GrpcListener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl GrpcListener {
    pub async fn bind(network: Network, addr: &ListenAddr) -> Result<Self, GrpcError> {
        let bind_error = |source| GrpcError::Bind {
            network: network.to_string(),
            addr: addr.to_string(),
            source,
        };

        match addr {
            ListenAddr::Tcp(socket) => TcpListener::bind(socket).await.map(Self::Tcp).map_err(bind_error),
            #[cfg(unix)]
            ListenAddr::Unix(path) => UnixListener::bind(path).map(Self::Unix).map_err(bind_error),
            #[cfg(not(unix))]
            ListenAddr::Unix(_) => Err(bind_error(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "unix sockets are not supported on this platform",
            ))),
        }
    }

    /// The address actually bound, with the OS-assigned port for `:0`.
    pub fn local_addr(&self) -> Result<ListenAddr, GrpcError> {
        let bind_error = |source| GrpcError::Bind {
            network: self.network().to_string(),
            addr: String::new(),
            source,
        };
        match self {
            Self::Tcp(listener) => listener.local_addr().map(ListenAddr::Tcp).map_err(bind_error),
            #[cfg(unix)]
            Self::Unix(listener) => {
                let addr = listener.local_addr().map_err(bind_error)?;
                Ok(ListenAddr::Unix(addr.as_pathname().map(ToOwned::to_owned).unwrap_or_default()))
            }
        }
    }

    #[must_use]
    pub const fn network(&self) -> Network {
        match self {
            Self::Tcp(_) => Network::Tcp,
            #[cfg(unix)]
            Self::Unix(_) => Network::Unix,
        }
    }

    pub(crate) async fn serve<F>(self, router: Router, shutdown: F) -> Result<(), tonic::transport::Error>
    where
        F: Future<Output = ()> + Send,
    {
        match self {
            Self::Tcp(listener) => {
                router.serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown).await
            }
            #[cfg(unix)]
            Self::Unix(listener) => {
                router.serve_with_incoming_shutdown(UnixListenerStream::new(listener), shutdown).await
            }
        }
    }
}
