// Copyright Rouven Bauer
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod config;
pub(crate) mod io;
mod record;
mod record_stream;
pub(crate) mod session;
mod summary;
mod transaction;

use std::sync::Arc;

pub use config::{ConnectionConfig, DriverConfig};
pub use record::Record;
pub use record_stream::RecordStream;
pub use session::{Session, SessionConfig};
pub use transaction::{Transaction, TransactionRecordStream};

pub mod auth {
    pub use super::config::auth::*;
}

use io::{Pool, PoolConfig};

/// Whether a piece of work should be routed to a reader or a writer in a clustered deployment.
///
/// Ignored against a single, non-routing instance.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum RoutingControl {
    Read,
    Write,
}

impl RoutingControl {
    /// The Bolt wire value for this mode, or `None` when it's the implicit default (`"w"`).
    pub(crate) fn as_protocol_mode(self) -> Option<&'static str> {
        match self {
            RoutingControl::Read => Some("r"),
            RoutingControl::Write => None,
        }
    }
}

/// Entry point of this crate: owns a connection pool for a single DBMS (or cluster) and spawns
/// [`Session`]s that borrow connections from it.
///
/// Creating a driver is cheap-ish (it doesn't connect eagerly) but it's meant to be created once
/// and shared (behind an `Arc` if needed) for the lifetime of the application, not per request.
#[derive(Debug)]
pub struct Driver {
    config: DriverConfig,
    pool: Pool,
}

impl Driver {
    pub fn new(connection_config: ConnectionConfig, config: DriverConfig) -> Self {
        let ConnectionConfig {
            address,
            routing_context,
            tls_config,
        } = connection_config;
        let pool_config = PoolConfig {
            routing_context,
            tls_config: tls_config.map(Arc::new),
            user_agent: config.user_agent.clone(),
            auth: config.auth.clone(),
            max_connection_pool_size: config.max_connection_pool_size,
            connection_timeout: config.connection_timeout,
            connection_acquisition_timeout: config.connection_acquisition_timeout,
            resolver: config.resolver.clone(),
        };
        // `config` is kept around (not moved into `pool_config`) so the driver can hand a
        // reference to it to every spawned session.
        let pool = Pool::new(Arc::new(address), pool_config);
        Self { config, pool }
    }

    /// Spawn a new session. Sessions are cheap to create and are meant to be short-lived: one
    /// per logically separate piece of work.
    pub fn session(&self, config: SessionConfig) -> Session<'_> {
        Session::new(config, &self.pool, &self.config)
    }

    /// Whether this driver was configured to route through a cluster's routing table (`neo4j://`
    /// style addressing) as opposed to talking to a single instance directly (`bolt://`).
    pub fn is_routing(&self) -> bool {
        self.pool.is_routing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;

    #[test]
    fn test_session() {
        let address = Address::from(("localhost", 7687));
        let driver = Driver::new(ConnectionConfig::new(address), DriverConfig::new());
        let db = String::from("foo_bar");
        let session_config = SessionConfig::new().with_database(db);
        let session = driver.session(session_config);
        dbg!(&session);
    }
}
