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

pub(crate) mod bookmarks;
mod config;
pub(crate) mod retry;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Debug;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;
use std::result::Result as StdResult;
use std::sync::Arc;

pub use bookmarks::Bookmarks;
pub use config::SessionConfig;

use super::io::bolt::message_parameters::RunParameters;
use super::io::{AcquireConfig, Pool, PooledBolt, SessionAuth, UpdateRtArgs};
use super::record_stream::RecordStream;
use super::session::retry::RetryPolicy;
use super::summary::Summary;
use super::transaction::{InnerTransaction, Transaction};
use super::{DriverConfig, RoutingControl};
use crate::{Result, ValueSend};

/// Spawned from a [`super::Driver`], a session borrows connections from the driver's pool as
/// needed and keeps track of the bookmarks of the work performed through it.
///
/// Sessions are cheap to create: create one per unit of work rather than trying to reuse them.
#[derive(Debug)]
pub struct Session<'driver> {
    config: SessionConfig,
    pool: &'driver Pool,
    driver_config: &'driver DriverConfig,
    database: Option<Arc<String>>,
    bookmarks: RefCell<Bookmarks>,
}

impl<'driver> Session<'driver> {
    pub(crate) fn new(
        config: SessionConfig,
        pool: &'driver Pool,
        driver_config: &'driver DriverConfig,
    ) -> Self {
        let bookmarks = Bookmarks::from_raw(config.bookmarks.clone().unwrap_or_default());
        let database = config.database.clone().map(Arc::new);
        Self {
            config,
            pool,
            driver_config,
            database,
            bookmarks: RefCell::new(bookmarks),
        }
    }

    /// Start building an auto-commit query (a query that manages its own transaction, such as
    /// `CALL {...} IN TRANSACTIONS`).
    pub fn auto_commit<Q: AsRef<str>>(&mut self, query: Q) -> AutoCommitBuilder<Q> {
        AutoCommitBuilder::new(query)
    }

    /// Run an auto-commit query built through [`Session::auto_commit()`].
    ///
    /// The returned stream updates the session's bookmarks once it has been fully consumed
    /// (either explicitly through [`SessionRecordStream::consume()`] or by dropping it).
    pub fn auto_commit_run<Q: AsRef<str>>(
        &mut self,
        builder: AutoCommitBuilder<Q>,
    ) -> Result<SessionRecordStream<'driver, '_>> {
        let AutoCommitBuilder {
            query,
            parameters,
            routing_control,
            tx_timeout,
            tx_metadata,
        } = builder;
        let connection = self.acquire_connection(routing_control)?;
        let connection = Rc::new(RefCell::new(connection));
        let bookmarks = self.bookmarks.borrow();
        let parameters = (!parameters.is_empty()).then_some(&parameters);
        let tx_metadata = (!tx_metadata.is_empty()).then_some(&tx_metadata);
        let run_parameters = RunParameters::new_auto_commit_run(
            query.as_ref(),
            parameters,
            Some(&bookmarks),
            tx_timeout,
            tx_metadata,
            routing_control.as_protocol_mode(),
            self.config.database.as_deref(),
            self.config.impersonated_user.as_deref(),
        );
        let mut record_stream =
            RecordStream::new(Rc::clone(&connection), self.fetch_size(), true, None);
        let run_result = record_stream.run(run_parameters);
        drop(bookmarks);
        run_result?;
        Ok(SessionRecordStream {
            stream: Some(record_stream),
            bookmarks: &self.bookmarks,
        })
    }

    /// Start building an explicit transaction.
    pub fn transaction(&mut self) -> TransactionBuilder {
        TransactionBuilder::new()
    }

    /// Run an explicit transaction built through [`Session::transaction()`].
    ///
    /// The transaction is committed if `receiver` returns [`Ok`], rolled back otherwise.
    pub fn transaction_run<R>(
        &mut self,
        builder: TransactionBuilder,
        receiver: impl FnOnce(&Transaction) -> Result<R>,
    ) -> Result<R> {
        let TransactionBuilder {
            routing_control,
            tx_timeout,
            tx_metadata,
        } = builder;
        let connection = self.acquire_connection(routing_control)?;
        let mut inner = InnerTransaction::new(connection, self.fetch_size());
        {
            let bookmarks = self.bookmarks.borrow();
            let tx_metadata = (!tx_metadata.is_empty()).then_some(&tx_metadata);
            inner.begin(
                Some(&bookmarks),
                tx_timeout,
                tx_metadata,
                routing_control.as_protocol_mode(),
                self.config.database.as_deref(),
                self.config.impersonated_user.as_deref(),
            )?;
        }
        let tx = Transaction::new(&mut inner);
        let result = match receiver(&tx) {
            Ok(value) => tx.commit().map(|_| value),
            Err(err) => {
                let _ = tx.rollback();
                Err(err)
            }
        };
        if let Some(bookmark) = inner.into_bookmark() {
            *self.bookmarks.borrow_mut() += Bookmarks::from_raw([bookmark]);
        }
        result
    }

    /// Retry `work` according to `policy` until it succeeds, a non-retryable error occurs, or
    /// the policy gives up.
    ///
    /// Typical usage wraps a single [`Session::auto_commit_run()`]/[`Session::transaction_run()`]
    /// call so the whole unit of work (including acquiring a fresh connection) is retried.
    pub fn run_with_retry<P: RetryPolicy, R>(
        &mut self,
        policy: P,
        mut work: impl FnMut(&mut Self) -> Result<R>,
    ) -> StdResult<R, P::Error> {
        policy.execute(|| work(self))
    }

    /// The bookmarks accumulated by work performed through this session so far.
    pub fn last_bookmarks(&self) -> Bookmarks {
        self.bookmarks.borrow().clone()
    }

    fn acquire_connection(&self, mode: RoutingControl) -> Result<PooledBolt<'driver>> {
        let bookmarks = self.bookmarks.borrow();
        self.pool.acquire(AcquireConfig {
            mode,
            update_rt_args: UpdateRtArgs {
                db: self.database.as_ref(),
                bookmarks: Some(&bookmarks),
                imp_user: self.config.impersonated_user.as_deref(),
                session_auth: SessionAuth::None,
                idle_time_before_connection_test: self
                    .driver_config
                    .idle_time_before_connection_test,
            },
        })
    }

    fn fetch_size(&self) -> i64 {
        self.config.fetch_size.unwrap_or(self.driver_config.fetch_size)
    }
}

/// Builder for [`Session::auto_commit_run()`], created via [`Session::auto_commit()`].
#[derive(Debug)]
pub struct AutoCommitBuilder<Q: AsRef<str>> {
    query: Q,
    parameters: HashMap<String, ValueSend>,
    routing_control: RoutingControl,
    tx_timeout: Option<i64>,
    tx_metadata: HashMap<String, ValueSend>,
}

impl<Q: AsRef<str>> AutoCommitBuilder<Q> {
    fn new(query: Q) -> Self {
        Self {
            query,
            parameters: HashMap::new(),
            routing_control: RoutingControl::Write,
            tx_timeout: None,
            tx_metadata: HashMap::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: HashMap<String, ValueSend>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_routing_control(mut self, routing_control: RoutingControl) -> Self {
        self.routing_control = routing_control;
        self
    }

    pub fn with_transaction_timeout(mut self, tx_timeout: i64) -> Self {
        self.tx_timeout = Some(tx_timeout);
        self
    }

    pub fn with_transaction_metadata(mut self, tx_metadata: HashMap<String, ValueSend>) -> Self {
        self.tx_metadata = tx_metadata;
        self
    }
}

/// Builder for [`Session::transaction_run()`], created via [`Session::transaction()`].
#[derive(Debug)]
pub struct TransactionBuilder {
    routing_control: RoutingControl,
    tx_timeout: Option<i64>,
    tx_metadata: HashMap<String, ValueSend>,
}

impl TransactionBuilder {
    fn new() -> Self {
        Self {
            routing_control: RoutingControl::Write,
            tx_timeout: None,
            tx_metadata: HashMap::new(),
        }
    }

    pub fn with_routing_control(mut self, routing_control: RoutingControl) -> Self {
        self.routing_control = routing_control;
        self
    }

    pub fn with_transaction_timeout(mut self, tx_timeout: i64) -> Self {
        self.tx_timeout = Some(tx_timeout);
        self
    }

    pub fn with_transaction_metadata(mut self, tx_metadata: HashMap<String, ValueSend>) -> Self {
        self.tx_metadata = tx_metadata;
        self
    }
}

/// The stream returned by [`Session::auto_commit_run()`].
///
/// Feeds the bookmark produced by the query back into the owning session once the stream has
/// been fully consumed.
#[derive(Debug)]
pub struct SessionRecordStream<'driver, 'session> {
    stream: Option<RecordStream<'driver>>,
    bookmarks: &'session RefCell<Bookmarks>,
}

impl<'driver, 'session> SessionRecordStream<'driver, 'session> {
    /// see [`RecordStream::consume()`] (except that this consumes `self`)
    pub fn consume(mut self) -> Result<Option<Summary>> {
        let mut stream = self.take_stream();
        let result = stream.consume();
        self.merge_bookmark(stream);
        result
    }

    fn take_stream(&mut self) -> RecordStream<'driver> {
        self.stream.take().expect("stream is only taken once")
    }

    fn merge_bookmark(&self, stream: RecordStream<'driver>) {
        if let Some(bookmark) = stream.into_bookmark() {
            *self.bookmarks.borrow_mut() += Bookmarks::from_raw([bookmark]);
        }
    }
}

impl<'driver, 'session> Deref for SessionRecordStream<'driver, 'session> {
    type Target = RecordStream<'driver>;

    fn deref(&self) -> &Self::Target {
        self.stream.as_ref().expect("stream is only taken on drop")
    }
}

impl<'driver, 'session> DerefMut for SessionRecordStream<'driver, 'session> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.stream.as_mut().expect("stream is only taken on drop")
    }
}

impl<'driver, 'session> Drop for SessionRecordStream<'driver, 'session> {
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.consume();
            self.merge_bookmark(stream);
        }
    }
}
