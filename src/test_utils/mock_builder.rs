use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::Channel;
use crate::ChannelProvider;
use crate::ConnectionState;
use crate::MessageListener;
use crate::MessageType;
use crate::MockChannel;
use crate::MockChannelProvider;
use crate::MockChannelProviderRegistry;
use crate::MockClientGet;
use crate::MockClientMonitor;
use crate::MockClientProcess;
use crate::MockClientPut;
use crate::MockEndpointFactory;
use crate::PvaClient;
use crate::Status;

pub(crate) const TEST_PROVIDER: &str = "pva";
pub(crate) const TEST_CONNECT_TIMEOUT: Duration = Duration::from_millis(200);

/// How the mock provider answers `create_channel`
#[derive(Debug, Clone, Copy)]
pub(crate) enum ConnectBehavior {
    /// Notifies creation and `state` before `create_channel` returns
    Inline(ConnectionState),
    /// Notifies creation and `state` from another thread after a delay
    Delayed(Duration, ConnectionState),
    /// Returns a channel and never notifies
    Silent,
    /// Notifies a failed creation status, returns a channel, no state change
    FailedStatus,
    /// Notifies a failed creation status and returns no channel
    Refuse,
}

/// Counters observed by tests
#[derive(Default)]
pub(crate) struct Counters {
    pub create_channel_calls: AtomicUsize,
    pub channel_destroys: AtomicUsize,
    pub endpoints_created: AtomicUsize,
    pub endpoint_connects: AtomicUsize,
    pub put_gets: AtomicUsize,
    pub monitor_starts: AtomicUsize,
}

pub(crate) fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

/// Message sink that keeps everything it receives
#[derive(Clone, Default)]
pub(crate) struct RecordingListener {
    pub messages: Arc<Mutex<Vec<(String, MessageType)>>>,
}

impl MessageListener for RecordingListener {
    fn message(
        &self,
        message: &str,
        message_type: MessageType,
    ) {
        self.messages.lock().push((message.to_string(), message_type));
    }
}

pub(crate) struct TestHarness {
    pub client: Arc<PvaClient>,
    pub counters: Arc<Counters>,
    pub listener: RecordingListener,
}

impl TestHarness {
    pub fn messages(&self) -> Vec<(String, MessageType)> {
        self.listener.messages.lock().clone()
    }
}

pub(crate) struct MockBuilder {
    behavior: ConnectBehavior,
    provider_name: String,
    connect_timeout: Duration,
    endpoint_factory: Option<MockEndpointFactory>,
    counters: Arc<Counters>,
}

impl MockBuilder {
    pub fn new() -> Self {
        Self {
            behavior: ConnectBehavior::Inline(ConnectionState::Connected),
            provider_name: TEST_PROVIDER.to_string(),
            connect_timeout: TEST_CONNECT_TIMEOUT,
            endpoint_factory: None,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn with_behavior(
        mut self,
        behavior: ConnectBehavior,
    ) -> Self {
        self.behavior = behavior;
        self
    }

    /// Registers the mock provider under `name` instead of [`TEST_PROVIDER`]
    pub fn with_provider_name(
        mut self,
        name: &str,
    ) -> Self {
        self.provider_name = name.to_string();
        self
    }

    pub fn with_connect_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_endpoint_factory(
        mut self,
        factory: MockEndpointFactory,
    ) -> Self {
        self.endpoint_factory = Some(factory);
        self
    }

    pub fn build(self) -> TestHarness {
        let provider: Arc<dyn ChannelProvider> = Arc::new(mock_provider(self.behavior, self.counters.clone()));
        let mut registry = MockChannelProviderRegistry::new();
        let provider_name = self.provider_name;
        registry.expect_get_provider().returning(move |name| {
            if name == provider_name {
                Some(provider.clone())
            } else {
                None
            }
        });

        let factory = self
            .endpoint_factory
            .unwrap_or_else(|| succeeding_endpoint_factory(self.counters.clone()));

        let listener = RecordingListener::default();
        let client = PvaClient::builder(Arc::new(registry), Arc::new(factory))
            .connect_timeout(self.connect_timeout)
            .message_listener(Box::new(listener.clone()))
            .build()
            .expect("test config should be valid");

        TestHarness {
            client,
            counters: self.counters,
            listener,
        }
    }
}

/// Provider-level channel that counts its `destroy` calls
pub(crate) fn mock_provider_channel(
    name: &str,
    counters: Arc<Counters>,
) -> Arc<dyn Channel> {
    let mut channel = MockChannel::new();
    let channel_name = name.to_string();
    channel.expect_channel_name().returning(move || channel_name.clone());
    channel.expect_destroy().returning(move || {
        counters.channel_destroys.fetch_add(1, Ordering::SeqCst);
    });
    Arc::new(channel)
}

pub(crate) fn mock_provider(
    behavior: ConnectBehavior,
    counters: Arc<Counters>,
) -> MockChannelProvider {
    let mut provider = MockChannelProvider::new();
    provider.expect_provider_name().returning(|| TEST_PROVIDER.to_string());
    provider.expect_create_channel().returning(move |name, requester, _priority| {
        counters.create_channel_calls.fetch_add(1, Ordering::SeqCst);
        let channel = mock_provider_channel(name, counters.clone());
        match behavior {
            ConnectBehavior::Inline(state) => {
                requester.channel_created(Status::ok(), Some(channel.clone()));
                requester.channel_state_change(channel.clone(), state);
                Some(channel)
            }
            ConnectBehavior::Delayed(delay, state) => {
                let notified = channel.clone();
                thread::spawn(move || {
                    thread::sleep(delay);
                    requester.channel_created(Status::ok(), Some(notified.clone()));
                    requester.channel_state_change(notified, state);
                });
                Some(channel)
            }
            ConnectBehavior::Silent => Some(channel),
            ConnectBehavior::FailedStatus => {
                requester.channel_created(Status::error("channel not found"), None);
                Some(channel)
            }
            ConnectBehavior::Refuse => {
                requester.channel_created(Status::error("provider refused"), None);
                None
            }
        }
    });
    provider
}

/// Factory whose endpoints all activate successfully
pub(crate) fn succeeding_endpoint_factory(counters: Arc<Counters>) -> MockEndpointFactory {
    let mut factory = MockEndpointFactory::new();

    let c = counters.clone();
    factory.expect_create_get().returning(move |_, _, _, _| {
        c.endpoints_created.fetch_add(1, Ordering::SeqCst);
        let mut get = MockClientGet::new();
        let connects = c.clone();
        get.expect_connect().returning(move || {
            connects.endpoint_connects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        Arc::new(get)
    });

    let c = counters.clone();
    factory.expect_create_put().returning(move |_, _, _, _| {
        c.endpoints_created.fetch_add(1, Ordering::SeqCst);
        let mut put = MockClientPut::new();
        let connects = c.clone();
        put.expect_connect().returning(move || {
            connects.endpoint_connects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let gets = c.clone();
        put.expect_get().returning(move || {
            gets.put_gets.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        Arc::new(put)
    });

    let c = counters.clone();
    factory.expect_create_monitor().returning(move |_, _, _, _| {
        c.endpoints_created.fetch_add(1, Ordering::SeqCst);
        let mut monitor = MockClientMonitor::new();
        let connects = c.clone();
        monitor.expect_connect().returning(move || {
            connects.endpoint_connects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        monitor.expect_set_requester().returning(|_| ());
        let starts = c.clone();
        monitor.expect_start().returning(move || {
            starts.monitor_starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        Arc::new(monitor)
    });

    let c = counters;
    factory.expect_create_process().returning(move |_, _, _, _| {
        c.endpoints_created.fetch_add(1, Ordering::SeqCst);
        let mut process = MockClientProcess::new();
        let connects = c.clone();
        process.expect_connect().returning(move || {
            connects.endpoint_connects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        Arc::new(process)
    });

    factory
}
