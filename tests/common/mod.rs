#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use pva_client::Channel;
use pva_client::ChannelProvider;
use pva_client::ChannelProviderRegistry;
use pva_client::ChannelRequester;
use pva_client::ClientGet;
use pva_client::ClientMonitor;
use pva_client::ClientProcess;
use pva_client::ClientPut;
use pva_client::ConnectionState;
use pva_client::EndpointFactory;
use pva_client::MessageListener;
use pva_client::MessageType;
use pva_client::MonitorRequester;
use pva_client::PvRequest;
use pva_client::PvaClient;
use pva_client::PvaClientChannel;
use pva_client::Result;
use pva_client::Status;

pub const LOOPBACK_PROVIDER: &str = "pva";
pub const NOTIFY_DELAY: Duration = Duration::from_millis(10);

/// In-process stand-in for the protocol engine
///
/// Channels named in `online` connect from a notifier thread shortly after
/// creation; any other name never answers.
pub struct LoopbackProvider {
    online: Vec<String>,
    requesters: Mutex<HashMap<String, Vec<(Arc<dyn ChannelRequester>, Arc<dyn Channel>)>>>,
    pub destroyed: Arc<AtomicUsize>,
}

impl LoopbackProvider {
    pub fn new(online: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            online: online.iter().map(|s| s.to_string()).collect(),
            requesters: Mutex::new(HashMap::new()),
            destroyed: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Reports `state` to every requester of `channel_name`
    pub fn set_state(
        &self,
        channel_name: &str,
        state: ConnectionState,
    ) {
        let targets = self.requesters.lock().get(channel_name).cloned().unwrap_or_default();
        for (requester, channel) in targets {
            requester.channel_state_change(channel, state);
        }
    }
}

struct LoopbackChannel {
    name: String,
    destroyed: Arc<AtomicUsize>,
}

impl Channel for LoopbackChannel {
    fn channel_name(&self) -> String {
        self.name.clone()
    }

    fn destroy(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

impl ChannelProvider for LoopbackProvider {
    fn provider_name(&self) -> String {
        LOOPBACK_PROVIDER.to_string()
    }

    fn create_channel(
        &self,
        channel_name: &str,
        requester: Arc<dyn ChannelRequester>,
        _priority: u16,
    ) -> Option<Arc<dyn Channel>> {
        let channel: Arc<dyn Channel> = Arc::new(LoopbackChannel {
            name: channel_name.to_string(),
            destroyed: self.destroyed.clone(),
        });
        self.requesters
            .lock()
            .entry(channel_name.to_string())
            .or_default()
            .push((requester.clone(), channel.clone()));

        if self.online.iter().any(|name| name == channel_name) {
            let notified = channel.clone();
            thread::spawn(move || {
                thread::sleep(NOTIFY_DELAY);
                requester.channel_created(Status::ok(), Some(notified.clone()));
                requester.channel_state_change(notified, ConnectionState::Connected);
            });
        }
        Some(channel)
    }
}

pub struct LoopbackRegistry {
    provider: Arc<LoopbackProvider>,
}

impl ChannelProviderRegistry for LoopbackRegistry {
    fn get_provider(
        &self,
        provider_name: &str,
    ) -> Option<Arc<dyn ChannelProvider>> {
        if provider_name == LOOPBACK_PROVIDER {
            Some(self.provider.clone())
        } else {
            None
        }
    }
}

// -
// Endpoints

#[derive(Default)]
pub struct EndpointCounters {
    pub created: AtomicUsize,
    pub activated: AtomicUsize,
    pub monitor_events: AtomicUsize,
}

struct LoopbackGet {
    counters: Arc<EndpointCounters>,
}

impl ClientGet for LoopbackGet {
    fn connect(&self) -> Result<()> {
        self.counters.activated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct LoopbackPut {
    counters: Arc<EndpointCounters>,
}

impl ClientPut for LoopbackPut {
    fn connect(&self) -> Result<()> {
        self.counters.activated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn get(&self) -> Result<()> {
        Ok(())
    }
}

struct LoopbackMonitor {
    counters: Arc<EndpointCounters>,
    requester: Mutex<Option<Arc<dyn MonitorRequester>>>,
}

impl ClientMonitor for LoopbackMonitor {
    fn connect(&self) -> Result<()> {
        self.counters.activated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_requester(
        &self,
        requester: Arc<dyn MonitorRequester>,
    ) {
        *self.requester.lock() = Some(requester);
    }

    /// Delivers the initial event synchronously
    fn start(&self) -> Result<()> {
        if let Some(requester) = self.requester.lock().clone() {
            requester.event();
        }
        Ok(())
    }
}

struct LoopbackProcess {
    counters: Arc<EndpointCounters>,
}

impl ClientProcess for LoopbackProcess {
    fn connect(&self) -> Result<()> {
        self.counters.activated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct LoopbackEndpointFactory {
    pub counters: Arc<EndpointCounters>,
}

impl EndpointFactory for LoopbackEndpointFactory {
    fn create_get(
        &self,
        _client: &Arc<PvaClient>,
        _channel: &Arc<PvaClientChannel>,
        _provider_channel: &Arc<dyn Channel>,
        _request: &PvRequest,
    ) -> Arc<dyn ClientGet> {
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Arc::new(LoopbackGet {
            counters: self.counters.clone(),
        })
    }

    fn create_put(
        &self,
        _client: &Arc<PvaClient>,
        _channel: &Arc<PvaClientChannel>,
        _provider_channel: &Arc<dyn Channel>,
        _request: &PvRequest,
    ) -> Arc<dyn ClientPut> {
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Arc::new(LoopbackPut {
            counters: self.counters.clone(),
        })
    }

    fn create_monitor(
        &self,
        _client: &Arc<PvaClient>,
        _channel: &Arc<PvaClientChannel>,
        _provider_channel: &Arc<dyn Channel>,
        _request: &PvRequest,
    ) -> Arc<dyn ClientMonitor> {
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Arc::new(LoopbackMonitor {
            counters: self.counters.clone(),
            requester: Mutex::new(None),
        })
    }

    fn create_process(
        &self,
        _client: &Arc<PvaClient>,
        _channel: &Arc<PvaClientChannel>,
        _provider_channel: &Arc<dyn Channel>,
        _request: &PvRequest,
    ) -> Arc<dyn ClientProcess> {
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Arc::new(LoopbackProcess {
            counters: self.counters.clone(),
        })
    }
}

#[derive(Clone, Default)]
pub struct CollectingListener {
    pub messages: Arc<Mutex<Vec<(String, MessageType)>>>,
}

impl MessageListener for CollectingListener {
    fn message(
        &self,
        message: &str,
        message_type: MessageType,
    ) {
        self.messages.lock().push((message.to_string(), message_type));
    }
}

pub struct CountingMonitorRequester {
    pub events: Arc<EndpointCounters>,
}

impl MonitorRequester for CountingMonitorRequester {
    fn event(&self) {
        self.events.monitor_events.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Loopback {
    pub client: Arc<PvaClient>,
    pub provider: Arc<LoopbackProvider>,
    pub counters: Arc<EndpointCounters>,
    pub listener: CollectingListener,
}

/// Client wired to a loopback engine serving `online` channels
pub fn loopback_client(
    online: &[&str],
    connect_timeout: Duration,
) -> Loopback {
    let provider = LoopbackProvider::new(online);
    let counters = Arc::new(EndpointCounters::default());
    let listener = CollectingListener::default();
    let client = PvaClient::builder(
        Arc::new(LoopbackRegistry {
            provider: provider.clone(),
        }),
        Arc::new(LoopbackEndpointFactory {
            counters: counters.clone(),
        }),
    )
    .connect_timeout(connect_timeout)
    .message_listener(Box::new(listener.clone()))
    .build()
    .expect("loopback config is valid");

    Loopback {
        client,
        provider,
        counters,
        listener,
    }
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}
