//! Builder for [`ThreadedServer`].

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use super::ThreadedServer;
use crate::event::{NoopEventHandler, ServerEventHandler};
use crate::processor::Processor;
use crate::protocol::{BinaryProtocolFactory, ProtocolFactory};
use crate::registry::TaskRegistry;
use crate::thread::{StdThreadFactory, ThreadFactory};
use crate::transport::{PassthroughTransportFactory, ServerTransport, TransportFactory};

/// Configures the collaborators of a [`ThreadedServer`].
///
/// Defaults: connections are used as accepted, messages use the binary
/// protocol, each connection gets a [`StdThreadFactory`] thread, and no
/// lifecycle hooks run.
pub struct ThreadedServerBuilder {
    processor: Arc<dyn Processor>,
    server_transport: Arc<dyn ServerTransport>,
    input_transport_factory: Arc<dyn TransportFactory>,
    output_transport_factory: Arc<dyn TransportFactory>,
    input_protocol_factory: Arc<dyn ProtocolFactory>,
    output_protocol_factory: Arc<dyn ProtocolFactory>,
    thread_factory: Arc<dyn ThreadFactory>,
    event_handler: Arc<dyn ServerEventHandler>,
}

impl ThreadedServerBuilder {
    pub(super) fn new(
        processor: Arc<dyn Processor>,
        server_transport: Arc<dyn ServerTransport>,
    ) -> Self {
        let transport_factory: Arc<dyn TransportFactory> = Arc::new(PassthroughTransportFactory);
        let protocol_factory: Arc<dyn ProtocolFactory> = Arc::new(BinaryProtocolFactory::default());
        Self {
            processor,
            server_transport,
            input_transport_factory: Arc::clone(&transport_factory),
            output_transport_factory: transport_factory,
            input_protocol_factory: Arc::clone(&protocol_factory),
            output_protocol_factory: protocol_factory,
            thread_factory: Arc::new(StdThreadFactory::default()),
            event_handler: Arc::new(NoopEventHandler),
        }
    }

    /// Uses `factory` for both directions.
    #[must_use]
    pub fn transport_factory(mut self, factory: impl TransportFactory + 'static) -> Self {
        let factory: Arc<dyn TransportFactory> = Arc::new(factory);
        self.input_transport_factory = Arc::clone(&factory);
        self.output_transport_factory = factory;
        self
    }

    #[must_use]
    pub fn input_transport_factory(mut self, factory: impl TransportFactory + 'static) -> Self {
        self.input_transport_factory = Arc::new(factory);
        self
    }

    #[must_use]
    pub fn output_transport_factory(mut self, factory: impl TransportFactory + 'static) -> Self {
        self.output_transport_factory = Arc::new(factory);
        self
    }

    /// Uses `factory` for both directions.
    #[must_use]
    pub fn protocol_factory(mut self, factory: impl ProtocolFactory + 'static) -> Self {
        let factory: Arc<dyn ProtocolFactory> = Arc::new(factory);
        self.input_protocol_factory = Arc::clone(&factory);
        self.output_protocol_factory = factory;
        self
    }

    #[must_use]
    pub fn input_protocol_factory(mut self, factory: impl ProtocolFactory + 'static) -> Self {
        self.input_protocol_factory = Arc::new(factory);
        self
    }

    #[must_use]
    pub fn output_protocol_factory(mut self, factory: impl ProtocolFactory + 'static) -> Self {
        self.output_protocol_factory = Arc::new(factory);
        self
    }

    #[must_use]
    pub fn thread_factory(mut self, factory: impl ThreadFactory + 'static) -> Self {
        self.thread_factory = Arc::new(factory);
        self
    }

    #[must_use]
    pub fn event_handler(mut self, handler: impl ServerEventHandler + 'static) -> Self {
        self.event_handler = Arc::new(handler);
        self
    }

    #[must_use]
    pub fn build(self) -> ThreadedServer {
        ThreadedServer {
            processor: self.processor,
            server_transport: self.server_transport,
            input_transport_factory: self.input_transport_factory,
            output_transport_factory: self.output_transport_factory,
            input_protocol_factory: self.input_protocol_factory,
            output_protocol_factory: self.output_protocol_factory,
            thread_factory: self.thread_factory,
            event_handler: self.event_handler,
            registry: Arc::new(TaskRegistry::new()),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }
}
