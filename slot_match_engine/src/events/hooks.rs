use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    BidPlacedEvent,
    EventHandler,
    EventProducer,
    Handler,
    OutbidEvent,
    RequestExpiredEvent,
    RequestRefundedEvent,
    SlotClosedEvent,
    SlotMatchedEvent,
};

/// The sending half of every hooked-up event channel. Cloned into the flow APIs and the sweep
/// workers; producers for events nobody subscribed to are simply absent.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub bid_placed_producer: Vec<EventProducer<BidPlacedEvent>>,
    pub outbid_producer: Vec<EventProducer<OutbidEvent>>,
    pub slot_matched_producer: Vec<EventProducer<SlotMatchedEvent>>,
    pub slot_closed_producer: Vec<EventProducer<SlotClosedEvent>>,
    pub request_expired_producer: Vec<EventProducer<RequestExpiredEvent>>,
    pub request_refunded_producer: Vec<EventProducer<RequestRefundedEvent>>,
}

pub struct EventHandlers {
    pub on_bid_placed: Option<EventHandler<BidPlacedEvent>>,
    pub on_outbid: Option<EventHandler<OutbidEvent>>,
    pub on_slot_matched: Option<EventHandler<SlotMatchedEvent>>,
    pub on_slot_closed: Option<EventHandler<SlotClosedEvent>>,
    pub on_request_expired: Option<EventHandler<RequestExpiredEvent>>,
    pub on_request_refunded: Option<EventHandler<RequestRefundedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_bid_placed = hooks.on_bid_placed.map(|f| EventHandler::new(buffer_size, f));
        let on_outbid = hooks.on_outbid.map(|f| EventHandler::new(buffer_size, f));
        let on_slot_matched = hooks.on_slot_matched.map(|f| EventHandler::new(buffer_size, f));
        let on_slot_closed = hooks.on_slot_closed.map(|f| EventHandler::new(buffer_size, f));
        let on_request_expired = hooks.on_request_expired.map(|f| EventHandler::new(buffer_size, f));
        let on_request_refunded = hooks.on_request_refunded.map(|f| EventHandler::new(buffer_size, f));
        Self { on_bid_placed, on_outbid, on_slot_matched, on_slot_closed, on_request_expired, on_request_refunded }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_bid_placed {
            result.bid_placed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_outbid {
            result.outbid_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_slot_matched {
            result.slot_matched_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_slot_closed {
            result.slot_closed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_request_expired {
            result.request_expired_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_request_refunded {
            result.request_refunded_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_bid_placed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_outbid {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_slot_matched {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_slot_closed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_request_expired {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_request_refunded {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

/// The closures to run when engine events fire. Notification senders register here; anything left
/// as `None` is not wired up at all.
#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_bid_placed: Option<Handler<BidPlacedEvent>>,
    pub on_outbid: Option<Handler<OutbidEvent>>,
    pub on_slot_matched: Option<Handler<SlotMatchedEvent>>,
    pub on_slot_closed: Option<Handler<SlotClosedEvent>>,
    pub on_request_expired: Option<Handler<RequestExpiredEvent>>,
    pub on_request_refunded: Option<Handler<RequestRefundedEvent>>,
}

impl EventHooks {
    pub fn on_bid_placed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(BidPlacedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_bid_placed = Some(Arc::new(f));
        self
    }

    pub fn on_outbid<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OutbidEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_outbid = Some(Arc::new(f));
        self
    }

    pub fn on_slot_matched<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(SlotMatchedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_slot_matched = Some(Arc::new(f));
        self
    }

    pub fn on_slot_closed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(SlotClosedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_slot_closed = Some(Arc::new(f));
        self
    }

    pub fn on_request_expired<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(RequestExpiredEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_request_expired = Some(Arc::new(f));
        self
    }

    pub fn on_request_refunded<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(RequestRefundedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_request_refunded = Some(Arc::new(f));
        self
    }
}
