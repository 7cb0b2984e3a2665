//! Radio link handle handed to the echo client

use echolink_core::{EchoError, LinkRequest, RadioLink};
use tokio::sync::mpsc;
use tracing::trace;

/// Sender side of the link worker's request queue
pub type RequestSender = mpsc::UnboundedSender<LinkRequest>;
pub type RequestReceiver = mpsc::UnboundedReceiver<LinkRequest>;

/// [`RadioLink`] that forwards requests to a [`BleLinkWorker`](crate::BleLinkWorker)
///
/// Submitting never blocks; the worker performs the btleplug call and reports
/// the outcome on the peripheral event channel.
#[derive(Debug, Clone)]
pub struct BleLink {
    requests: RequestSender,
}

impl BleLink {
    pub(crate) fn new(requests: RequestSender) -> Self {
        Self { requests }
    }
}

impl RadioLink for BleLink {
    fn submit(&mut self, request: LinkRequest) -> Result<(), EchoError> {
        trace!(?request, "Queueing link request");
        self.requests
            .send(request)
            .map_err(|_| EchoError::ChannelClosed {
                channel: "link requests".to_string(),
            })
    }

    // btleplug exposes no way to drop a device's cached GATT table
    fn supports_cache_refresh(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echolink_core::ConnectionHandle;

    #[test]
    fn test_submit_forwards_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut link = BleLink::new(tx);
        let handle = ConnectionHandle::new(1);

        tokio_test::assert_ok!(link.submit(LinkRequest::StartScan));
        tokio_test::assert_ok!(link.submit(LinkRequest::DiscoverServices { handle }));

        assert_eq!(rx.try_recv().unwrap(), LinkRequest::StartScan);
        assert_eq!(
            rx.try_recv().unwrap(),
            LinkRequest::DiscoverServices { handle }
        );
        assert!(!link.supports_cache_refresh());
    }

    #[test]
    fn test_submit_after_worker_stopped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut link = BleLink::new(tx);
        drop(rx);

        let err = tokio_test::assert_err!(link.submit(LinkRequest::StopScan));
        assert!(matches!(err, EchoError::ChannelClosed { .. }));
    }
}
