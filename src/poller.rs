use quickbite_marketplace::{Marketplace, Order};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::OrderPollingError;

#[derive(Debug, Clone)]
pub struct OrderPollerConfig {
    pub polling_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for OrderPollerConfig {
    fn default() -> Self {
        Self {
            polling_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Result of a single refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// At least one order is active; refresh again after the delay.
    Scheduled(Duration),
    /// No active orders left.
    Idle,
    /// Another refresh was already in flight; nothing was fetched.
    Skipped,
}

/// Why a spawned polling loop ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollingStopped {
    Idle,
    Cancelled,
}

/// Keeps the principal's order list fresh while any order is active.
pub struct OrderStatusPoller<M: Marketplace + ?Sized> {
    config: OrderPollerConfig,
    marketplace: Arc<M>,
    orders: Arc<RwLock<Vec<Order>>>,
    in_flight: Arc<AtomicBool>,
}

impl<M: Marketplace + ?Sized> Clone for OrderStatusPoller<M> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            marketplace: Arc::clone(&self.marketplace),
            orders: Arc::clone(&self.orders),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<M: Marketplace + ?Sized> OrderStatusPoller<M> {
    pub fn new(config: OrderPollerConfig, marketplace: Arc<M>) -> Self {
        Self {
            config,
            marketplace,
            orders: Arc::new(RwLock::new(Vec::new())),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Snapshot of the locally held order list.
    pub async fn orders(&self) -> Vec<Order> {
        self.orders.read().await.clone()
    }

    /// Fetches the full order list and replaces the local one.
    pub async fn refresh(&self) -> Result<RefreshOutcome, OrderPollingError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("Order refresh already in flight, skipping");
            return Ok(RefreshOutcome::Skipped);
        }
        let _in_flight = InFlight(&self.in_flight);

        debug!("Refreshing orders for user {}", self.marketplace.user_id());

        let fetched = tokio::time::timeout(
            self.config.request_timeout,
            self.marketplace.fetch_orders(),
        )
        .await
        .map_err(|_| {
            error!(
                "Order refresh timed out after {:?}",
                self.config.request_timeout
            );
            OrderPollingError::Timeout(self.config.request_timeout)
        })?
        .map_err(|e| {
            error!("Failed to fetch orders: {e}");
            OrderPollingError::from(e)
        })?;

        let (active, total) = {
            let mut orders = self.orders.write().await;
            *orders = keep_displayed_progress(&orders, fetched);
            let active = orders.iter().filter(|order| order.is_active()).count();
            (active, orders.len())
        };

        if active == 0 {
            info!("No active orders among {total}, polling stops");
            return Ok(RefreshOutcome::Idle);
        }

        debug!(
            "{active} active orders, next refresh in {:?}",
            self.config.polling_interval
        );
        Ok(RefreshOutcome::Scheduled(self.config.polling_interval))
    }

    /// Starts the polling loop on the runtime. The loop stops once no order
    /// is active, on the first failed refresh, or when the handle is
    /// cancelled or dropped.
    pub fn spawn(&self) -> PollerHandle {
        let (cancel, cancelled) = watch::channel(false);
        let poller = self.clone();

        info!(
            "Starting order status poller with interval: {:?}",
            self.config.polling_interval
        );

        PollerHandle {
            cancel,
            task: Some(tokio::spawn(async move { poller.run(cancelled).await })),
        }
    }

    async fn run(
        self,
        mut cancelled: watch::Receiver<bool>,
    ) -> Result<PollingStopped, OrderPollingError> {
        loop {
            if *cancelled.borrow() {
                debug!("Order poller cancelled before refresh");
                return Ok(PollingStopped::Cancelled);
            }

            let delay = match self.refresh().await? {
                RefreshOutcome::Idle => return Ok(PollingStopped::Idle),
                RefreshOutcome::Scheduled(delay) => delay,
                RefreshOutcome::Skipped => self.config.polling_interval,
            };

            tokio::select! {
                biased;
                _ = cancelled.changed() => {
                    debug!("Order poller cancelled while waiting");
                    return Ok(PollingStopped::Cancelled);
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Replaces the held list with `fetched`, except that an order never moves
/// back to a status its displayed status cannot reach.
fn keep_displayed_progress(previous: &[Order], fetched: Vec<Order>) -> Vec<Order> {
    fetched
        .into_iter()
        .map(|mut order| {
            let Some(shown) = previous.iter().find(|shown| shown.id == order.id) else {
                return order;
            };

            if !shown.order_status.reaches(order.order_status) {
                warn!(
                    "Ignoring status regression for order {}: {} -> {}",
                    order.id, shown.order_status, order.order_status
                );
                order.order_status = shown.order_status;
            }

            if let (Some(shown_delivery), Some(delivery)) = (&shown.delivery, &mut order.delivery)
                && delivery.status < shown_delivery.status
            {
                warn!(
                    "Ignoring delivery regression for order {}: {} -> {}",
                    order.id, shown_delivery.status, delivery.status
                );
                delivery.status = shown_delivery.status;
            }

            order
        })
        .collect()
}

/// Owner side of a spawned poller. Dropping it tears the loop down.
pub struct PollerHandle {
    cancel: watch::Sender<bool>,
    task: Option<JoinHandle<Result<PollingStopped, OrderPollingError>>>,
}

impl PollerHandle {
    /// Stops the loop. Cancellation is observed before each refresh and while
    /// waiting between refreshes; a refresh already under way completes and
    /// its result is kept.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Waits for the loop to end and returns why it stopped.
    pub async fn join(mut self) -> Result<PollingStopped, OrderPollingError> {
        match self.task.take() {
            Some(task) => task.await?,
            None => Ok(PollingStopped::Cancelled),
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickbite_marketplace::test::stub_order;
    use quickbite_marketplace::{
        Delivery, DeliveryStatus, MarketplaceError, OrderStatus, TestMarketplace, UserId,
    };

    fn poller(marketplace: &Arc<TestMarketplace>) -> OrderStatusPoller<TestMarketplace> {
        OrderStatusPoller::new(OrderPollerConfig::default(), Arc::clone(marketplace))
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_schedules_when_an_order_is_active() {
        let marketplace = Arc::new(TestMarketplace::new(UserId(1)).with_orders(vec![
            stub_order(1, OrderStatus::Delivered),
            stub_order(2, OrderStatus::Preparing),
        ]));

        let outcome = poller(&marketplace).refresh().await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Scheduled(Duration::from_secs(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivered_orders_get_one_refresh_only() {
        let marketplace = Arc::new(
            TestMarketplace::new(UserId(1))
                .with_orders(vec![stub_order(1, OrderStatus::Delivered)]),
        );
        let poller = poller(&marketplace);

        let stopped = poller.spawn().join().await.unwrap();

        assert_eq!(stopped, PollingStopped::Idle);
        assert_eq!(marketplace.fetch_orders_calls(), 1);
        assert_eq!(poller.orders().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_once_orders_leave_active_statuses() {
        let marketplace = Arc::new(TestMarketplace::new(UserId(1)).with_order_snapshots(vec![
            vec![stub_order(1, OrderStatus::Preparing)],
            vec![stub_order(1, OrderStatus::OutForDelivery)],
            vec![stub_order(1, OrderStatus::Delivered)],
        ]));
        let poller = poller(&marketplace);

        let stopped = poller.spawn().join().await.unwrap();

        assert_eq!(stopped, PollingStopped::Idle);
        assert_eq!(marketplace.fetch_orders_calls(), 3);
        assert_eq!(poller.orders().await[0].order_status, OrderStatus::Delivered);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_scheduled_refresh() {
        let marketplace = Arc::new(
            TestMarketplace::new(UserId(1)).with_orders(vec![stub_order(1, OrderStatus::Pending)]),
        );
        let handle = poller(&marketplace).spawn();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(marketplace.fetch_orders_calls(), 1);

        handle.cancel();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(marketplace.fetch_orders_calls(), 1);
        assert_eq!(handle.join().await.unwrap(), PollingStopped::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_refresh_lets_it_finish() {
        let marketplace = Arc::new(
            TestMarketplace::new(UserId(1))
                .with_orders(vec![stub_order(1, OrderStatus::Preparing)])
                .with_fetch_delay(Duration::from_secs(5)),
        );
        let poller = poller(&marketplace);
        let handle = poller.spawn();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(marketplace.fetch_orders_calls(), 1);
        assert!(poller.orders().await.is_empty());

        handle.cancel();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(marketplace.fetch_orders_calls(), 1);
        assert_eq!(handle.join().await.unwrap(), PollingStopped::Cancelled);
        assert_eq!(poller.orders().await[0].order_status, OrderStatus::Preparing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_tears_down_loop() {
        let marketplace = Arc::new(
            TestMarketplace::new(UserId(1)).with_orders(vec![stub_order(1, OrderStatus::Pending)]),
        );

        let handle = poller(&marketplace).spawn();
        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(handle);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(marketplace.fetch_orders_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_stops_polling() {
        let marketplace = Arc::new(
            TestMarketplace::new(UserId(1)).with_orders(vec![stub_order(1, OrderStatus::Pending)]),
        );
        marketplace.set_fetch_failure(Some("backend down"));

        let result = poller(&marketplace).spawn().join().await;

        assert!(matches!(
            result,
            Err(OrderPollingError::Marketplace(MarketplaceError::RequestFailed { .. }))
        ));
        assert_eq!(marketplace.fetch_orders_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_refresh_is_single_flight() {
        let marketplace = Arc::new(
            TestMarketplace::new(UserId(1))
                .with_orders(vec![stub_order(1, OrderStatus::Pending)])
                .with_fetch_delay(Duration::from_secs(2)),
        );
        let poller = poller(&marketplace);

        let (first, second) = tokio::join!(poller.refresh(), poller.refresh());

        assert_eq!(
            first.unwrap(),
            RefreshOutcome::Scheduled(Duration::from_secs(10))
        );
        assert_eq!(second.unwrap(), RefreshOutcome::Skipped);
        assert_eq!(marketplace.fetch_orders_calls(), 1);

        poller.refresh().await.unwrap();
        assert_eq!(marketplace.fetch_orders_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_times_out() {
        let marketplace = Arc::new(
            TestMarketplace::new(UserId(1)).with_fetch_delay(Duration::from_secs(120)),
        );
        let poller = OrderStatusPoller::new(
            OrderPollerConfig {
                polling_interval: Duration::from_secs(10),
                request_timeout: Duration::from_secs(5),
            },
            marketplace,
        );

        assert!(matches!(
            poller.refresh().await,
            Err(OrderPollingError::Timeout(timeout)) if timeout == Duration::from_secs(5)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_replaces_list_without_status_regression() {
        let mut out_for_delivery = stub_order(1, OrderStatus::OutForDelivery);
        out_for_delivery.delivery = Some(Delivery {
            status: DeliveryStatus::PickedUp,
        });
        let mut stale = stub_order(1, OrderStatus::Preparing);
        stale.delivery = Some(Delivery {
            status: DeliveryStatus::Assigned,
        });

        let marketplace = Arc::new(TestMarketplace::new(UserId(1)).with_order_snapshots(vec![
            vec![out_for_delivery, stub_order(2, OrderStatus::Pending)],
            vec![stale],
        ]));
        let poller = poller(&marketplace);

        poller.refresh().await.unwrap();
        assert_eq!(poller.orders().await.len(), 2);

        poller.refresh().await.unwrap();
        let orders = poller.orders().await;

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order_status, OrderStatus::OutForDelivery);
        assert_eq!(
            orders[0].delivery.as_ref().map(|d| d.status),
            Some(DeliveryStatus::PickedUp)
        );
    }

    #[test]
    fn test_cancelled_after_pending_is_progress() {
        let previous = vec![stub_order(1, OrderStatus::Pending)];
        let merged =
            keep_displayed_progress(&previous, vec![stub_order(1, OrderStatus::Cancelled)]);

        assert_eq!(merged[0].order_status, OrderStatus::Cancelled);
    }
}
