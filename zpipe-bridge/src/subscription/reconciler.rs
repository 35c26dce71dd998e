//! Subscribe/unsubscribe reconciliation against the authoritative set.

use crate::observability::events;
use crate::transport::{Subscription, ZephyrError, ZephyrTransport};
use tracing::debug;

const COMPONENT: &str = "subscription_reconciler";

/// Issues the requested mutation, then re-queries the collaborator's
/// subscription set and verifies membership matches intent.
///
/// The request returning success is necessary but not sufficient: the
/// service does not guarantee the change landed. Returns `Ok(true)` iff the
/// post-request set agrees with `want_subscribed`.
pub(crate) async fn apply(
    transport: &dyn ZephyrTransport,
    subscription: &Subscription,
    want_subscribed: bool,
) -> Result<bool, ZephyrError> {
    if want_subscribed {
        transport.subscribe(subscription).await?;
    } else {
        transport.unsubscribe(subscription).await?;
    }

    let active = transport.subscriptions().await?;
    debug!(
        event = events::SUBSCRIPTION_SET_DUMP,
        component = COMPONENT,
        active = ?active,
        "authoritative subscription set after reconciliation"
    );
    Ok(active.contains(subscription) == want_subscribed)
}
