//! Session dispatch shared by both scheduler variants.

use std::sync::Arc;

use machinestack_driver::{ControlReceiver, Driver, SessionStreams, TerminalSize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{SchedulerError, SchedulerResult};

/// Drive `driver`'s session for `name` until it ends or `cancel` fires.
///
/// On cancellation the driver's session future is dropped, which closes the
/// streams and the control channel and tears down the remote process.
pub(crate) async fn run_session(
    name: &str,
    driver: Arc<dyn Driver>,
    streams: SessionStreams,
    control: ControlReceiver,
    size: TerminalSize,
    cancel: &CancellationToken,
) -> SchedulerResult<()> {
    tokio::select! {
        result = driver.session(name, streams, control, size) => {
            match &result {
                Ok(()) => info!(%name, "session closed"),
                Err(e) => warn!(%name, error = %e, "session failed"),
            }
            Ok(result?)
        }
        _ = cancel.cancelled() => {
            info!(%name, "session cancelled");
            Err(SchedulerError::Cancelled(name.to_string()))
        }
    }
}
