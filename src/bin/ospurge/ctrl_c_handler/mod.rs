// Interrupt handling for the CLI binary.
//
// An interrupt is handled like any other unrecoverable failure: the shared
// token is cancelled and every runner winds down on its own. The handler
// task ends as soon as the token is cancelled, whoever cancelled it.

use ospurge_rs::PurgeCancellationToken;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub fn spawn_ctrl_c_handler(cancellation_token: PurgeCancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => {
                debug!("purge cancelled, ctrl-c handler stopped.");
            }
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => warn!(
                        "interrupted, stopping the purge. some resources may not have been deleted."
                    ),
                    Err(e) => warn!(error = %e, "unable to listen for ctrl-c, stopping the purge."),
                }
                cancellation_token.cancel();
            }
        }
    })
}
