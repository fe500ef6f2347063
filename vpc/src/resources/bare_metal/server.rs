//! Power handling around PCI changes.
//!
//! PCI interfaces and attachments can only be added to or removed from a
//! stopped server. Callers hold the server lock, call [`stop_for_pci`],
//! make their change, and then [`start_after_pci`].

use std::time::Duration;

use tfplug::Context;

use crate::api::bare_metal_servers::{BareMetalServer, StopType};
use crate::error::{ApiResultExt, Result, VpcError};
use crate::wait::{tables, wait_for_state, StateTable};
use crate::VpcProviderData;

pub const HARD_STOP: &str = "hard_stop";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PciChange {
    Attach,
    Detach,
}

impl PciChange {
    fn failed_message(self, what: &str) -> String {
        match self {
            PciChange::Attach => format!("cannot attach {} to a failed bare metal server", what),
            PciChange::Detach => format!("cannot detach {} from a failed bare metal server", what),
        }
    }
}

pub fn stop_type(hard_stop: bool) -> StopType {
    if hard_stop {
        StopType::Hard
    } else {
        StopType::Soft
    }
}

/// Bring the server to `stopped` so a PCI change can be made.
///
/// A running server is stopped and waited on. A stopped one is left alone.
/// Any other status refuses the change.
pub async fn stop_for_pci(
    ctx: &Context,
    data: &VpcProviderData,
    server_id: &str,
    hard_stop: bool,
    change: PciChange,
    what: &str,
    timeout: Duration,
) -> Result<()> {
    let server = data
        .client
        .bare_metal_servers()
        .get(server_id)
        .await
        .context(format!("bare metal server {}", server_id))?;

    match server.status.as_str() {
        "stopped" => Ok(()),
        "failed" => Err(VpcError::precondition(change.failed_message(what))),
        "running" => {
            tracing::info!(
                "Stopping bare metal server {} to change a PCI {}",
                server_id,
                what
            );
            data.client
                .bare_metal_servers()
                .stop(server_id, stop_type(hard_stop))
                .await
                .context(format!("bare metal server {}", server_id))?;
            wait_server(ctx, data, server_id, &tables::BMS_STOPPED, timeout).await?;
            Ok(())
        }
        other => Err(VpcError::precondition(format!(
            "bare metal server in {} state, please try after some time",
            other
        ))),
    }
}

pub async fn start_after_pci(
    ctx: &Context,
    data: &VpcProviderData,
    server_id: &str,
    timeout: Duration,
) -> Result<()> {
    tracing::info!("Starting bare metal server {}", server_id);
    data.client
        .bare_metal_servers()
        .start(server_id)
        .await
        .context(format!("bare metal server {}", server_id))?;
    wait_server(ctx, data, server_id, &tables::BMS_RUNNING, timeout).await?;
    Ok(())
}

pub async fn wait_server(
    ctx: &Context,
    data: &VpcProviderData,
    server_id: &str,
    table: &StateTable,
    timeout: Duration,
) -> Result<Option<BareMetalServer>> {
    let client = &data.client;
    let outcome = wait_for_state(
        ctx,
        table,
        &data.poll,
        timeout,
        &format!("bare metal server {}", server_id),
        || async move {
            let server = client
                .bare_metal_servers()
                .get(server_id)
                .await
                .context(format!("bare metal server {}", server_id))?;
            let status = server.status.clone();
            Ok((server, status))
        },
    )
    .await?;
    Ok(outcome.reached())
}
