// SPDX-License-Identifier: GPL-3.0-only

//! Camera permission through the XDG desktop portal
//!
//! The portal keeps per-application camera decisions in its permission store
//! (`devices` table, `camera` entry). Host applications are stored under an
//! empty application id.

use super::types::{BackendError, BackendResult, PermissionState};
use std::collections::HashMap;
use tracing::{debug, info};
use zbus::zvariant::OwnedValue;

const PERMISSION_STORE_SERVICE: &str = "org.freedesktop.impl.portal.PermissionStore";
const PERMISSION_STORE_PATH: &str = "/org/freedesktop/impl/portal/PermissionStore";
const PERMISSION_STORE_INTERFACE: &str = "org.freedesktop.impl.portal.PermissionStore";

/// Application id used by the permission store for unsandboxed apps
pub const HOST_APP_ID: &str = "";

/// Query the stored camera decision for this application
///
/// A missing entry means the user has not been asked yet.
pub async fn query_camera_permission() -> BackendResult<PermissionState> {
    let connection = zbus::Connection::session()
        .await
        .map_err(|e| BackendError::NotAvailable(format!("Failed to connect to session D-Bus: {}", e)))?;

    let store = zbus::Proxy::new(
        &connection,
        PERMISSION_STORE_SERVICE,
        PERMISSION_STORE_PATH,
        PERMISSION_STORE_INTERFACE,
    )
    .await
    .map_err(|e| BackendError::NotAvailable(format!("Failed to create permission store proxy: {}", e)))?;

    let result: Result<(HashMap<String, Vec<String>>, OwnedValue), _> =
        store.call("Lookup", &("devices", "camera")).await;

    match result {
        Ok((entries, _)) => {
            let state = permission_for(&entries, HOST_APP_ID);
            info!(%state, apps = entries.len(), "Camera permission from portal");
            Ok(state)
        }
        // The store reports an unknown table/entry as an error
        Err(zbus::Error::MethodError(name, _, _)) if name.as_str().ends_with("NotFound") => {
            debug!("No stored camera permission");
            Ok(PermissionState::Prompt)
        }
        Err(e) => Err(BackendError::Other(format!("Permission lookup failed: {}", e))),
    }
}

/// Interpret permission store entries for `app_id`
pub fn permission_for(entries: &HashMap<String, Vec<String>>, app_id: &str) -> PermissionState {
    let Some(values) = entries.get(app_id) else {
        return PermissionState::Prompt;
    };
    match values.first().map(String::as_str) {
        Some("yes") => PermissionState::Granted,
        Some("no") => PermissionState::Denied,
        _ => PermissionState::Prompt,
    }
}
