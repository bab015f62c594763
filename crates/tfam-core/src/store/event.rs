use tfam_model::EndpointRegistered;

use crate::store::{CoordinationStore, StoreError, StoreLayout};

/// Raw notification delivered by the coordination store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A watched key was created.
    Created { path: String },
}

impl StoreEvent {
    pub fn path(&self) -> &str {
        match self {
            StoreEvent::Created { path } => path,
        }
    }
}

/// Decode a raw notification into a typed endpoint registration.
///
/// Returns `Ok(None)` for events on keys that are not endpoint keys.
pub async fn decode_endpoint<S>(
    store: &S,
    layout: &StoreLayout,
    event: &StoreEvent,
) -> Result<Option<EndpointRegistered>, StoreError>
where
    S: CoordinationStore + ?Sized,
{
    let path = event.path();
    let Some(container_id) = layout.container_for(path) else {
        return Ok(None);
    };

    let raw = store
        .get(path)
        .await?
        .ok_or_else(|| StoreError::Missing(path.to_string()))?;
    let endpoint = String::from_utf8(raw).map_err(|e| StoreError::InvalidData {
        key: path.to_string(),
        message: e.to_string(),
    })?;
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(StoreError::InvalidData {
            key: path.to_string(),
            message: "empty endpoint".into(),
        });
    }

    Ok(Some(EndpointRegistered::new(container_id, endpoint)))
}
