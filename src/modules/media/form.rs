use anyhow::anyhow;
use axum::Json;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use madrasa_core::{AppError, UploadedFile};
use madrasa_media::{ExplicitAsset, SlotChange, SlotRef};
use madrasa_models::HasSlots;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;
use validator::Validate;

use crate::validator::{body_error, validate};

/// An update DTO whose entity carries media slots.
pub trait MediaDto: DeserializeOwned + Validate {
    type Entity: HasSlots;
}

/// A partial entity update plus the requested change for each touched slot.
///
/// Accepts `multipart/form-data` or JSON. For every slot of the entity the
/// body may carry a file part named after the slot (multipart only), or
/// `{slot}_url` with an optional `{slot}_object_key`; a file part wins over
/// both. All other fields
/// deserialize into `T` and are validated.
#[derive(Debug)]
pub struct MediaForm<T> {
    pub dto: T,
    pub changes: Vec<(SlotRef, SlotChange)>,
}

#[derive(Debug, Default)]
struct SlotInput {
    file: Option<UploadedFile>,
    url: Option<String>,
    object_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotPart {
    File,
    Url,
    ObjectKey,
}

/// Position of the slot a field belongs to, and which part of it.
fn classify(slots: &[SlotRef], name: &str) -> Option<(usize, SlotPart)> {
    slots.iter().enumerate().find_map(|(i, slot)| {
        let part = match name.strip_prefix(slot.slot)? {
            "" => SlotPart::File,
            "_url" => SlotPart::Url,
            "_object_key" => SlotPart::ObjectKey,
            _ => return None,
        };
        Some((i, part))
    })
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

async fn read_multipart(
    slots: &[SlotRef],
    mut multipart: Multipart,
) -> Result<(Map<String, Value>, Vec<SlotInput>), AppError> {
    let mut fields = Map::new();
    let mut inputs: Vec<SlotInput> = slots.iter().map(|_| SlotInput::default()).collect();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::new(e.status(), anyhow!(e.body_text())))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match classify(slots, &name) {
            Some((i, SlotPart::File)) => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::new(e.status(), anyhow!(e.body_text())))?;

                // Browsers submit an empty part for an untouched file input.
                if !bytes.is_empty() {
                    inputs[i].file = Some(UploadedFile {
                        filename,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            Some((i, part)) => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::new(e.status(), anyhow!(e.body_text())))?;
                let value = non_blank(text);
                if part == SlotPart::Url {
                    inputs[i].url = value;
                } else {
                    inputs[i].object_key = value;
                }
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::new(e.status(), anyhow!(e.body_text())))?;
                fields.insert(name, Value::String(text));
            }
        }
    }

    Ok((fields, inputs))
}

fn json_text(name: &str, value: Value) -> Result<Option<String>, AppError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(non_blank(s)),
        _ => Err(AppError::bad_request(anyhow!("{} must be a string", name))),
    }
}

fn split_json(
    slots: &[SlotRef],
    body: Value,
) -> Result<(Map<String, Value>, Vec<SlotInput>), AppError> {
    let Value::Object(body) = body else {
        return Err(AppError::bad_request(anyhow!(
            "Request body must be a JSON object"
        )));
    };

    let mut fields = Map::new();
    let mut inputs: Vec<SlotInput> = slots.iter().map(|_| SlotInput::default()).collect();

    for (name, value) in body {
        match classify(slots, &name) {
            Some((i, SlotPart::File)) => {
                return Err(AppError::bad_request(anyhow!(
                    "{} must be uploaded as multipart/form-data, or set {}_url",
                    slots[i].slot,
                    slots[i].slot
                )));
            }
            Some((i, SlotPart::Url)) => inputs[i].url = json_text(&name, value)?,
            Some((i, SlotPart::ObjectKey)) => inputs[i].object_key = json_text(&name, value)?,
            None => {
                fields.insert(name, value);
            }
        }
    }

    Ok((fields, inputs))
}

fn collect_changes(
    slots: &[SlotRef],
    inputs: Vec<SlotInput>,
) -> Result<Vec<(SlotRef, SlotChange)>, AppError> {
    let mut changes = Vec::new();

    for (slot, input) in slots.iter().zip(inputs) {
        let name = slot.slot;
        let change = match input {
            SlotInput {
                file: Some(file),
                url,
                object_key,
            } => {
                if url.is_some() || object_key.is_some() {
                    debug!(slot = name, "Uploaded file takes precedence over the slot URL");
                }
                SlotChange::Upload(file)
            }
            SlotInput {
                url: Some(url),
                object_key,
                ..
            } => SlotChange::Explicit(ExplicitAsset { url, object_key }),
            SlotInput {
                object_key: Some(_),
                ..
            } => {
                return Err(AppError::bad_request(anyhow!(
                    "{name}_object_key requires {name}_url"
                )));
            }
            SlotInput { .. } => continue,
        };
        changes.push((*slot, change));
    }

    Ok(changes)
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

impl<T, S> FromRequest<S> for MediaForm<T>
where
    T: MediaDto,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let slots = <T::Entity as HasSlots>::SLOTS;

        let (fields, inputs) = if is_multipart(&req) {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|r| AppError::new(r.status(), anyhow!(r.body_text())))?;
            read_multipart(slots, multipart).await?
        } else {
            let Json(body) = Json::<Value>::from_request(req, state)
                .await
                .map_err(|r| AppError::new(r.status(), anyhow!(r.body_text())))?;
            split_json(slots, body)?
        };

        let dto: T = serde_json::from_value(Value::Object(fields))
            .map_err(|e| body_error(&e.to_string()))?;
        validate(&dto)?;

        let changes = collect_changes(slots, inputs)?;

        Ok(Self { dto, changes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use madrasa_models::slots::{SCHOOL_BACKGROUND, SCHOOL_ICON, SCHOOL_LOGO};
    use serde_json::json;

    const SLOTS: &[SlotRef] = &[SCHOOL_ICON, SCHOOL_LOGO, SCHOOL_BACKGROUND];

    #[test]
    fn test_classify_slot_fields() {
        assert_eq!(classify(SLOTS, "logo"), Some((1, SlotPart::File)));
        assert_eq!(classify(SLOTS, "logo_url"), Some((1, SlotPart::Url)));
        assert_eq!(
            classify(SLOTS, "background_object_key"),
            Some((2, SlotPart::ObjectKey))
        );
        assert_eq!(classify(SLOTS, "logo_caption"), None);
        assert_eq!(classify(SLOTS, "name"), None);
    }

    #[test]
    fn test_json_splits_slot_fields_from_entity_fields() {
        let body = json!({
            "name": "Al-Noor",
            "logo_url": "https://cdn.test/storage/v1/object/public/media/l.png",
            "logo_object_key": "l.png",
            "icon_url": "",
            "background_url": null
        });

        let (fields, inputs) = split_json(SLOTS, body).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["name"], "Al-Noor");

        let changes = collect_changes(SLOTS, inputs).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].0, SCHOOL_LOGO);
        match &changes[0].1 {
            SlotChange::Explicit(asset) => {
                assert_eq!(asset.object_key.as_deref(), Some("l.png"));
            }
            other => panic!("unexpected change {other:?}"),
        }
    }

    #[test]
    fn test_json_rejects_bare_slot_field() {
        let err = split_json(SLOTS, json!({"icon": "data"})).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_json_body_must_be_object() {
        assert!(split_json(SLOTS, json!(["logo_url"])).is_err());
    }

    #[test]
    fn test_object_key_without_url_is_rejected() {
        let (_, inputs) = split_json(SLOTS, json!({"icon_object_key": "k"})).unwrap();
        let err = collect_changes(SLOTS, inputs).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.error.to_string().contains("icon_url"));
    }

    #[test]
    fn test_uploaded_file_takes_precedence_over_url() {
        let mut inputs: Vec<SlotInput> = SLOTS.iter().map(|_| SlotInput::default()).collect();
        inputs[0].file = Some(UploadedFile {
            filename: Some("i.png".to_string()),
            content_type: "image/png".to_string(),
            bytes: vec![1, 2, 3],
        });
        inputs[0].url = Some("https://cdn.test/i.png".to_string());
        inputs[0].object_key = Some("i.png".to_string());

        let changes = collect_changes(SLOTS, inputs).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].0, SCHOOL_ICON);
        match &changes[0].1 {
            SlotChange::Upload(file) => assert_eq!(file.bytes, vec![1, 2, 3]),
            other => panic!("unexpected change {other:?}"),
        }
    }

    #[test]
    fn test_untouched_slots_produce_no_change() {
        let inputs: Vec<SlotInput> = SLOTS.iter().map(|_| SlotInput::default()).collect();
        assert!(collect_changes(SLOTS, inputs).unwrap().is_empty());
    }
}
