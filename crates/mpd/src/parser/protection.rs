use uuid::Uuid;

use crate::{
    model::{
        format::mime,
        protection::{
            SchemeData, CLEARKEY_UUID, COMMON_PSSH_UUID, MP4_PROTECTION_SCHEME, PLAYREADY_UUID,
            WIDEVINE_UUID,
        },
        pssh::{base64_decode, PsshBox},
    },
    xml::XmlElement,
    MpdError, MpdResult,
};

const NIL_KEY_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Scheme type and DRM init data declared by a `ContentProtection` element.
#[derive(Debug, Default)]
pub(crate) struct ContentProtection {
    pub scheme_type: Option<String>,
    pub scheme_data: Option<SchemeData>,
}

fn system_id(scheme_id_uri: &str) -> Option<Uuid> {
    match scheme_id_uri {
        "urn:uuid:9a04f079-9840-4286-ab92-e65be0885f95" => Some(PLAYREADY_UUID),
        "urn:uuid:edef8ba9-79d6-4ace-a3c8-27dcd51d21ed" => Some(WIDEVINE_UUID),
        "urn:uuid:e2719d58-a985-b3c9-781a-b030af78d30e" => Some(CLEARKEY_UUID),
        _ => None,
    }
}

pub(crate) fn parse_content_protection(element: &XmlElement) -> MpdResult<ContentProtection> {
    let scheme_id_uri = element
        .attr("schemeIdUri")
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let mut scheme_type = None;
    let mut uuid = None;
    let mut data = None;
    let mut license_server_url = None;

    if scheme_id_uri == MP4_PROTECTION_SCHEME {
        scheme_type = element.attr("value").map(String::from);
        if let Some(default_kid) = element
            .attr_ignore_prefix("default_KID")
            .map(str::trim)
            .filter(|kid| !kid.is_empty() && *kid != NIL_KEY_ID)
        {
            let key_ids = default_kid
                .split_whitespace()
                .map(|kid| {
                    Uuid::parse_str(kid)
                        .map_err(|_| MpdError::invalid_attribute("default_KID", default_kid))
                })
                .collect::<MpdResult<Vec<_>>>()?;
            data = Some(PsshBox::new(COMMON_PSSH_UUID, key_ids, Vec::new()).to_bytes());
            uuid = Some(COMMON_PSSH_UUID);
        }
    } else if let Some(system_id) = system_id(&scheme_id_uri) {
        uuid = Some(system_id);
    } else {
        tracing::trace!(scheme_id_uri, "Unknown content protection scheme");
    }

    for child in element.children() {
        match child.name() {
            "clearkey:Laurl" | "dashif:Laurl" | "dashif:laurl" => {
                license_server_url = Some(child.text().to_string());
            }
            "ms:laurl" => license_server_url = child.attr("licenseUrl").map(String::from),
            "mspr:pro" if data.is_none() && uuid == Some(PLAYREADY_UUID) => {
                match base64_decode(child.text()) {
                    Ok(object) => {
                        data = Some(PsshBox::new(PLAYREADY_UUID, Vec::new(), object).to_bytes())
                    }
                    Err(error) => {
                        tracing::warn!(%error, "Skipping malformed mspr:pro data");
                    }
                }
            }
            _ if data.is_none() && child.local_name() == "pssh" => {
                let pssh = base64_decode(child.text())
                    .ok()
                    .and_then(|bytes| PsshBox::try_from(bytes.as_slice()).ok().map(|pssh| (pssh, bytes)));
                match pssh {
                    Some((pssh, bytes)) => {
                        uuid = Some(pssh.system_id);
                        data = Some(bytes);
                    }
                    None => tracing::warn!("Skipping malformed cenc:pssh data"),
                }
            }
            _ => tracing::trace!(element = child.name(), "Skipping content protection child"),
        }
    }

    Ok(ContentProtection {
        scheme_type,
        scheme_data: uuid.map(|uuid| SchemeData {
            uuid,
            license_server_url,
            mime_type: mime::VIDEO_MP4.to_string(),
            data,
        }),
    })
}
