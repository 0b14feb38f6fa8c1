use uuid::{uuid, Uuid};

/// Common PSSH system id, for key ids signalled without a specific DRM system.
pub const COMMON_PSSH_UUID: Uuid = uuid!("1077efec-c0b2-4d02-ace3-3c1e52e2fb4b");
pub const CLEARKEY_UUID: Uuid = uuid!("e2719d58-a985-b3c9-781a-b030af78d30e");
pub const PLAYREADY_UUID: Uuid = uuid!("9a04f079-9840-4286-ab92-e65be0885f95");
pub const WIDEVINE_UUID: Uuid = uuid!("edef8ba9-79d6-4ace-a3c8-27dcd51d21ed");

pub const MP4_PROTECTION_SCHEME: &str = "urn:mpeg:dash:mp4protection:2011";

/// Initialization data for one protection system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeData {
    /// `Uuid::nil()` when the data applies to all systems.
    pub uuid: Uuid,
    pub license_server_url: Option<String>,
    pub mime_type: String,
    /// A complete `pssh` box.
    pub data: Option<Vec<u8>>,
}

impl SchemeData {
    pub fn matches(&self, uuid: Uuid) -> bool {
        self.uuid.is_nil() || self.uuid == uuid
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Whether `other` carries the payload this entry lacks for the same system.
    pub fn can_replace(&self, other: &SchemeData) -> bool {
        self.has_data() && !other.has_data() && self.matches(other.uuid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DrmInitData {
    /// Protection scheme from `mp4protection@value`, e.g. `cenc` or `cbcs`.
    pub scheme_type: Option<String>,
    pub scheme_datas: Vec<SchemeData>,
}

impl DrmInitData {
    pub fn new(scheme_type: Option<String>, scheme_datas: Vec<SchemeData>) -> Self {
        Self {
            scheme_type,
            scheme_datas,
        }
    }

    pub fn get(&self, uuid: Uuid) -> Option<&SchemeData> {
        self.scheme_datas.iter().find(|data| data.uuid == uuid)
    }
}

/// Drops entries without payload when another entry can stand in for them.
pub fn filter_redundant_incomplete(scheme_datas: &mut Vec<SchemeData>) {
    let mut index = scheme_datas.len();
    while index > 0 {
        index -= 1;
        let redundant = {
            let candidate = &scheme_datas[index];
            !candidate.has_data()
                && scheme_datas
                    .iter()
                    .enumerate()
                    .any(|(i, other)| i != index && other.can_replace(candidate))
        };
        if redundant {
            tracing::debug!(uuid = %scheme_datas[index].uuid, "Dropping incomplete scheme data");
            scheme_datas.remove(index);
        }
    }
}

/// Moves the license url of a ClearKey entry onto the common PSSH entries, which then become
/// ClearKey entries themselves. The standalone ClearKey entry is removed.
pub fn fill_in_clear_key_information(scheme_datas: &mut Vec<SchemeData>) {
    let Some(position) = scheme_datas
        .iter()
        .position(|data| data.uuid == CLEARKEY_UUID && data.license_server_url.is_some())
    else {
        return;
    };
    let license_server_url = scheme_datas.remove(position).license_server_url;

    for data in scheme_datas
        .iter_mut()
        .filter(|data| data.uuid == COMMON_PSSH_UUID && data.license_server_url.is_none())
    {
        data.uuid = CLEARKEY_UUID;
        data.license_server_url = license_server_url.clone();
    }
}
