use serde_json::Value;

/// Hashes selected for one top-crashing signature within one partition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureGroup {
    /// Key the group was published under. Not stable across runs.
    pub signature_key: String,
    /// Human-readable signature text.
    pub signature: String,
    pub process_type: String,
    pub channel: String,
    pub os: Option<String>,
    /// Content identifiers. Duplicates are kept as-is.
    pub hashes: Vec<String>,
}

/// Target-state data that does not have the expected shape.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed signature data for {process_type} ({channel}) signature {signature:?}: {reason}")]
pub struct MalformedInputError {
    pub process_type: String,
    pub channel: String,
    pub signature: String,
    pub reason: String,
}

impl SignatureGroup {
    /// Builds a group from one entry of a per-partition crash id file:
    /// `"<key>": {"description": "...", "hashes": ["...", ...]}`.
    pub fn from_entry(
        process_type: &str,
        channel: &str,
        key: &str,
        entry: &Value,
    ) -> Result<Self, MalformedInputError> {
        let malformed = |reason: String| MalformedInputError {
            process_type: process_type.to_string(),
            channel: channel.to_string(),
            signature: key.to_string(),
            reason,
        };

        let signature = entry
            .get("description")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("description is not a string".into()))?;

        let hashes = string_list(entry.get("hashes")).map_err(malformed)?;

        let os = match entry.get("os") {
            None | Some(Value::Null) => None,
            Some(Value::String(os)) => Some(os.clone()),
            Some(_) => return Err(malformed("os is not a string".into())),
        };

        Ok(SignatureGroup {
            signature_key: key.to_string(),
            signature: signature.to_string(),
            process_type: process_type.to_string(),
            channel: channel.to_string(),
            os,
            hashes,
        })
    }

    /// Builds a group from one row of the top crashers query:
    /// `{"signature", "process_type", "channel", "os", "minidump_hashes"}`.
    ///
    /// Rows may also carry a `signature_key` naming the partition (architecture,
    /// version) the row was ranked in. Without it the signature text is used.
    pub fn from_row(row: &Value) -> Result<Self, MalformedInputError> {
        let field = |name: &str| row.get(name).and_then(Value::as_str);

        let process_type = field("process_type");
        let channel = field("channel");
        let signature = field("signature");

        let malformed = |reason: String| MalformedInputError {
            process_type: process_type.unwrap_or("<unknown>").to_string(),
            channel: channel.unwrap_or("<unknown>").to_string(),
            signature: signature.unwrap_or("<unknown>").to_string(),
            reason,
        };

        let (Some(process_type), Some(channel), Some(signature)) = (process_type, channel, signature)
        else {
            return Err(malformed(
                "process_type, channel and signature must be strings".into(),
            ));
        };

        let os = field("os").ok_or_else(|| malformed("os is not a string".into()))?;
        let hashes = string_list(row.get("minidump_hashes")).map_err(malformed)?;

        let signature_key = match row.get("signature_key") {
            None | Some(Value::Null) => signature,
            Some(Value::String(key)) => key.as_str(),
            Some(_) => return Err(malformed("signature_key is not a string".into())),
        };

        Ok(SignatureGroup {
            signature_key: signature_key.to_string(),
            signature: signature.to_string(),
            process_type: process_type.to_string(),
            channel: channel.to_string(),
            os: Some(os.to_string()),
            hashes,
        })
    }
}

fn string_list(value: Option<&Value>) -> Result<Vec<String>, String> {
    let items = value
        .and_then(Value::as_array)
        .ok_or_else(|| "hashes is not a list".to_string())?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| format!("hash at index {i} is not a string"))
        })
        .collect()
}
