use serde::{Deserialize, Deserializer};

/// Response wrapper for Zoho Mail API endpoints
#[derive(Debug, Deserialize)]
pub struct ZohoResponse<T> {
    pub data: T,
}

/// A message as listed by search and folder endpoints (no body)
#[derive(Debug, Clone, Deserialize)]
pub struct ZohoMessage {
    #[serde(rename = "messageId", deserialize_with = "string_or_number")]
    pub message_id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(rename = "fromAddress", default)]
    pub from_address: ZohoAddressList,
    #[serde(rename = "toAddress", default)]
    pub to_address: ZohoAddressList,
    #[serde(rename = "ccAddress", default)]
    pub cc_address: ZohoAddressList,
    /// Epoch milliseconds or an RFC 3339 string, depending on the endpoint
    #[serde(rename = "receivedTime", default, deserialize_with = "opt_string_or_number")]
    pub received_time: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(rename = "hasAttachment", default, deserialize_with = "flag")]
    pub has_attachment: bool,
    #[serde(rename = "isUnread", default, deserialize_with = "opt_flag")]
    pub is_unread: Option<bool>,
}

impl ZohoMessage {
    /// Short preview text, whichever field the endpoint filled in
    pub fn preview(&self) -> Option<&str> {
        self.snippet.as_deref().or(self.summary.as_deref())
    }
}

/// Full message body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZohoMessageContent {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(rename = "contentType", default)]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ZohoAddress {
    #[serde(default)]
    pub name: Option<String>,
    pub address: String,
}

/// Address field that the API returns either as structured entries or as a
/// raw header-style string (`"Name" <a@b.com>, c@d.com`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZohoAddressList(pub Vec<ZohoAddress>);

impl ZohoAddressList {
    pub fn iter(&self) -> std::slice::Iter<'_, ZohoAddress> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for ZohoAddressList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            List(Vec<ZohoAddress>),
            Single(ZohoAddress),
            Text(String),
        }

        Ok(match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::List(list)) => ZohoAddressList(list),
            Some(Raw::Single(addr)) => ZohoAddressList(vec![addr]),
            Some(Raw::Text(text)) => ZohoAddressList(parse_address_text(&text)),
            None => ZohoAddressList::default(),
        })
    }
}

/// Parse a header-style address list, tolerating HTML-escaped brackets and quotes
pub fn parse_address_text(text: &str) -> Vec<ZohoAddress> {
    let text = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&");

    let mut entries = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut in_angle = false;

    for c in text.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => in_angle = true,
            '>' if !in_quotes => in_angle = false,
            ',' if !in_quotes && !in_angle => {
                entries.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    entries.push(current);

    entries
        .iter()
        .filter_map(|entry| parse_single_address(entry))
        .collect()
}

fn parse_single_address(entry: &str) -> Option<ZohoAddress> {
    let entry = entry.trim();
    if entry.is_empty() {
        return None;
    }

    match (entry.rfind('<'), entry.rfind('>')) {
        (Some(open), Some(close)) if open < close => {
            let address = entry[open + 1..close].trim().to_string();
            let name = entry[..open].trim().trim_matches('"').trim();
            if address.is_empty() {
                return None;
            }
            Some(ZohoAddress {
                name: (!name.is_empty()).then(|| name.to_string()),
                address,
            })
        }
        _ => Some(ZohoAddress {
            name: None,
            address: entry.trim_matches('"').to_string(),
        }),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    StringOrNumber::deserialize(deserializer).map(String::from)
}

fn opt_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(String::from))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Number(i64),
    String(String),
}

impl Flag {
    fn truthy(self) -> bool {
        match self {
            Flag::Bool(b) => b,
            Flag::Number(n) => n != 0,
            Flag::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true"),
        }
    }
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<Flag>::deserialize(deserializer)?
        .map(Flag::truthy)
        .unwrap_or(false))
}

fn opt_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    Ok(Option::<Flag>::deserialize(deserializer)?.map(Flag::truthy))
}
